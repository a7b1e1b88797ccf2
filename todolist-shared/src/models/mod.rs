/// Database models for the todo list backend
///
/// # Models
///
/// - `user`: Accounts, roles and the two OTP slots
/// - `todo`: Per-user todo items with a dense `order` column
///
/// Each model carries its own PostgreSQL queries as associated functions.
/// Handlers go through the [`crate::store`] traits instead of calling these
/// directly.

pub mod todo;
pub mod user;

pub use todo::{CompletedScope, DeletedTodo, ReorderItem, Todo, UpdateTodo};
pub use user::{CreateUser, OtpPurpose, PublicUser, StoredOtp, UpdateProfile, User, UserRole};
