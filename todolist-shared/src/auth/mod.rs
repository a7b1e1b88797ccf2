/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and the password rule
/// - [`jwt`]: JWT token generation and validation
/// - [`otp`]: One-time codes for verification and password reset
/// - [`middleware`]: Session token extraction and the [`AuthContext`] extractor
/// - [`authorization`]: Capability-based route policies
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations
/// - **JWT Tokens**: HS256 signing, one hour by default
/// - **OTP Storage**: Only Argon2id hashes of codes are persisted
///
/// # Example
///
/// ```no_run
/// use todolist_shared::auth::password::{hash_password, verify_password};
/// use todolist_shared::auth::jwt::{create_token, Claims};
/// use todolist_shared::models::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("MyP@ssw0rd")?;
/// assert!(verify_password("MyP@ssw0rd", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), "ada@example.com", UserRole::User);
/// let token = create_token(&claims, "secret-key-at-least-32-bytes-long")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod otp;
pub mod password;

pub use middleware::AuthContext;
