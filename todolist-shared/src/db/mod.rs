/// Database layer
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: Embedded migration runner
///
/// Queries live on the models in [`crate::models`] and are reached through
/// [`crate::store::PgStore`].

pub mod migrations;
pub mod pool;
