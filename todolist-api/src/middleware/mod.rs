/// Middleware modules for the API server
///
/// Request path, outermost first:
///
/// 1. `security`: Security response headers
/// 2. `request_log`: Correlation id, timing, request metrics
/// 3. `debug_detail`: Internal error detail on 500s outside production
/// 4. `session`: Resolves the caller from the session token
/// 5. `policy`: Enforces the route's capability list (matched routes only)

pub mod debug_detail;
pub mod policy;
pub mod request_log;
pub mod security;
pub mod session;
