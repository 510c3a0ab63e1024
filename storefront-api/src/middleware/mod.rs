/// Middleware modules for the API server
///
/// - `security`: security response headers
/// - `rate_limit`: per-client-IP token bucket for sensitive auth routes

pub mod rate_limit;
pub mod security;
