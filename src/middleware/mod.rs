/// Middleware module
///
/// Access guarding for route scopes.

mod jwt_middleware;

pub use jwt_middleware::AccessGuardMiddleware;
