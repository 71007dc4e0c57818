/// Middleware module
///
/// Identity resolution for protected routes and request logging.

mod identity_middleware;
mod request_logger;

pub use identity_middleware::{RequireIdentity, ACCESS_TOKEN_COOKIE};
pub use request_logger::RequestLogger;
