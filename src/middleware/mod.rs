// Request middleware: JWT auth, CORS, rate limiting

pub mod auth;
pub mod cors;
pub mod rate_limiter;

pub use auth::{auth_middleware, verify_jwt, AuthedUser, Claims};
pub use cors::apply_cors;
pub use rate_limiter::rate_limiter_middleware;
