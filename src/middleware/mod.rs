mod auth;
mod rate_limit;
mod request_logger;

pub use auth::AuthUser;
pub use rate_limit::RateLimit;
pub use request_logger::RequestLogger;
