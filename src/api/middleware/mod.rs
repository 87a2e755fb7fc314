pub mod auth;
pub mod rate_limit;

pub use auth::{
    CurrentUser, authenticate, require_activated_user, require_authenticated_user,
    require_permission,
};
pub use rate_limit::{RateLimiter, rate_limit};
