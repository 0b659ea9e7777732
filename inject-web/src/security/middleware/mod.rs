pub mod auth;
pub mod ip_allow;

pub use auth::auth_middleware;
pub use ip_allow::{forwarded_ip, ip_allow_middleware};
