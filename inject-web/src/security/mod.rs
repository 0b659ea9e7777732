pub mod middleware;
pub mod providers;

pub use middleware::{auth_middleware, ip_allow_middleware};
pub use providers::BasicAuthProvider;
