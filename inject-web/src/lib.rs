pub mod app_state;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod security;

pub use app_state::AppState;
pub use error::ApiError;
pub use handlers::*;
pub use security::{auth_middleware, ip_allow_middleware, BasicAuthProvider};
