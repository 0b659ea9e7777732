pub mod context;
pub mod security;
pub mod store;

pub use context::RequestContext;
pub use security::{
    AuthenticatedUser, AuthenticationProvider, AuthenticationResult, AuthRequest,
    CapabilityChecker, MANAGE_CAPABILITY,
};
pub use store::{OptionStore, StoreError};
