pub mod authentication;
pub mod capability;

pub use authentication::{AuthenticatedUser, AuthenticationProvider, AuthenticationResult, AuthRequest};
pub use capability::{CapabilityChecker, MANAGE_CAPABILITY};
