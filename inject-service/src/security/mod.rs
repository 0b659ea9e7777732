pub mod account_service;
pub mod auth_service;
pub mod capability;
pub mod password_service;

pub use account_service::{to_authenticated_user, AccountService, DefaultAccountService};
pub use auth_service::AuthService;
pub use capability::ManageCapabilityChecker;
pub use password_service::{
    generate_application_password, DefaultPasswordService, PasswordAlgorithm, PasswordService,
};
