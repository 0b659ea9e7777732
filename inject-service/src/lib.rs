pub mod artifact;
pub mod condition;
pub mod content;
pub mod error;
pub mod history;
pub mod render;
pub mod script_service;
pub mod security;


pub use artifact::{ArtifactStore, FileWrite, ManagedFileFields, ScriptWrite};
pub use condition::{evaluate, parse_conditions};
pub use content::{ContentValidator, ValidatedContent};
pub use error::{ErrorBody, ServiceError};
pub use history::{HistoryLedger, RollbackEngine, RollbackOutcome};
pub use render::{Fragment, Renderer};
pub use script_service::{
    ClearedView, DefaultScriptService, FileUpload, FileView, FileWriteView, FilesView, HistoryView,
    RollbackView, ScriptRequest, ScriptService, ScriptServiceSettings, ScriptView, ServiceReply, UrlsView,
};
pub use security::{
    AccountService, AuthService, DefaultAccountService, DefaultPasswordService, ManageCapabilityChecker,
    PasswordAlgorithm, PasswordService,
};
