use inject_api::{AuthenticatedUser, CapabilityChecker, MANAGE_CAPABILITY};

/// 按 `manage_options` 能力授权
#[derive(Debug, Clone, Copy, Default)]
pub struct ManageCapabilityChecker;

impl CapabilityChecker for ManageCapabilityChecker {
    fn can_manage(&self, user: &AuthenticatedUser) -> bool {
        user.has_capability(MANAGE_CAPABILITY)
    }
}
