use crate::security::AuthenticatedUser;

/// 管理脚本所需的能力
pub const MANAGE_CAPABILITY: &str = "manage_options";

/// 能力检查（由外部权限系统提供）
pub trait CapabilityChecker: Send + Sync {
    fn can_manage(&self, user: &AuthenticatedUser) -> bool;
}

/// 任何闭包都可以充当能力检查器
impl<F> CapabilityChecker for F
where
    F: Fn(&AuthenticatedUser) -> bool + Send + Sync,
{
    fn can_manage(&self, user: &AuthenticatedUser) -> bool {
        self(user)
    }
}
