use inject_infra::IpAllowList;
use inject_service::{AuthService, ScriptService};
use std::sync::Arc;

/// 应用状态
/// 包含处理请求所需的服务实例
#[derive(Clone)]
pub struct AppState {
    pub script_service: Arc<dyn ScriptService>,
    pub auth_service: Arc<AuthService>,
    pub ip_allow_list: Arc<IpAllowList>,
    /// 关闭时所有 `/api/v1` 请求被拒绝
    pub rest_enabled: bool,
    /// 是否信任 `x-forwarded-for` / `x-real-ip`（位于反向代理之后时开启）
    pub trust_proxy_headers: bool,
    /// 请求体上限（字节），需容纳托管文件上传
    pub body_limit: usize,
}
