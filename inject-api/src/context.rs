use serde::{Deserialize, Serialize};

/// 当前前台请求的上下文
///
/// 由外部页面框架提供，条件求值只读取这些字段。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// 是否为站点首页
    #[serde(rename = "isFrontPage", default)]
    pub is_front_page: bool,

    /// 是否为单篇内容视图（文章、页面或任意自定义类型）
    #[serde(rename = "isSingular", default)]
    pub is_singular: bool,

    /// 单篇视图解析出的内容类型
    #[serde(rename = "singularPostType", default)]
    pub singular_post_type: Option<String>,

    /// 当前查询对象的ID
    #[serde(rename = "queriedObjectId", default)]
    pub queried_object_id: Option<u64>,

    /// 已解码的请求路径（含查询串）
    #[serde(rename = "requestPath", default)]
    pub request_path: String,

    /// 当前会话是否已登录
    #[serde(rename = "isLoggedIn", default)]
    pub is_logged_in: bool,
}

impl RequestContext {
    pub fn new(request_path: impl Into<String>) -> Self {
        Self {
            request_path: request_path.into(),
            ..Self::default()
        }
    }

    /// 标记为首页
    pub fn front_page(mut self) -> Self {
        self.is_front_page = true;
        self
    }

    /// 标记为单篇视图
    pub fn singular(mut self, post_type: impl Into<String>, object_id: u64) -> Self {
        self.is_singular = true;
        self.singular_post_type = Some(post_type.into());
        self.queried_object_id = Some(object_id);
        self
    }

    /// 设置查询对象ID（非单篇视图也可能有，例如分类归档）
    pub fn with_object_id(mut self, object_id: u64) -> Self {
        self.queried_object_id = Some(object_id);
        self
    }

    /// 设置登录状态
    pub fn logged_in(mut self, logged_in: bool) -> Self {
        self.is_logged_in = logged_in;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let ctx = RequestContext::new("/blog/post-1")
            .singular("post", 42)
            .logged_in(true);

        assert_eq!(ctx.request_path, "/blog/post-1");
        assert!(ctx.is_singular);
        assert!(!ctx.is_front_page);
        assert_eq!(ctx.singular_post_type.as_deref(), Some("post"));
        assert_eq!(ctx.queried_object_id, Some(42));
        assert!(ctx.is_logged_in);
    }

    #[test]
    fn test_deserialize_partial() {
        let ctx: RequestContext = serde_json::from_str(r#"{"requestPath":"/shop","isLoggedIn":true}"#).unwrap();
        assert_eq!(ctx.request_path, "/shop");
        assert!(ctx.is_logged_in);
        assert!(ctx.queried_object_id.is_none());
    }
}
