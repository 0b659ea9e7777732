use crate::artifact::ArtifactStore;
use crate::condition::evaluate;
use crate::error::Result;
use inject_api::RequestContext;
use inject_domain::Location;
use serde::Serialize;
use std::sync::Arc;

/// 输出片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fragment {
    ExternalScript { src: String },
    ManagedScript { id: String, src: String },
    InlineScript { content: String },
}

impl Fragment {
    pub fn to_html(&self) -> String {
        match self {
            Fragment::ExternalScript { src } => format!("<script src=\"{}\"></script>", escape_attr(src)),
            Fragment::ManagedScript { id, src } => format!(
                "<script id=\"inject-file-{}\" src=\"{}\"></script>",
                escape_attr(id),
                escape_attr(src)
            ),
            Fragment::InlineScript { content } => format!("<script>\n{}\n</script>", content),
        }
    }
}

/// 前台渲染
///
/// 顺序固定：外部URL（声明顺序），托管文件（声明顺序），最后是内联脚本。
pub struct Renderer {
    artifacts: Arc<ArtifactStore>,
    files_base_url: String,
}

impl Renderer {
    pub fn new(artifacts: Arc<ArtifactStore>, files_base_url: impl Into<String>) -> Self {
        Self {
            artifacts,
            files_base_url: files_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn render(&self, location: Location, ctx: &RequestContext) -> Result<Vec<Fragment>> {
        let mut fragments = Vec::new();

        for linked in self.artifacts.get_linked_urls(location).await? {
            if linked.enabled && evaluate(&linked.conditions, ctx) {
                fragments.push(Fragment::ExternalScript { src: linked.url });
            }
        }

        for file in self.artifacts.get_managed_files().await? {
            if file.location != location || !file.enabled || !evaluate(&file.conditions, ctx) {
                continue;
            }
            let mut src = format!("{}/{}", self.files_base_url, file.filename);
            if !file.version.is_empty() {
                src.push_str("?ver=");
                src.push_str(&file.version);
            }
            fragments.push(Fragment::ManagedScript { id: file.id, src });
        }

        let inline = self.artifacts.get_inline_script(location).await?;
        if !inline.content.trim().is_empty() && evaluate(&inline.conditions, ctx) {
            fragments.push(Fragment::InlineScript { content: inline.content });
        }

        Ok(fragments)
    }

    /// 渲染为HTML；没有片段时返回空字符串
    pub async fn render_html(&self, location: Location, ctx: &RequestContext) -> Result<String> {
        let fragments = self.render(location, ctx).await?;
        if fragments.is_empty() {
            return Ok(String::new());
        }
        let body = fragments.iter().map(Fragment::to_html).collect::<Vec<_>>().join("\n");
        Ok(format!("<!-- inject:{} -->\n{}\n<!-- /inject:{} -->\n", location, body, location))
    }
}

fn escape_attr(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
