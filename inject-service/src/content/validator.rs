use crate::error::{Result, ServiceError};
use inject_domain::{LinkedUrl, Limits};
use regex::Regex;
use tracing::warn;
use url::Url;

/// 通过校验的内容
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidatedContent {
    pub content: String,
    /// 非致命的处理提示，例如被剥离的 `<script>` 标签
    pub warnings: Vec<String>,
}

/// 内容校验管道
///
/// 依次检查：长度上限、控制字符、PHP标签，最后剥离包裹内容的
/// `<script>` 标签并给出警告。
pub struct ContentValidator {
    max_content_bytes: usize,
    max_file_bytes: usize,
    script_open: Regex,
    script_close: Regex,
}

impl ContentValidator {
    pub fn new(limits: &Limits) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            max_content_bytes: limits.max_content_bytes,
            max_file_bytes: limits.max_file_bytes,
            script_open: Regex::new(r"(?is)\A\s*<script\b[^>]*>")?,
            script_close: Regex::new(r"(?is)</script\s*>\s*\z")?,
        })
    }

    /// 校验内联脚本
    pub fn validate_script(&self, raw: &str) -> Result<ValidatedContent> {
        self.validate_text(raw, self.max_content_bytes)
    }

    /// 校验托管文件内容；必须是UTF-8
    pub fn validate_file(&self, raw: &[u8]) -> Result<ValidatedContent> {
        if raw.len() > self.max_file_bytes {
            return Err(ServiceError::TooLarge {
                max: self.max_file_bytes,
                actual: raw.len(),
            });
        }
        let text = std::str::from_utf8(raw)
            .map_err(|e| ServiceError::InvalidContent(format!("file is not valid UTF-8: {}", e)))?;
        self.validate_text(text, self.max_file_bytes)
    }

    /// 校验外部URL列表
    ///
    /// 空白条目被丢弃；每个URL必须是带主机名的绝对http(s)地址。
    /// 整个列表按行拼接后受内联内容上限约束。
    pub fn validate_urls(&self, urls: Vec<LinkedUrl>) -> Result<Vec<LinkedUrl>> {
        let mut accepted = Vec::with_capacity(urls.len());
        for mut linked in urls {
            let trimmed = linked.url.trim();
            if trimmed.is_empty() {
                continue;
            }
            check_url(trimmed)?;
            linked.url = trimmed.to_string();
            accepted.push(linked);
        }

        let total = accepted.iter().map(|u| u.url.len()).sum::<usize>() + accepted.len().saturating_sub(1);
        if total > self.max_content_bytes {
            return Err(ServiceError::TooLarge {
                max: self.max_content_bytes,
                actual: total,
            });
        }
        Ok(accepted)
    }

    fn validate_text(&self, text: &str, max: usize) -> Result<ValidatedContent> {
        if text.len() > max {
            return Err(ServiceError::TooLarge { max, actual: text.len() });
        }

        if let Some(c) = text.chars().find(|c| is_forbidden_control(*c)) {
            return Err(ServiceError::InvalidContent(format!(
                "control character U+{:04X} is not allowed",
                c as u32
            )));
        }

        let lowered = text.to_ascii_lowercase();
        if lowered.contains("<?php") || text.contains("<?=") {
            return Err(ServiceError::InvalidContent("PHP tags are not allowed".to_string()));
        }

        let mut content = text.to_string();
        let mut warnings = Vec::new();
        if let Some(m) = self.script_open.find(&content) {
            let end = m.end();
            content.replace_range(..end, "");
            warnings.push("Removed the opening <script> tag; enter JavaScript only.".to_string());
        }
        if let Some(m) = self.script_close.find(&content) {
            let start = m.start();
            content.truncate(start);
            warnings.push("Removed the closing </script> tag; enter JavaScript only.".to_string());
        }
        for warning in &warnings {
            warn!(warning = %warning, "Script content adjusted");
        }

        Ok(ValidatedContent { content, warnings })
    }
}

/// 制表符、换行和回车之外的控制字符
fn is_forbidden_control(c: char) -> bool {
    c.is_control() && !matches!(c, '\n' | '\r' | '\t')
}

fn check_url(raw: &str) -> Result<()> {
    let parsed = Url::parse(raw).map_err(|e| ServiceError::InvalidUrl(format!("{}: {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ServiceError::InvalidUrl(format!(
                "{}: scheme {} is not allowed",
                raw, other
            )))
        }
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ServiceError::InvalidUrl(format!("{}: missing host", raw)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> ContentValidator {
        ContentValidator::new(&Limits {
            max_content_bytes: 64,
            max_file_bytes: 128,
            ..Limits::default()
        })
        .unwrap()
    }

    #[test]
    fn test_plain_script_passes_unchanged() {
        let out = validator().validate_script("console.log(1);\n\tfoo();\r\n").unwrap();
        assert_eq!(out.content, "console.log(1);\n\tfoo();\r\n");
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_too_large() {
        let err = validator().validate_script(&"a".repeat(65)).unwrap_err();
        assert!(matches!(err, ServiceError::TooLarge { max: 64, actual: 65 }));
        assert!(validator().validate_file(&vec![b'a'; 128]).is_ok());
    }

    #[test]
    fn test_control_characters_rejected() {
        let err = validator().validate_script("a\u{0}b").unwrap_err();
        assert_eq!(err.code(), "invalid_content");
        assert!(validator().validate_script("a\u{1b}[0m").is_err());
    }

    #[test]
    fn test_php_tags_rejected() {
        assert!(validator().validate_script("<?PHP echo 1;").is_err());
        assert!(validator().validate_script("x = '<?= $y ?>';").is_err());
        assert!(validator().validate_script("a <? b").is_ok());
    }

    #[test]
    fn test_script_wrapper_stripped_with_warning() {
        let out = validator()
            .validate_script("  <script type=\"text/javascript\">alert(1);</script>\n")
            .unwrap();
        assert_eq!(out.content, "alert(1);");
        assert_eq!(out.warnings.len(), 2);

        let inner = validator().validate_script("var s = '<script>';").unwrap();
        assert_eq!(inner.content, "var s = '<script>';");
        assert!(inner.warnings.is_empty());
    }

    #[test]
    fn test_file_must_be_utf8() {
        let err = validator().validate_file(&[0x66, 0xff, 0xfe]).unwrap_err();
        assert_eq!(err.code(), "invalid_content");
    }

    #[test]
    fn test_urls() {
        let urls = validator()
            .validate_urls(vec![
                LinkedUrl::new(" https://cdn.example.com/a.js "),
                LinkedUrl::new("   "),
                LinkedUrl::new("http://x.io/b.js"),
            ])
            .unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].url, "https://cdn.example.com/a.js");

        for bad in ["/relative.js", "ftp://example.com/a.js", "javascript:alert(1)", "https://"] {
            let err = validator().validate_urls(vec![LinkedUrl::new(bad)]).unwrap_err();
            assert_eq!(err.code(), "invalid_url", "{}", bad);
        }

        let long = format!("https://example.com/{}", "a".repeat(60));
        assert!(matches!(
            validator().validate_urls(vec![LinkedUrl::new(long)]),
            Err(ServiceError::TooLarge { .. })
        ));
    }
}
