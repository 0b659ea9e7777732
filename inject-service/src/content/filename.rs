use crate::error::{Result, ServiceError};

const MAX_STEM_LEN: usize = 120;

/// 标签转为小写slug：字母数字保留，其它字符折叠为单个短横线
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    for c in label.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// 规范化文件名
///
/// 只保留字母、数字、点、下划线和短横线，折叠重复的短横线，强制 `.js` 后缀。
/// 去掉后缀后为空的名称不合法。
pub fn sanitize_filename(raw: &str) -> Result<String> {
    let base = raw
        .trim()
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let mut cleaned = String::with_capacity(base.len());
    for c in base.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '-' };
        if (c == '-' && cleaned.ends_with('-')) || (c == '.' && cleaned.ends_with('.')) {
            continue;
        }
        cleaned.push(c);
    }

    let mut stem = cleaned.as_str();
    if stem.len() >= 3 && stem[stem.len() - 3..].eq_ignore_ascii_case(".js") {
        stem = &stem[..stem.len() - 3];
    }
    let stem = stem.trim_matches(|c: char| c == '.' || c == '-');
    if stem.is_empty() {
        return Err(ServiceError::InvalidFilename(format!("{:?} has no usable name", raw)));
    }
    if stem.len() > MAX_STEM_LEN {
        return Err(ServiceError::InvalidFilename(format!(
            "name is longer than {} characters",
            MAX_STEM_LEN
        )));
    }
    Ok(format!("{}.js", stem))
}

/// 由标签推导文件名
pub fn filename_from_label(label: &str) -> Result<String> {
    let slug = slugify(label);
    if slug.is_empty() {
        return Err(ServiceError::InvalidFilename(format!(
            "cannot derive a filename from label {:?}",
            label
        )));
    }
    sanitize_filename(&slug)
}

/// 在 `taken` 返回false之前追加数字后缀：`name.js`、`name-1.js`、`name-2.js`……
pub fn unique_filename(filename: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(filename) {
        return filename.to_string();
    }
    let stem = filename.strip_suffix(".js").unwrap_or(filename);
    (1..)
        .map(|n| format!("{}-{}.js", stem, n))
        .find(|candidate| !taken(candidate.as_str()))
        .unwrap_or_else(|| filename.to_string())
}

/// 由标签生成唯一ID
pub fn unique_id<'a>(label: &str, existing: impl Iterator<Item = &'a str> + Clone) -> String {
    let slug = match slugify(label) {
        slug if slug.is_empty() => "script".to_string(),
        slug => slug,
    };
    if !existing.clone().any(|id| id == slug) {
        return slug;
    }
    (1..)
        .map(|n| format!("{}-{}", slug, n))
        .find(|candidate| !existing.clone().any(|id| id == candidate.as_str()))
        .unwrap_or(slug)
}
