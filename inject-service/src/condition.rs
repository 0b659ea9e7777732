//! 条件求值
//!
//! 纯函数：规则集 + 请求上下文 → 是否加载。输入已在反序列化边界规范化，
//! 这里不再处理未知规则。

use crate::error::{Result, ServiceError};
use inject_api::RequestContext;
use inject_domain::{Logic, Rule, RuleSet};
use serde_json::Value;

/// 对规则集求值
///
/// 空规则集为true；任一 `AllPages` 规则直接为true。
pub fn evaluate(rule_set: &RuleSet, ctx: &RequestContext) -> bool {
    if rule_set.is_empty() {
        return true;
    }
    if rule_set.rules.iter().any(|rule| matches!(rule, Rule::AllPages)) {
        return true;
    }
    match rule_set.logic {
        Logic::And => rule_set.rules.iter().all(|rule| matches(rule, ctx)),
        Logic::Or => rule_set.rules.iter().any(|rule| matches(rule, ctx)),
    }
}

/// 单条规则求值
pub fn matches(rule: &Rule, ctx: &RequestContext) -> bool {
    match rule {
        Rule::AllPages => true,
        Rule::FrontPageOnly => ctx.is_front_page,
        Rule::AnySingular => ctx.is_singular,
        Rule::PostTypes(slugs) => {
            ctx.is_singular
                && ctx
                    .singular_post_type
                    .as_deref()
                    .is_some_and(|post_type| slugs.contains(post_type))
        }
        Rule::PostIds(ids) => ctx.queried_object_id.is_some_and(|id| ids.contains(&id)),
        Rule::UrlContains(patterns) => patterns
            .iter()
            .any(|pattern| !pattern.is_empty() && ctx.request_path.contains(pattern.as_str())),
        Rule::LoggedIn => ctx.is_logged_in,
        Rule::LoggedOut => !ctx.is_logged_in,
    }
}

/// 解析调用方提交的条件
///
/// JSON文本必须是合法JSON，否则为 `InvalidRuleSet`；其它形状交给规则集规范化。
pub fn parse_conditions(value: Option<Value>) -> Result<Option<RuleSet>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => RuleSet::parse_json(&text)
            .map(Some)
            .map_err(|e| ServiceError::InvalidRuleSet(e.to_string())),
        Some(other) => Ok(Some(RuleSet::from_value(&other))),
    }
}
