//! 加载条件（规则集）
//!
//! 规则集在反序列化边界统一规范化：新格式 `{logic, rules}` 与旧格式
//! `{type, values}` 都转换为同一个 [`RuleSet`]，无法识别的规则类型在此被丢弃。
//! 求值逻辑只面对规范化后的数据。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// 规则类型标签（存储格式）
pub mod tag {
    pub const ALL: &str = "all";
    pub const FRONT_PAGE: &str = "front_page";
    pub const SINGULAR: &str = "singular";
    pub const POST_TYPE: &str = "post_type";
    pub const POST_IDS: &str = "post_ids";
    pub const URL_CONTAINS: &str = "url_contains";
    pub const LOGGED_IN: &str = "logged_in";
    pub const LOGGED_OUT: &str = "logged_out";
}

/// 多条规则的组合方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl Logic {
    /// 未知的运算符按AND处理
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("or") {
            Logic::Or
        } else {
            Logic::And
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Logic::And => "and",
            Logic::Or => "or",
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条加载规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// 所有页面
    AllPages,
    /// 仅首页
    FrontPageOnly,
    /// 任意单篇视图
    AnySingular,
    /// 指定内容类型的单篇视图
    PostTypes(BTreeSet<String>),
    /// 指定对象ID
    PostIds(BTreeSet<u64>),
    /// 请求路径包含任一子串
    UrlContains(BTreeSet<String>),
    LoggedIn,
    LoggedOut,
}

impl Rule {
    pub fn post_types<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Rule::PostTypes(slugs.into_iter().map(Into::into).collect())
    }

    pub fn post_ids<I: IntoIterator<Item = u64>>(ids: I) -> Self {
        Rule::PostIds(ids.into_iter().collect())
    }

    pub fn url_contains<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Rule::UrlContains(patterns.into_iter().map(Into::into).collect())
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Rule::AllPages => tag::ALL,
            Rule::FrontPageOnly => tag::FRONT_PAGE,
            Rule::AnySingular => tag::SINGULAR,
            Rule::PostTypes(_) => tag::POST_TYPE,
            Rule::PostIds(_) => tag::POST_IDS,
            Rule::UrlContains(_) => tag::URL_CONTAINS,
            Rule::LoggedIn => tag::LOGGED_IN,
            Rule::LoggedOut => tag::LOGGED_OUT,
        }
    }

    /// 从存储格式构建规则，无法识别的类型返回None
    pub fn from_raw(kind: &str, values: &Value) -> Option<Self> {
        let rule = match kind.trim() {
            tag::ALL => Rule::AllPages,
            tag::FRONT_PAGE => Rule::FrontPageOnly,
            tag::SINGULAR => Rule::AnySingular,
            tag::POST_TYPE | "post_types" => Rule::PostTypes(
                value_items(values)
                    .iter()
                    .map(|item| sanitize_key(item))
                    .filter(|slug| !slug.is_empty())
                    .collect(),
            ),
            tag::POST_IDS => Rule::PostIds(
                value_items(values)
                    .iter()
                    .filter_map(|item| item.parse::<u64>().ok())
                    .filter(|id| *id > 0)
                    .collect(),
            ),
            tag::URL_CONTAINS => Rule::UrlContains(value_items(values).into_iter().collect()),
            tag::LOGGED_IN => Rule::LoggedIn,
            tag::LOGGED_OUT => Rule::LoggedOut,
            _ => return None,
        };
        Some(rule)
    }

    fn values(&self) -> Vec<Value> {
        match self {
            Rule::PostTypes(slugs) => slugs.iter().cloned().map(Value::String).collect(),
            Rule::PostIds(ids) => ids.iter().map(|id| Value::from(*id)).collect(),
            Rule::UrlContains(patterns) => patterns.iter().cloned().map(Value::String).collect(),
            _ => Vec::new(),
        }
    }
}

/// 规则集
///
/// 空规则集表示“始终加载”。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "RawRuleSet")]
pub struct RuleSet {
    pub logic: Logic,
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(logic: Logic, rules: Vec<Rule>) -> Self {
        Self { logic, rules }
    }

    /// 所有规则都须满足
    pub fn all(rules: Vec<Rule>) -> Self {
        Self::new(Logic::And, rules)
    }

    /// 任一规则满足即可
    pub fn any(rules: Vec<Rule>) -> Self {
        Self::new(Logic::Or, rules)
    }

    pub fn single(rule: Rule) -> Self {
        Self::all(vec![rule])
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 解析JSON文本；空文本得到空规则集
    pub fn parse_json(text: &str) -> Result<Self, serde_json::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(&value))
    }

    /// 从任意JSON值规范化
    ///
    /// 支持 `{logic, rules}`、旧格式 `{type, values}`，以及被编码成字符串的JSON。
    /// 其它形状得到空规则集。
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::parse_json(text).unwrap_or_default(),
            Value::Object(map) => {
                if let Some(rules) = map.get("rules") {
                    let logic = map
                        .get("logic")
                        .and_then(Value::as_str)
                        .map(Logic::parse)
                        .unwrap_or_default();
                    let rules = rules
                        .as_array()
                        .map(|items| items.iter().filter_map(rule_from_value).collect())
                        .unwrap_or_default();
                    Self { logic, rules }
                } else if map.contains_key("type") {
                    Self {
                        logic: Logic::And,
                        rules: rule_from_value(value).into_iter().collect(),
                    }
                } else {
                    Self::default()
                }
            }
            _ => Self::default(),
        }
    }
}

impl From<Value> for RuleSet {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

/// 存储格式的规则
#[derive(Debug, Clone, Serialize)]
pub struct RawRule {
    #[serde(rename = "type")]
    pub kind: String,
    pub values: Vec<Value>,
}

/// 存储格式的规则集
#[derive(Debug, Clone, Serialize)]
pub struct RawRuleSet {
    pub logic: Logic,
    pub rules: Vec<RawRule>,
}

impl From<RuleSet> for RawRuleSet {
    fn from(rule_set: RuleSet) -> Self {
        Self {
            logic: rule_set.logic,
            rules: rule_set
                .rules
                .iter()
                .map(|rule| RawRule {
                    kind: rule.tag().to_string(),
                    values: rule.values(),
                })
                .collect(),
        }
    }
}

fn rule_from_value(value: &Value) -> Option<Rule> {
    let kind = value.get("type")?.as_str()?;
    let values = value.get("values").unwrap_or(&Value::Null);
    Rule::from_raw(kind, values)
}

/// 展开规则值：数组、逗号/换行分隔的字符串或单个数字
fn value_items(values: &Value) -> Vec<String> {
    let raw: Vec<String> = match values {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) => s
            .split(|c: char| c == ',' || c == '\n')
            .map(str::to_string)
            .collect(),
        Value::Number(n) => vec![n.to_string()],
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// 内容类型标识只保留小写字母、数字、下划线和短横线
fn sanitize_key(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}
