use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RuleKind {
    #[default]
    Keyword,
    Regex,
}

/// A user or built-in category rule. Keyword rules match a case-insensitive
/// substring of the description; regex rules match case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CategoryRule {
    pub(crate) pattern: String,
    pub(crate) category: String,
    #[serde(default)]
    pub(crate) kind: RuleKind,
    #[serde(default)]
    pub(crate) priority: i32,
}

impl CategoryRule {
    pub(crate) fn new_keyword(pattern: &str, category: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            category: category.to_string(),
            kind: RuleKind::Keyword,
            priority: 0,
        }
    }

    pub(crate) fn new_regex(pattern: &str, category: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            category: category.to_string(),
            kind: RuleKind::Regex,
            priority: 0,
        }
    }

    pub(crate) fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}
