use regex::{Regex, RegexBuilder};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::import::normalize_description;
use crate::models::{CategoryRule, CategorySource, RuleKind, Transaction};

/// Row categories that mean "nobody categorized this".
const PLACEHOLDER_CATEGORIES: &[&str] = &[
    "",
    "-",
    "none",
    "n/a",
    "na",
    "null",
    "other",
    "misc",
    "uncategorized",
    "unknown",
];

const DEFAULT_KEYWORD_RULES: &[(&str, &str)] = &[
    ("payroll", "Income"),
    ("paycheck", "Income"),
    ("direct dep", "Income"),
    ("interest paid", "Interest"),
    ("grocer", "Groceries"),
    ("whole foods", "Groceries"),
    ("trader joe", "Groceries"),
    ("safeway", "Groceries"),
    ("starbucks", "Coffee Shops"),
    ("coffee", "Coffee Shops"),
    ("netflix", "Streaming"),
    ("spotify", "Streaming"),
    ("hulu", "Streaming"),
    ("uber", "Ride Share"),
    ("lyft", "Ride Share"),
    ("chevron", "Gas & Fuel"),
    ("exxon", "Gas & Fuel"),
    ("shell oil", "Gas & Fuel"),
    ("pharmacy", "Pharmacy"),
    ("walgreens", "Pharmacy"),
    ("insurance", "Insurance"),
    ("parking", "Parking"),
    ("airlines", "Flights"),
    ("hotel", "Hotels"),
];

const DEFAULT_REGEX_RULES: &[(&str, &str)] = &[
    (r"^(amzn|amazon)\b", "Shopping"),
    (r"\b(rent|mortgage)\b", "Rent/Mortgage"),
    (r"\b(electric|water|power|gas)\s+(co|company|utility|utilities)\b", "Utilities"),
    (r"\b(atm|overdraft|service|monthly)\s+fee\b", "Fees & Charges"),
    (r"\b(gym|fitness)\b", "Gym"),
];

pub(crate) fn is_placeholder(category: &str) -> bool {
    let c = category.trim().to_lowercase();
    PLACEHOLDER_CATEGORIES.contains(&c.as_str())
}

pub(crate) struct Categorizer {
    keywords: Vec<KeywordRule>,
    regexes: Vec<RegexRule>,
}

struct KeywordRule {
    pattern: String,
    category: String,
}

struct RegexRule {
    regex: Regex,
    category: String,
}

impl Categorizer {
    /// Compile `rules`, highest priority first (stable for equal priority).
    /// Regex rules that fail to compile are skipped and returned by pattern.
    pub(crate) fn new(rules: &[CategoryRule]) -> (Self, Vec<String>) {
        let mut ordered: Vec<&CategoryRule> = rules.iter().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut keywords = Vec::new();
        let mut regexes = Vec::new();
        let mut bad_patterns = Vec::new();
        for rule in ordered {
            match rule.kind {
                RuleKind::Keyword => keywords.push(KeywordRule {
                    pattern: normalize_description(&rule.pattern),
                    category: rule.category.clone(),
                }),
                RuleKind::Regex => {
                    match RegexBuilder::new(&rule.pattern).case_insensitive(true).build() {
                        Ok(regex) => regexes.push(RegexRule {
                            regex,
                            category: rule.category.clone(),
                        }),
                        Err(_) => bad_patterns.push(rule.pattern.clone()),
                    }
                }
            }
        }
        (Self { keywords, regexes }, bad_patterns)
    }

    /// User rules followed by the built-in table.
    pub(crate) fn with_defaults(user_rules: &[CategoryRule]) -> (Self, Vec<String>) {
        let mut rules = user_rules.to_vec();
        rules.extend(default_rules());
        let (categorizer, bad) = Self::new(&rules);
        for pattern in &bad {
            warn!(pattern = %pattern, "Skipping invalid regex category rule");
        }
        (categorizer, bad)
    }

    /// Per-transaction phase: provided, then keyword, then regex.
    pub(crate) fn infer(
        &self,
        provided: Option<&str>,
        description: &str,
    ) -> (Option<String>, CategorySource) {
        if let Some(cat) = provided.map(str::trim).filter(|c| !is_placeholder(c)) {
            return (Some(cat.to_string()), CategorySource::Provided);
        }

        let desc = normalize_description(description);
        if let Some(rule) = self.keywords.iter().find(|r| desc.contains(&r.pattern)) {
            return (Some(rule.category.clone()), CategorySource::Keyword);
        }
        if let Some(rule) = self.regexes.iter().find(|r| r.regex.is_match(&desc)) {
            return (Some(rule.category.clone()), CategorySource::Regex);
        }
        (None, CategorySource::None)
    }
}

pub(crate) fn default_rules() -> Vec<CategoryRule> {
    let keywords = DEFAULT_KEYWORD_RULES
        .iter()
        .map(|(p, c)| CategoryRule::new_keyword(p, c).with_priority(-1));
    let regexes = DEFAULT_REGEX_RULES
        .iter()
        .map(|(p, c)| CategoryRule::new_regex(p, c).with_priority(-1));
    keywords.chain(regexes).collect()
}

/// Vendor grouping key: the normalized description with digits and
/// reference punctuation removed. Every remaining word is kept, so a shared
/// bank prefix like "pos purchase" does not merge different merchants.
pub(crate) fn vendor_key(description: &str) -> String {
    let cleaned: String = normalize_description(description)
        .chars()
        .map(|c| if c.is_ascii_digit() || matches!(c, '#' | '*' | '.' | '/') { ' ' } else { c })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Thresholds for the vendor consensus pass. A group's dominant category is
/// used when at least `min_labeled` members are labeled and its share of the
/// labeled members is strictly greater than `min_share`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ConsensusPolicy {
    pub(crate) min_labeled: usize,
    pub(crate) min_share: f64,
}

impl Default for ConsensusPolicy {
    fn default() -> Self {
        Self {
            min_labeled: 1,
            min_share: 0.5,
        }
    }
}

/// Second phase, run once over the accepted set. Unlabeled transactions take
/// the dominant category of directly labeled transactions sharing their vendor
/// key. `sources` runs parallel to `txns`. Returns how many were filled in.
pub(crate) fn apply_vendor_consensus(
    txns: &mut [Transaction],
    sources: &mut [CategorySource],
    policy: &ConsensusPolicy,
) -> usize {
    let mut votes: HashMap<String, BTreeMap<String, usize>> = HashMap::new();
    let mut unlabeled: HashMap<String, Vec<usize>> = HashMap::new();

    for (i, txn) in txns.iter().enumerate() {
        let vendor = vendor_key(&txn.description);
        if vendor.is_empty() {
            continue;
        }
        match (&txn.category, sources[i]) {
            (Some(cat), source) if source.is_direct() => {
                *votes.entry(vendor).or_default().entry(cat.clone()).or_default() += 1;
            }
            (None, CategorySource::None) => unlabeled.entry(vendor).or_default().push(i),
            _ => {}
        }
    }

    let mut filled = 0;
    for (vendor, members) in unlabeled {
        let Some(tally) = votes.get(&vendor) else {
            continue;
        };
        let labeled: usize = tally.values().sum();
        if labeled == 0 || labeled < policy.min_labeled {
            continue;
        }
        // BTreeMap order makes ties resolve to the alphabetically first category
        let Some((category, count)) = tally
            .iter()
            .fold(None::<(&String, usize)>, |best, (cat, &n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((cat, n)),
            })
        else {
            continue;
        };
        let share = count as f64 / labeled as f64;
        if share <= policy.min_share {
            debug!(vendor = %vendor, share, "Consensus below threshold");
            continue;
        }
        for i in members {
            txns[i].category = Some(category.clone());
            sources[i] = CategorySource::Consensus;
            filled += 1;
        }
        debug!(vendor = %vendor, category = %category, "Consensus category assigned");
    }
    filled
}

#[cfg(test)]
mod tests;
