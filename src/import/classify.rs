use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;

use super::key::normalize_description;
use crate::models::TxnType;

/// Moves between the holder's own accounts. Typed as savings but never queued
/// for goal linkage.
const INTERNAL_TRANSFER_PATTERNS: &[&str] = &[
    "internal transfer",
    "transfer between accounts",
    "acct to acct",
    "online transfer from chk",
    "online transfer to chk",
];

const SAVINGS_TRANSFER_PATTERNS: &[&str] = &[
    "xfer to savings",
    "xfer to sav",
    "transfer to savings",
    "transfer to sav",
    "savings transfer",
    "deposit to savings",
    "automatic savings",
];

const SAVINGS_TRANSFER_REGEXES: &[&str] = &[
    r"\b(xfer|trnsfr|transfer)\b.*\bto\b.*\bsav(ings?)?\b",
    r"\bsave as you go\b",
];

/// Assigns income/expense/savings from the sign and the description. Never
/// looks at the category.
pub(crate) struct Classifier {
    savings_regexes: Vec<Regex>,
}

impl Classifier {
    pub(crate) fn new() -> Self {
        let savings_regexes = SAVINGS_TRANSFER_REGEXES
            .iter()
            .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
            .collect();
        Self { savings_regexes }
    }

    pub(crate) fn classify(&self, description: &str, signed_amount: Decimal) -> TxnType {
        if is_internal_transfer(description) || self.is_savings_transfer(description) {
            TxnType::Savings
        } else if signed_amount >= Decimal::ZERO {
            TxnType::Income
        } else {
            TxnType::Expense
        }
    }

    fn is_savings_transfer(&self, description: &str) -> bool {
        let desc = normalize_description(description);
        SAVINGS_TRANSFER_PATTERNS.iter().any(|p| desc.contains(p))
            || self.savings_regexes.iter().any(|re| re.is_match(&desc))
    }
}

pub(crate) fn is_internal_transfer(description: &str) -> bool {
    let desc = normalize_description(description);
    INTERNAL_TRANSFER_PATTERNS.iter().any(|p| desc.contains(p))
}
