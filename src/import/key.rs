use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use super::normalize::NormalizedTxn;
use crate::models::Transaction;
use crate::util::parse_money;

/// The fields a dedup key is built from. Borrowed from whatever
/// transaction-like record is at hand.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KeyInput<'a> {
    pub(crate) account_number: &'a str,
    pub(crate) date: Option<NaiveDate>,
    /// Preferred over `display_amount` when present.
    pub(crate) signed_amount: Option<Decimal>,
    pub(crate) display_amount: Option<&'a str>,
    pub(crate) description: &'a str,
    pub(crate) balance: Option<Decimal>,
}

impl<'a> From<&'a Transaction> for KeyInput<'a> {
    fn from(txn: &'a Transaction) -> Self {
        Self {
            account_number: &txn.account_number,
            date: Some(txn.date),
            signed_amount: Some(txn.raw_amount),
            display_amount: Some(&txn.amount),
            description: &txn.description,
            balance: txn.balance,
        }
    }
}

impl<'a> KeyInput<'a> {
    pub(crate) fn for_normalized(account_number: &'a str, txn: &'a NormalizedTxn) -> Self {
        Self {
            account_number,
            date: Some(txn.date),
            signed_amount: Some(txn.raw_amount),
            display_amount: None,
            description: &txn.description,
            balance: txn.balance,
        }
    }
}

/// `account|date|amount|description[|bal:balance]`.
///
/// Deterministic and total: a missing account or date becomes `NA`, an amount
/// that cannot be read becomes `0.00`. No line number or import time goes in,
/// so the same movement imported twice always collides.
pub(crate) fn build_key(input: &KeyInput<'_>) -> String {
    let account = input.account_number.trim();
    let account = if account.is_empty() { "NA" } else { account };
    let date = input
        .date
        .map_or_else(|| "NA".to_string(), |d| d.format("%Y-%m-%d").to_string());
    let amount = input
        .signed_amount
        .or_else(|| input.display_amount.and_then(parse_money))
        .unwrap_or(Decimal::ZERO);

    let mut key = format!(
        "{account}|{date}|{}|{}",
        fixed2(amount),
        normalize_description(input.description)
    );
    if let Some(balance) = input.balance {
        key.push_str("|bal:");
        key.push_str(&fixed2(balance));
    }
    key
}

/// Lowercase and collapse runs of whitespace.
pub(crate) fn normalize_description(description: &str) -> String {
    description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn fixed2(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        return "0.00".to_string();
    }
    format!("{rounded:.2}")
}

#[cfg(test)]
#[path = "key_tests.rs"]
mod tests;
