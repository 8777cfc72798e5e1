use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::columns::ColumnMap;
use super::source::RawRow;
use crate::error::RowError;
use crate::util::parse_money;

/// A row reduced to the canonical fields every later stage works on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NormalizedTxn {
    pub(crate) line: usize,
    pub(crate) date: NaiveDate,
    pub(crate) description: String,
    pub(crate) raw_amount: Decimal,
    pub(crate) category: Option<String>,
    pub(crate) balance: Option<Decimal>,
}

// Two-digit years go before four-digit ones: `%Y` happily reads "26" as year 26.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%Y/%m/%d",
    "%d.%m.%Y",
];

/// Normalize one raw row. Unreadable dates or amounts are rejected with the
/// row's line number; they are never turned into a zero transaction.
pub(crate) fn normalize_row(row: &RawRow, columns: &ColumnMap) -> Result<NormalizedTxn, RowError> {
    normalize_inner(row, columns).map_err(|e| RowError::Normalize {
        line: row.line,
        message: format!("{e:#}"),
    })
}

fn normalize_inner(row: &RawRow, columns: &ColumnMap) -> Result<NormalizedTxn> {
    let date_str = field(row, &columns.date);
    if date_str.is_empty() {
        anyhow::bail!("missing date");
    }
    let date = parse_date(date_str)?;

    let description = field(row, &columns.description).to_string();
    let raw_amount = parse_amount(row, columns).context("bad amount")?;

    let category = Some(field(row, &columns.category))
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    let balance = Some(field(row, &columns.balance))
        .filter(|b| !b.is_empty())
        .and_then(parse_money);

    Ok(NormalizedTxn {
        line: row.line,
        date,
        description,
        raw_amount,
        category,
        balance,
    })
}

fn field<'a>(row: &'a RawRow, column: &Option<String>) -> &'a str {
    column
        .as_deref()
        .and_then(|c| row.get(c))
        .map(str::trim)
        .unwrap_or("")
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    // "2026-02-01T00:00:00" and "2026-02-01 00:00" style timestamps
    let s = s.split(['T', ' ']).next().unwrap_or(s);
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    anyhow::bail!("could not parse date '{s}'")
}

fn parse_amount(row: &RawRow, columns: &ColumnMap) -> Result<Decimal> {
    if columns.amount.is_some() {
        let raw = field(row, &columns.amount);
        return parse_decimal(raw);
    }

    let debit = field(row, &columns.debit);
    let credit = field(row, &columns.credit);
    if !debit.is_empty() {
        Ok(-parse_decimal(debit)?.abs())
    } else if !credit.is_empty() {
        Ok(parse_decimal(credit)?.abs())
    } else if columns.debit.is_none() && columns.credit.is_none() {
        anyhow::bail!("no amount column")
    } else {
        anyhow::bail!("missing amount")
    }
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    if s.trim().is_empty() {
        anyhow::bail!("missing amount");
    }
    parse_money(s).with_context(|| format!("failed to parse '{s}' as decimal"))
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
