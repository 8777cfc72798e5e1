use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Transaction;
use crate::error::{DuplicateReason, RowError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ImportSession {
    pub(crate) session_id: String,
    pub(crate) account_number: String,
    pub(crate) imported_at: DateTime<Utc>,
    /// Short content hash of the source, used for the import manifest.
    pub(crate) hash: String,
    pub(crate) new_count: usize,
}

/// Milliseconds spent per pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct StageTimings {
    pub(crate) parse_ms: f64,
    pub(crate) normalize_ms: f64,
    pub(crate) key_ms: f64,
    pub(crate) dedupe_ms: f64,
    pub(crate) classify_ms: f64,
    pub(crate) infer_ms: f64,
    pub(crate) consensus_ms: f64,
    pub(crate) total_ms: f64,
}

/// Where an accepted transaction's final category came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum CategorySource {
    Provided,
    Keyword,
    Regex,
    Consensus,
    None,
}

impl CategorySource {
    /// Labeled in the per-transaction phase, so usable as a consensus vote.
    pub(crate) fn is_direct(&self) -> bool {
        matches!(self, Self::Provided | Self::Keyword | Self::Regex)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CategorySourceCounts {
    pub(crate) provided: usize,
    pub(crate) keyword: usize,
    pub(crate) regex: usize,
    pub(crate) consensus: usize,
    pub(crate) none: usize,
}

impl CategorySourceCounts {
    pub(crate) fn record(&mut self, source: CategorySource) {
        match source {
            CategorySource::Provided => self.provided += 1,
            CategorySource::Keyword => self.keyword += 1,
            CategorySource::Regex => self.regex += 1,
            CategorySource::Consensus => self.consensus += 1,
            CategorySource::None => self.none += 1,
        }
    }

    pub(crate) fn total(&self) -> usize {
        self.provided + self.keyword + self.regex + self.consensus + self.none
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct ImportStats {
    pub(crate) rows_total: usize,
    pub(crate) new_count: usize,
    pub(crate) dupes_existing: usize,
    pub(crate) dupes_intra_file: usize,
    pub(crate) parse_errors: usize,
    pub(crate) normalize_errors: usize,
    /// Rows dropped before classification because their key was already known.
    pub(crate) early_exit_existing: usize,
    pub(crate) early_exit_intra_file: usize,
    /// Duplicate errors not recorded because the cap was reached.
    pub(crate) duplicate_errors_suppressed: usize,
    pub(crate) duplicate_ratio: f64,
    pub(crate) rows_per_sec: f64,
    pub(crate) timings: StageTimings,
    pub(crate) category_sources: CategorySourceCounts,
}

impl ImportStats {
    pub(crate) fn duplicates(&self) -> usize {
        self.dupes_existing + self.dupes_intra_file
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DuplicateSample {
    pub(crate) line: usize,
    pub(crate) reason: DuplicateReason,
    pub(crate) key: String,
    pub(crate) date: NaiveDate,
    pub(crate) description: String,
    pub(crate) raw_amount: Decimal,
}

/// An accepted savings-type transaction that still needs a human to link it
/// to a savings goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SavingsCandidate {
    pub(crate) session_id: String,
    pub(crate) account_number: String,
    pub(crate) transaction_id: String,
    pub(crate) date: NaiveDate,
    pub(crate) description: String,
    pub(crate) raw_amount: Decimal,
}

impl SavingsCandidate {
    pub(crate) fn from_transaction(txn: &Transaction, session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            account_number: txn.account_number.clone(),
            transaction_id: txn.id.clone(),
            date: txn.date,
            description: txn.description.clone(),
            raw_amount: txn.raw_amount,
        }
    }
}

/// The pure result of one ingestion run. Plain data only: it can be cloned,
/// serialized and handed to the lifecycle manager without touching any store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ImportPlan {
    pub(crate) session: ImportSession,
    pub(crate) accepted: Vec<Transaction>,
    pub(crate) stats: ImportStats,
    pub(crate) errors: Vec<RowError>,
    pub(crate) duplicates_sample: Vec<DuplicateSample>,
    pub(crate) savings_queue: Vec<SavingsCandidate>,
}

impl ImportPlan {
    pub(crate) fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Distinct `YYYY-MM` months touched by accepted transactions, sorted.
    pub(crate) fn months(&self) -> Vec<String> {
        let mut months: Vec<String> = self.accepted.iter().map(|t| t.month()).collect();
        months.sort();
        months.dedup();
        months
    }
}
