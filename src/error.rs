use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures that abort a whole ingestion run. Row-level problems never end up
/// here; they are collected as [`RowError`] inside the plan instead.
#[derive(Error, Debug)]
pub(crate) enum IngestError {
    #[error("No account number: the file has no AccountNumber column and none was given")]
    MissingAccountNumber,

    #[error("Invalid account number: {0:?}")]
    InvalidAccountNumber(String),

    #[error("Cannot read {path}: {source}")]
    Source {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV source has no header row")]
    EmptySource,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Rows must be a JSON array of objects: {0}")]
    Json(#[from] serde_json::Error),
}

/// Caller contract violations raised by the lifecycle manager. Ordinary
/// no-ops (undo outside the window, nothing staged) are not errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum LifecycleError {
    #[error("Import session {session_id} for account {account_number} is already committed")]
    AlreadyCommitted {
        session_id: String,
        account_number: String,
    },

    #[error("Plan holds transactions for account {found}, expected {expected}")]
    AccountMismatch { expected: String, found: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum DuplicateReason {
    Existing,
    IntraFile,
}

impl DuplicateReason {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Existing => "existing",
            Self::IntraFile => "intra-file",
        }
    }
}

impl std::fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A per-row problem recorded in an import plan.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum RowError {
    #[error("line {}: {message}", fmt_line(.line))]
    Parse { line: Option<usize>, message: String },

    #[error("line {line}: {message}")]
    Normalize { line: usize, message: String },

    #[error("line {line}: duplicate ({reason}): {message}")]
    Duplicate {
        line: usize,
        reason: DuplicateReason,
        message: String,
    },
}

impl RowError {
    pub(crate) fn line(&self) -> Option<usize> {
        match self {
            Self::Parse { line, .. } => *line,
            Self::Normalize { line, .. } | Self::Duplicate { line, .. } => Some(*line),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            Self::Normalize { .. } => "normalize",
            Self::Duplicate { .. } => "duplicate",
        }
    }
}

fn fmt_line(line: &Option<usize>) -> String {
    line.map_or_else(|| "?".to_string(), |l| l.to_string())
}
