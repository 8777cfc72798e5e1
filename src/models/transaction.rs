use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::util::format_amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TxnType {
    Income,
    Expense,
    Savings,
}

impl TxnType {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Savings => "savings",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            "savings" => Some(Self::Savings),
            _ => None,
        }
    }
}

impl std::fmt::Display for TxnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One financial movement on an account.
///
/// `staged` and `budget_applied` are never both true. Transactions without an
/// `import_session_id` were entered by hand and are ignored by every import
/// lifecycle operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Transaction {
    pub(crate) id: String,
    pub(crate) key: String,
    pub(crate) account_number: String,
    pub(crate) date: NaiveDate,
    pub(crate) description: String,
    pub(crate) raw_amount: Decimal,
    /// Display form of `raw_amount`, e.g. `-$20.50`.
    pub(crate) amount: String,
    #[serde(rename = "type")]
    pub(crate) txn_type: TxnType,
    pub(crate) category: Option<String>,
    #[serde(default)]
    pub(crate) balance: Option<Decimal>,
    #[serde(default)]
    pub(crate) import_session_id: Option<String>,
    pub(crate) staged: bool,
    pub(crate) budget_applied: bool,
    #[serde(default)]
    pub(crate) auto_applied: bool,
}

impl Transaction {
    /// A hand-entered transaction: no session, not staged.
    pub(crate) fn manual(
        account_number: &str,
        date: NaiveDate,
        description: &str,
        raw_amount: Decimal,
        txn_type: TxnType,
    ) -> Self {
        let mut txn = Self {
            id: uuid::Uuid::new_v4().to_string(),
            key: String::new(),
            account_number: account_number.to_string(),
            date,
            description: description.to_string(),
            raw_amount,
            amount: format_amount(raw_amount),
            txn_type,
            category: None,
            balance: None,
            import_session_id: None,
            staged: false,
            budget_applied: false,
            auto_applied: false,
        };
        txn.key = crate::import::build_key(&crate::import::KeyInput::from(&txn));
        txn
    }

    /// Calendar month as `YYYY-MM`.
    pub(crate) fn month(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }

    pub(crate) fn in_session(&self, session_id: &str) -> bool {
        self.import_session_id.as_deref() == Some(session_id)
    }

    /// Staged and still waiting to be folded into budget actuals.
    pub(crate) fn is_pending(&self) -> bool {
        self.staged && !self.budget_applied
    }

    /// Flip a staged transaction into the budget. Returns false when there was
    /// nothing to do.
    pub(crate) fn mark_applied(&mut self, auto: bool) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.staged = false;
        self.budget_applied = true;
        self.auto_applied = auto;
        true
    }
}
