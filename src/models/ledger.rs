use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{
    ImportHistoryEntry, ImportManifest, SavingsCandidate, Transaction, TxnType,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct AccountState {
    pub(crate) transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SavingsReviewEntry {
    pub(crate) candidate: SavingsCandidate,
    pub(crate) queued_at: DateTime<Utc>,
}

/// One transaction folded into a month's budget actuals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ActualRow {
    pub(crate) transaction_id: String,
    pub(crate) account_number: String,
    pub(crate) session_id: Option<String>,
    pub(crate) category: Option<String>,
    pub(crate) txn_type: TxnType,
    pub(crate) amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct MonthlyActuals {
    pub(crate) rows: Vec<ActualRow>,
    pub(crate) income: Decimal,
    pub(crate) expenses: Decimal,
    pub(crate) savings: Decimal,
    pub(crate) net_income: Decimal,
}

impl MonthlyActuals {
    /// Rebuild the totals from the rows.
    pub(crate) fn recompute(&mut self) {
        let mut income = Decimal::ZERO;
        let mut expenses = Decimal::ZERO;
        let mut savings = Decimal::ZERO;
        for row in &self.rows {
            match row.txn_type {
                TxnType::Income => income += row.amount,
                TxnType::Expense => expenses += row.amount,
                TxnType::Savings => savings += row.amount,
            }
        }
        self.income = income;
        self.expenses = expenses;
        self.savings = savings;
        self.net_income = income + expenses;
    }

    pub(crate) fn has_transaction(&self, transaction_id: &str) -> bool {
        self.rows.iter().any(|r| r.transaction_id == transaction_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SavingsGoal {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) target: Option<Decimal>,
    /// Session and account that created this goal while linking a savings
    /// transfer. Goals created by hand carry neither.
    #[serde(default)]
    pub(crate) originated_session_id: Option<String>,
    #[serde(default)]
    pub(crate) originated_account_number: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SavingsLogEntry {
    pub(crate) id: String,
    pub(crate) goal_id: String,
    pub(crate) account_number: String,
    pub(crate) session_id: Option<String>,
    pub(crate) transaction_id: String,
    pub(crate) date: NaiveDate,
    pub(crate) amount: Decimal,
}

/// Everything the import lifecycle reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct LedgerState {
    pub(crate) accounts: BTreeMap<String, AccountState>,
    pub(crate) import_history: Vec<ImportHistoryEntry>,
    pub(crate) import_manifests: BTreeMap<String, ImportManifest>,
    pub(crate) pending_savings_by_account: BTreeMap<String, Vec<SavingsCandidate>>,
    pub(crate) savings_review_queue: Vec<SavingsReviewEntry>,
    /// `YYYY-MM` -> actuals
    pub(crate) monthly_actuals: BTreeMap<String, MonthlyActuals>,
    pub(crate) savings_log: Vec<SavingsLogEntry>,
    pub(crate) savings_goals: Vec<SavingsGoal>,
}

impl LedgerState {
    pub(crate) fn transactions(&self, account_number: &str) -> &[Transaction] {
        self.accounts
            .get(account_number)
            .map(|a| a.transactions.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn history_entry(
        &self,
        account_number: &str,
        session_id: &str,
    ) -> Option<&ImportHistoryEntry> {
        self.import_history
            .iter()
            .find(|h| h.is_for(account_number, session_id))
    }

    pub(crate) fn pending_savings(&self, account_number: &str) -> &[SavingsCandidate] {
        self.pending_savings_by_account
            .get(account_number)
            .map(|p| p.as_slice())
            .unwrap_or(&[])
    }

    /// Merge a patch produced by a lifecycle transition.
    pub(crate) fn apply(&mut self, patch: StatePatch) {
        for (account_number, account) in patch.accounts {
            self.accounts.insert(account_number, account);
        }
        if let Some(history) = patch.import_history {
            self.import_history = history;
        }
        if let Some(manifests) = patch.import_manifests {
            self.import_manifests = manifests;
        }
        if let Some(pending) = patch.pending_savings_by_account {
            self.pending_savings_by_account = pending;
        }
        if let Some(queue) = patch.savings_review_queue {
            self.savings_review_queue = queue;
        }
        if let Some(actuals) = patch.monthly_actuals {
            self.monthly_actuals = actuals;
        }
        if let Some(log) = patch.savings_log {
            self.savings_log = log;
        }
        if let Some(goals) = patch.savings_goals {
            self.savings_goals = goals;
        }
    }
}

/// The replacement slices produced by one lifecycle transition. Account
/// entries replace just that account; every `Some` slice replaces the whole
/// slice. An empty patch means the transition was a no-op.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StatePatch {
    pub(crate) accounts: BTreeMap<String, AccountState>,
    pub(crate) import_history: Option<Vec<ImportHistoryEntry>>,
    pub(crate) import_manifests: Option<BTreeMap<String, ImportManifest>>,
    pub(crate) pending_savings_by_account: Option<BTreeMap<String, Vec<SavingsCandidate>>>,
    pub(crate) savings_review_queue: Option<Vec<SavingsReviewEntry>>,
    pub(crate) monthly_actuals: Option<BTreeMap<String, MonthlyActuals>>,
    pub(crate) savings_log: Option<Vec<SavingsLogEntry>>,
    pub(crate) savings_goals: Option<Vec<SavingsGoal>>,
}

impl StatePatch {
    pub(crate) fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.import_history.is_none()
            && self.import_manifests.is_none()
            && self.pending_savings_by_account.is_none()
            && self.savings_review_queue.is_none()
            && self.monthly_actuals.is_none()
            && self.savings_log.is_none()
            && self.savings_goals.is_none()
    }
}
