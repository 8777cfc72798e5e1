use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ImportPlan;

/// Audit record for one import session on one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ImportHistoryEntry {
    pub(crate) session_id: String,
    pub(crate) account_number: String,
    pub(crate) imported_at: DateTime<Utc>,
    pub(crate) hash: String,
    pub(crate) new_count: usize,
    #[serde(default)]
    pub(crate) dupes_existing: Option<usize>,
    #[serde(default)]
    pub(crate) dupes_intra_file: Option<usize>,
    #[serde(default)]
    pub(crate) savings_count: Option<usize>,
    /// Set once by undo, never cleared.
    #[serde(default)]
    pub(crate) undone_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) removed: Option<usize>,
}

impl ImportHistoryEntry {
    pub(crate) fn from_plan(plan: &ImportPlan) -> Self {
        Self {
            session_id: plan.session.session_id.clone(),
            account_number: plan.session.account_number.clone(),
            imported_at: plan.session.imported_at,
            hash: plan.session.hash.clone(),
            new_count: plan.session.new_count,
            dupes_existing: Some(plan.stats.dupes_existing),
            dupes_intra_file: Some(plan.stats.dupes_intra_file),
            savings_count: Some(plan.savings_queue.len()),
            undone_at: None,
            removed: None,
        }
    }

    pub(crate) fn is_for(&self, account_number: &str, session_id: &str) -> bool {
        self.account_number == account_number && self.session_id == session_id
    }

    pub(crate) fn is_undone(&self) -> bool {
        self.undone_at.is_some()
    }

    pub(crate) fn undo_deadline(&self, window_minutes: i64) -> DateTime<Utc> {
        self.imported_at + chrono::Duration::minutes(window_minutes)
    }
}

/// Which accounts have already ingested a file with a given content hash.
/// Advisory only: it drives the re-import warning and never blocks a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ImportManifest {
    pub(crate) hash: String,
    pub(crate) first_seen_at: DateTime<Utc>,
    pub(crate) last_seen_at: DateTime<Utc>,
    /// account number -> session ids that ingested this file
    pub(crate) accounts: BTreeMap<String, Vec<String>>,
}

impl ImportManifest {
    pub(crate) fn new(hash: &str, at: DateTime<Utc>) -> Self {
        Self {
            hash: hash.to_string(),
            first_seen_at: at,
            last_seen_at: at,
            accounts: BTreeMap::new(),
        }
    }

    pub(crate) fn register(&mut self, account_number: &str, session_id: &str, at: DateTime<Utc>) {
        let sessions = self.accounts.entry(account_number.to_string()).or_default();
        if !sessions.iter().any(|s| s == session_id) {
            sessions.push(session_id.to_string());
        }
        if at > self.last_seen_at {
            self.last_seen_at = at;
        }
    }

    /// Drop `session_id` from `account_number`. Returns false when it was not
    /// registered.
    pub(crate) fn forget(&mut self, account_number: &str, session_id: &str) -> bool {
        let Some(sessions) = self.accounts.get_mut(account_number) else {
            return false;
        };
        let before = sessions.len();
        sessions.retain(|s| s != session_id);
        let removed = sessions.len() != before;
        if sessions.is_empty() {
            self.accounts.remove(account_number);
        }
        removed
    }

    pub(crate) fn is_unused(&self) -> bool {
        self.accounts.is_empty()
    }

    pub(crate) fn sessions_for(&self, account_number: &str) -> &[String] {
        self.accounts
            .get(account_number)
            .map(|s| s.as_slice())
            .unwrap_or(&[])
    }
}
