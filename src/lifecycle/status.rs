use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ImportHistoryEntry, LedgerState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum ImportStatus {
    Active,
    Expired,
    Applied,
    PartialApplied,
    Undone,
    PartialUndone,
}

impl ImportStatus {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Applied => "applied",
            Self::PartialApplied => "partial-applied",
            Self::Undone => "undone",
            Self::PartialUndone => "partial-undone",
        }
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct SessionStatus {
    pub(crate) session_id: String,
    pub(crate) account_number: String,
    pub(crate) status: ImportStatus,
    pub(crate) new_count: usize,
    pub(crate) staged: usize,
    pub(crate) applied: usize,
    pub(crate) removed: usize,
    pub(crate) can_undo: bool,
    pub(crate) undo_deadline: DateTime<Utc>,
}

/// Status of one session, derived from its history entry and the
/// transactions currently tagged with it. `None` when there is no entry.
pub(crate) fn import_status(
    state: &LedgerState,
    account_number: &str,
    session_id: &str,
    now: DateTime<Utc>,
    undo_window_minutes: i64,
) -> Option<SessionStatus> {
    state
        .history_entry(account_number, session_id)
        .map(|entry| derive(state, entry, now, undo_window_minutes))
}

/// Every recorded session of an account, oldest first.
pub(crate) fn session_statuses(
    state: &LedgerState,
    account_number: &str,
    now: DateTime<Utc>,
    undo_window_minutes: i64,
) -> Vec<SessionStatus> {
    let mut entries: Vec<&ImportHistoryEntry> = state
        .import_history
        .iter()
        .filter(|h| h.account_number == account_number)
        .collect();
    entries.sort_by_key(|h| h.imported_at);
    entries
        .into_iter()
        .map(|entry| derive(state, entry, now, undo_window_minutes))
        .collect()
}

fn derive(
    state: &LedgerState,
    entry: &ImportHistoryEntry,
    now: DateTime<Utc>,
    undo_window_minutes: i64,
) -> SessionStatus {
    let (staged, applied) = state
        .transactions(&entry.account_number)
        .iter()
        .filter(|t| t.in_session(&entry.session_id))
        .fold((0, 0), |(staged, applied), t| {
            (
                staged + usize::from(t.is_pending()),
                applied + usize::from(t.budget_applied),
            )
        });
    let removed = entry.removed.unwrap_or(0);
    let deadline = entry.undo_deadline(undo_window_minutes);

    let status = if entry.is_undone() {
        if removed >= entry.new_count {
            ImportStatus::Undone
        } else {
            ImportStatus::PartialUndone
        }
    } else if staged > 0 {
        if now <= deadline {
            ImportStatus::Active
        } else {
            ImportStatus::Expired
        }
    } else if applied >= entry.new_count {
        ImportStatus::Applied
    } else {
        ImportStatus::PartialApplied
    };

    SessionStatus {
        session_id: entry.session_id.clone(),
        account_number: entry.account_number.clone(),
        status,
        new_count: entry.new_count,
        staged,
        applied,
        removed,
        can_undo: status == ImportStatus::Active,
        undo_deadline: deadline,
    }
}
