use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::models::{AccountState, LedgerState, StatePatch};

/// Remove whatever a session still has staged, inside the undo window.
///
/// Returns an empty patch when the session has no history entry, was already
/// undone, is past `imported_at + undo_window_minutes`, or has nothing left
/// staged. Transactions already applied stay; the history entry then records
/// fewer `removed` than `new_count`. Savings candidates from the session are
/// dropped from both the pending list and the review queue.
pub(crate) fn undo_staged_import(
    state: &LedgerState,
    account_number: &str,
    session_id: &str,
    now: DateTime<Utc>,
    undo_window_minutes: i64,
) -> StatePatch {
    let Some(entry) = state.history_entry(account_number, session_id) else {
        debug!(account = account_number, session = session_id, "Undo: no such session");
        return StatePatch::default();
    };
    if entry.is_undone() || now > entry.undo_deadline(undo_window_minutes) {
        debug!(account = account_number, session = session_id, "Undo: not undoable");
        return StatePatch::default();
    }

    let (removed, kept): (Vec<_>, Vec<_>) = state
        .transactions(account_number)
        .iter()
        .cloned()
        .partition(|t| t.in_session(session_id) && t.is_pending());
    if removed.is_empty() {
        return StatePatch::default();
    }

    let history = state
        .import_history
        .iter()
        .cloned()
        .map(|mut h| {
            if h.is_for(account_number, session_id) {
                h.undone_at = Some(now);
                h.removed = Some(removed.len());
            }
            h
        })
        .collect();

    let mut pending = state.pending_savings_by_account.clone();
    if let Some(entries) = pending.get_mut(account_number) {
        entries.retain(|c| c.session_id != session_id);
        if entries.is_empty() {
            pending.remove(account_number);
        }
    }

    let queue: Vec<_> = state
        .savings_review_queue
        .iter()
        .filter(|e| {
            e.candidate.account_number != account_number || e.candidate.session_id != session_id
        })
        .cloned()
        .collect();
    let queue_changed = queue.len() != state.savings_review_queue.len();

    info!(
        account = account_number,
        session = session_id,
        removed = removed.len(),
        "Import undone"
    );

    let mut patch = StatePatch {
        import_history: Some(history),
        pending_savings_by_account: Some(pending),
        savings_review_queue: queue_changed.then_some(queue),
        ..StatePatch::default()
    };
    patch
        .accounts
        .insert(account_number.to_string(), AccountState { transactions: kept });
    patch
}
