use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::models::{LedgerState, StatePatch};

/// Sessions for `account_number` that already ingested a file with `hash`.
/// Empty when the file is new to that account.
pub(crate) fn manifest_warning(state: &LedgerState, hash: &str, account_number: &str) -> Vec<String> {
    state
        .import_manifests
        .get(hash)
        .map(|m| m.sessions_for(account_number).to_vec())
        .unwrap_or_default()
}

/// Drop history entries older than `max_age_days`, then keep only the newest
/// `max_entries`. Zero disables either limit. Transactions are not touched,
/// so a pruned session that is still staged can only be applied or cleared
/// explicitly.
pub(crate) fn prune_import_history(
    state: &LedgerState,
    max_entries: usize,
    max_age_days: i64,
    now: DateTime<Utc>,
) -> StatePatch {
    let mut history = state.import_history.clone();
    if max_age_days > 0 {
        let cutoff = now - Duration::days(max_age_days);
        history.retain(|h| h.imported_at >= cutoff);
    }
    if max_entries > 0 && history.len() > max_entries {
        history.sort_by_key(|h| h.imported_at);
        let excess = history.len() - max_entries;
        history.drain(..excess);
    }

    let dropped = state.import_history.len() - history.len();
    if dropped == 0 {
        return StatePatch::default();
    }
    for entry in &state.import_history {
        let kept = history
            .iter()
            .any(|h| h.is_for(&entry.account_number, &entry.session_id));
        let still_staged = state
            .transactions(&entry.account_number)
            .iter()
            .any(|t| t.in_session(&entry.session_id) && t.is_pending());
        if !kept && still_staged {
            warn!(
                account = %entry.account_number,
                session = %entry.session_id,
                "Pruned a session that still has staged rows; it will no longer auto-expire or undo"
            );
        }
    }
    info!(dropped, kept = history.len(), "Import history pruned");
    StatePatch {
        import_history: Some(history),
        ..StatePatch::default()
    }
}
