use tracing::info;

use crate::models::{AccountState, LedgerState, StatePatch};

/// Purge every trace of one session from one account: its transactions
/// (staged or applied), history entry, manifest registration, pending and
/// queued savings candidates, actuals rows, savings-log entries and the goals
/// it originated. Month totals are recomputed from the remaining rows and
/// months left without rows are dropped.
pub(crate) fn clear_session_everywhere(
    state: &LedgerState,
    account_number: &str,
    session_id: &str,
) -> StatePatch {
    let owned = |account: &str, session: Option<&str>| {
        account == account_number && session == Some(session_id)
    };
    let mut patch = StatePatch::default();

    let transactions = state.transactions(account_number);
    let kept: Vec<_> = transactions
        .iter()
        .filter(|t| !t.in_session(session_id))
        .cloned()
        .collect();
    let txns_removed = transactions.len() - kept.len();
    if txns_removed > 0 {
        patch
            .accounts
            .insert(account_number.to_string(), AccountState { transactions: kept });
    }

    let history: Vec<_> = state
        .import_history
        .iter()
        .filter(|h| !h.is_for(account_number, session_id))
        .cloned()
        .collect();
    if history.len() != state.import_history.len() {
        patch.import_history = Some(history);
    }

    let mut manifests = state.import_manifests.clone();
    let mut manifest_changed = false;
    for manifest in manifests.values_mut() {
        manifest_changed |= manifest.forget(account_number, session_id);
    }
    if manifest_changed {
        manifests.retain(|_, m| !m.is_unused());
        patch.import_manifests = Some(manifests);
    }

    let mut pending = state.pending_savings_by_account.clone();
    if let Some(entries) = pending.get_mut(account_number) {
        let before = entries.len();
        entries.retain(|c| c.session_id != session_id);
        if entries.len() != before {
            if entries.is_empty() {
                pending.remove(account_number);
            }
            patch.pending_savings_by_account = Some(pending);
        }
    }

    let queue: Vec<_> = state
        .savings_review_queue
        .iter()
        .filter(|e| {
            !owned(
                e.candidate.account_number.as_str(),
                Some(e.candidate.session_id.as_str()),
            )
        })
        .cloned()
        .collect();
    if queue.len() != state.savings_review_queue.len() {
        patch.savings_review_queue = Some(queue);
    }

    let mut actuals = state.monthly_actuals.clone();
    let mut actuals_changed = false;
    for month in actuals.values_mut() {
        let before = month.rows.len();
        month
            .rows
            .retain(|r| !owned(r.account_number.as_str(), r.session_id.as_deref()));
        if month.rows.len() != before {
            month.recompute();
            actuals_changed = true;
        }
    }
    if actuals_changed {
        actuals.retain(|_, m| !m.rows.is_empty());
        patch.monthly_actuals = Some(actuals);
    }

    let log: Vec<_> = state
        .savings_log
        .iter()
        .filter(|e| !owned(e.account_number.as_str(), e.session_id.as_deref()))
        .cloned()
        .collect();
    if log.len() != state.savings_log.len() {
        patch.savings_log = Some(log);
    }

    let goals: Vec<_> = state
        .savings_goals
        .iter()
        .filter(|g| {
            !owned(
                g.originated_account_number.as_deref().unwrap_or_default(),
                g.originated_session_id.as_deref(),
            )
        })
        .cloned()
        .collect();
    if goals.len() != state.savings_goals.len() {
        patch.savings_goals = Some(goals);
    }

    if !patch.is_empty() {
        info!(
            account = account_number,
            session = session_id,
            transactions = txns_removed,
            "Session cleared"
        );
    }
    patch
}
