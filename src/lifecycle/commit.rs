use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::LifecycleError;
use crate::models::{
    AccountState, ImportHistoryEntry, ImportManifest, ImportPlan, LedgerState, StatePatch,
};

/// Stage a plan's accepted transactions into its account.
///
/// The patch carries the grown account, the new history entry, the manifest
/// registration and the queued savings candidates together, so merging it is
/// all-or-nothing. A plan with nothing accepted commits nothing.
pub(crate) fn commit_import(
    state: &LedgerState,
    plan: &ImportPlan,
    now: DateTime<Utc>,
) -> Result<StatePatch, LifecycleError> {
    let account_number = plan.session.account_number.as_str();
    let session_id = plan.session.session_id.as_str();

    if let Some(txn) = plan
        .accepted
        .iter()
        .find(|t| t.account_number != account_number)
    {
        return Err(LifecycleError::AccountMismatch {
            expected: account_number.to_string(),
            found: txn.account_number.clone(),
        });
    }

    let existing = state.transactions(account_number);
    if state.history_entry(account_number, session_id).is_some()
        || existing.iter().any(|t| t.in_session(session_id))
    {
        return Err(LifecycleError::AlreadyCommitted {
            session_id: session_id.to_string(),
            account_number: account_number.to_string(),
        });
    }

    if plan.is_empty() {
        return Ok(StatePatch::default());
    }

    let mut transactions = existing.to_vec();
    transactions.extend(plan.accepted.iter().cloned().map(|mut t| {
        t.staged = true;
        t.budget_applied = false;
        t
    }));

    let mut history = state.import_history.clone();
    history.push(ImportHistoryEntry::from_plan(plan));

    let mut manifests = state.import_manifests.clone();
    manifests
        .entry(plan.session.hash.clone())
        .or_insert_with(|| ImportManifest::new(&plan.session.hash, now))
        .register(account_number, session_id, now);

    let mut pending = state.pending_savings_by_account.clone();
    if !plan.savings_queue.is_empty() {
        pending
            .entry(account_number.to_string())
            .or_default()
            .extend(plan.savings_queue.iter().cloned());
    }

    info!(
        account = account_number,
        session = session_id,
        staged = plan.accepted.len(),
        savings = plan.savings_queue.len(),
        "Import committed"
    );

    let mut patch = StatePatch {
        import_history: Some(history),
        import_manifests: Some(manifests),
        pending_savings_by_account: Some(pending),
        ..StatePatch::default()
    };
    patch
        .accounts
        .insert(account_number.to_string(), AccountState { transactions });
    Ok(patch)
}
