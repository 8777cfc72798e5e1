use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};

use crate::models::{
    AccountState, ActualRow, LedgerState, MonthlyActuals, StatePatch, Transaction,
};
use crate::schedule::{run_batched, AbortHandle, Yield};

/// Flip staged transactions in `months` to applied and fold them into the
/// monthly actuals. With `session_id` set only that session's transactions
/// are touched. Already-applied and hand-entered transactions are left alone,
/// so repeating a call is a no-op.
pub(crate) fn mark_transactions_budget_applied(
    state: &LedgerState,
    account_number: &str,
    session_id: Option<&str>,
    months: &[String],
) -> StatePatch {
    apply_months(state, account_number, session_id, months).0
}

fn apply_months(
    state: &LedgerState,
    account_number: &str,
    session_id: Option<&str>,
    months: &[String],
) -> (StatePatch, usize) {
    let mut transactions = state.transactions(account_number).to_vec();
    let mut applied = Vec::new();
    for txn in &mut transactions {
        let in_scope = txn.import_session_id.is_some()
            && session_id.map_or(true, |s| txn.in_session(s))
            && months.contains(&txn.month());
        if in_scope && txn.mark_applied(false) {
            applied.push(txn.clone());
        }
    }
    if applied.is_empty() {
        return (StatePatch::default(), 0);
    }

    let mut actuals = state.monthly_actuals.clone();
    fold_into_actuals(&mut actuals, &applied);

    info!(
        account = account_number,
        session = session_id.unwrap_or("*"),
        months = months.len(),
        applied = applied.len(),
        "Staged transactions applied"
    );

    let mut patch = StatePatch {
        monthly_actuals: Some(actuals),
        ..StatePatch::default()
    };
    patch
        .accounts
        .insert(account_number.to_string(), AccountState { transactions });
    (patch, applied.len())
}

/// Add one actuals row per transaction (skipping ones already folded in) and
/// recompute the totals of every month touched.
pub(super) fn fold_into_actuals(
    actuals: &mut BTreeMap<String, MonthlyActuals>,
    txns: &[Transaction],
) {
    let mut touched = BTreeSet::new();
    for txn in txns {
        let month = txn.month();
        let entry = actuals.entry(month.clone()).or_default();
        if entry.has_transaction(&txn.id) {
            continue;
        }
        entry.rows.push(ActualRow {
            transaction_id: txn.id.clone(),
            account_number: txn.account_number.clone(),
            session_id: txn.import_session_id.clone(),
            category: txn.category.clone(),
            txn_type: txn.txn_type,
            amount: txn.raw_amount,
        });
        touched.insert(month);
    }
    for month in touched {
        if let Some(entry) = actuals.get_mut(&month) {
            entry.recompute();
        }
    }
}

/// Outcome of [`apply_in_batches`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct BatchApply {
    pub(crate) months_done: usize,
    pub(crate) applied: usize,
    /// Stopped before every month was processed. Completed batches stay
    /// applied.
    pub(crate) cancelled: bool,
}

/// Apply `months` a few at a time, merging each batch into `state` and then
/// handing control to `on_yield(months_done, months_total)`. The abort handle
/// is checked before every batch.
pub(crate) fn apply_in_batches<Y>(
    state: &mut LedgerState,
    account_number: &str,
    session_id: Option<&str>,
    months: &[String],
    batch_months: usize,
    abort: &AbortHandle,
    mut on_yield: Y,
) -> BatchApply
where
    Y: FnMut(usize, usize) -> Yield,
{
    let mut applied = 0;
    let total = months.len();
    let (months_done, cancelled) = run_batched(
        months,
        batch_months,
        abort,
        |batch| {
            let (patch, n) = apply_months(state, account_number, session_id, batch);
            applied += n;
            state.apply(patch);
        },
        |batches, done| {
            debug!(batches, done, total, "Apply batch finished");
            on_yield(done, total)
        },
    );
    BatchApply {
        months_done,
        applied,
        cancelled,
    }
}

/// Silently apply transactions that have sat staged for too long.
///
/// The effective age is the larger of `max_age_days` and the undo window so a
/// session can never expire while it is still undoable. `max_age_days <= 0`
/// turns the sweep off. Expired transactions are marked `auto_applied`.
pub(crate) fn auto_expire_staged(
    state: &LedgerState,
    max_age_days: i64,
    undo_window_minutes: i64,
    now: DateTime<Utc>,
) -> StatePatch {
    if max_age_days <= 0 {
        return StatePatch::default();
    }
    let max_age = Duration::days(max_age_days).max(Duration::minutes(undo_window_minutes));
    let cutoff = now - max_age;

    let expired: HashSet<(&str, &str)> = state
        .import_history
        .iter()
        .filter(|h| !h.is_undone() && h.imported_at < cutoff)
        .map(|h| (h.account_number.as_str(), h.session_id.as_str()))
        .collect();
    if expired.is_empty() {
        return StatePatch::default();
    }

    let mut patch = StatePatch::default();
    let mut applied = Vec::new();
    for (account_number, account) in &state.accounts {
        let mut transactions = account.transactions.clone();
        let before = applied.len();
        for txn in &mut transactions {
            let is_expired = txn
                .import_session_id
                .as_deref()
                .is_some_and(|s| expired.contains(&(account_number.as_str(), s)));
            if is_expired && txn.mark_applied(true) {
                applied.push(txn.clone());
            }
        }
        if applied.len() > before {
            patch
                .accounts
                .insert(account_number.clone(), AccountState { transactions });
        }
    }
    if applied.is_empty() {
        return patch;
    }

    let mut actuals = state.monthly_actuals.clone();
    fold_into_actuals(&mut actuals, &applied);
    patch.monthly_actuals = Some(actuals);

    info!(
        accounts = patch.accounts.len(),
        applied = applied.len(),
        "Auto-expired staged transactions"
    );
    patch
}
