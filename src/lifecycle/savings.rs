use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::{
    LedgerState, SavingsCandidate, SavingsGoal, SavingsLogEntry, SavingsReviewEntry, StatePatch,
};

/// Move an account's pending savings candidates into the review queue,
/// optionally only those from one session.
pub(crate) fn defer_pending_savings(
    state: &LedgerState,
    account_number: &str,
    session_id: Option<&str>,
    now: DateTime<Utc>,
) -> StatePatch {
    let pending_for_account = state.pending_savings(account_number);
    let (deferred, kept): (Vec<SavingsCandidate>, Vec<SavingsCandidate>) = pending_for_account
        .iter()
        .cloned()
        .partition(|c| session_id.map_or(true, |s| c.session_id == s));
    if deferred.is_empty() {
        return StatePatch::default();
    }

    let mut pending = state.pending_savings_by_account.clone();
    if kept.is_empty() {
        pending.remove(account_number);
    } else {
        pending.insert(account_number.to_string(), kept);
    }

    let mut queue = state.savings_review_queue.clone();
    let count = deferred.len();
    queue.extend(deferred.into_iter().map(|candidate| SavingsReviewEntry {
        candidate,
        queued_at: now,
    }));

    info!(account = account_number, deferred = count, "Savings candidates deferred");
    StatePatch {
        pending_savings_by_account: Some(pending),
        savings_review_queue: Some(queue),
        ..StatePatch::default()
    }
}

/// Link one pending or queued savings candidate to the goal named
/// `goal_name` (case-insensitive), creating the goal if needed. New goals are
/// tagged with the candidate's session and account. Returns an empty patch
/// when no such candidate is waiting.
pub(crate) fn link_savings(
    state: &LedgerState,
    account_number: &str,
    session_id: &str,
    transaction_id: &str,
    goal_name: &str,
    now: DateTime<Utc>,
) -> StatePatch {
    let is_target = |c: &SavingsCandidate| {
        c.account_number == account_number
            && c.session_id == session_id
            && c.transaction_id == transaction_id
    };

    let candidate = state
        .pending_savings(account_number)
        .iter()
        .find(|c| is_target(*c))
        .or_else(|| {
            state
                .savings_review_queue
                .iter()
                .map(|e| &e.candidate)
                .find(|c| is_target(*c))
        });
    let Some(candidate) = candidate.cloned() else {
        return StatePatch::default();
    };
    let goal_name = goal_name.trim();
    if goal_name.is_empty() {
        return StatePatch::default();
    }

    let mut goals = state.savings_goals.clone();
    let goal_id = match goals
        .iter()
        .find(|g| g.name.eq_ignore_ascii_case(goal_name))
    {
        Some(goal) => goal.id.clone(),
        None => {
            let goal = SavingsGoal {
                id: uuid::Uuid::new_v4().to_string(),
                name: goal_name.to_string(),
                target: None,
                originated_session_id: Some(session_id.to_string()),
                originated_account_number: Some(account_number.to_string()),
                created_at: now,
            };
            let id = goal.id.clone();
            goals.push(goal);
            id
        }
    };

    let mut log = state.savings_log.clone();
    log.push(SavingsLogEntry {
        id: uuid::Uuid::new_v4().to_string(),
        goal_id,
        account_number: account_number.to_string(),
        session_id: Some(session_id.to_string()),
        transaction_id: transaction_id.to_string(),
        date: candidate.date,
        amount: candidate.raw_amount.abs(),
    });

    let mut pending = state.pending_savings_by_account.clone();
    if let Some(entries) = pending.get_mut(account_number) {
        entries.retain(|c| !is_target(c));
        if entries.is_empty() {
            pending.remove(account_number);
        }
    }
    let queue = state
        .savings_review_queue
        .iter()
        .filter(|e| !is_target(&e.candidate))
        .cloned()
        .collect();

    info!(
        account = account_number,
        session = session_id,
        goal = goal_name,
        amount = %candidate.raw_amount.abs(),
        "Savings transfer linked"
    );
    StatePatch {
        pending_savings_by_account: Some(pending),
        savings_review_queue: Some(queue),
        savings_log: Some(log),
        savings_goals: Some(goals),
        ..StatePatch::default()
    }
}
