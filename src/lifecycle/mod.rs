//! Import lifecycle transitions.
//!
//! Every operation reads a [`LedgerState`] and returns a [`StatePatch`] holding
//! complete replacements for the slices it touched. Callers merge the patch
//! with [`LedgerState::apply`] and persist it in one store transaction. An
//! empty patch is a valid outcome and means nothing changed.
//!
//! [`LedgerState`]: crate::models::LedgerState
//! [`LedgerState::apply`]: crate::models::LedgerState::apply
//! [`StatePatch`]: crate::models::StatePatch

mod apply;
mod audit;
mod clear;
mod commit;
mod savings;
mod status;
mod undo;

pub(crate) use apply::{
    apply_in_batches, auto_expire_staged, mark_transactions_budget_applied, BatchApply,
};
pub(crate) use audit::{manifest_warning, prune_import_history};
pub(crate) use clear::clear_session_everywhere;
pub(crate) use commit::commit_import;
pub(crate) use savings::{defer_pending_savings, link_savings};
pub(crate) use status::{import_status, session_statuses, ImportStatus, SessionStatus};
pub(crate) use undo::undo_staged_import;
