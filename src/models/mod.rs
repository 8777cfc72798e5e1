mod category_rule;
mod history;
mod import_plan;
mod ledger;
mod transaction;

pub(crate) use category_rule::{CategoryRule, RuleKind};
pub(crate) use history::{ImportHistoryEntry, ImportManifest};
pub(crate) use import_plan::{
    CategorySource, CategorySourceCounts, DuplicateSample, ImportPlan, ImportSession,
    ImportStats, SavingsCandidate, StageTimings,
};
pub(crate) use ledger::{
    AccountState, ActualRow, LedgerState, MonthlyActuals, SavingsGoal, SavingsLogEntry,
    SavingsReviewEntry, StatePatch,
};
pub(crate) use transaction::{Transaction, TxnType};

#[cfg(test)]
mod tests;
