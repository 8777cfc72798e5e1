#![allow(clippy::unwrap_used)]

use super::*;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;

use crate::categorize::{Categorizer, ConsensusPolicy};
use crate::clock::FixedClock;
use crate::import::{analyze_import, AnalyzeOptions, ImportSource};
use crate::lifecycle::{
    commit_import, defer_pending_savings, link_savings, mark_transactions_budget_applied,
    undo_staged_import,
};

const ACCOUNT: &str = "1234";

const STATEMENT: &str = "date,description,amount,balance\n\
                         2026-01-15,ACME PAYROLL,1500.00,2500.00\n\
                         2026-02-02,Corner Grocer,-20.50,2479.50\n\
                         2026-02-10,XFER TO SAVINGS,-200.00,2279.50\n";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

fn stage(state: &mut LedgerState, csv: &str, session: &str, at: DateTime<Utc>) {
    let (cat, _) = Categorizer::with_defaults(&[]);
    let opts = AnalyzeOptions {
        session_id: Some(session.into()),
        categorizer: &cat,
        consensus: ConsensusPolicy::default(),
        duplicate_error_cap: 200,
        duplicate_sample_size: 25,
    };
    let plan = analyze_import(
        ImportSource::Text(csv),
        state.transactions(ACCOUNT),
        ACCOUNT,
        &opts,
        &FixedClock(at),
    )
    .unwrap();
    state.apply(commit_import(state, &plan, at).unwrap());
}

/// A state with every slice populated.
fn busy_state() -> LedgerState {
    let mut state = LedgerState::default();
    stage(&mut state, STATEMENT, "s1", t0());
    state.apply(mark_transactions_budget_applied(
        &state,
        ACCOUNT,
        Some("s1"),
        &["2026-01".to_string()],
    ));

    let savings_id = state.pending_savings(ACCOUNT)[0].transaction_id.clone();
    state.apply(link_savings(&state, ACCOUNT, "s1", &savings_id, "Emergency Fund", t0()));

    stage(
        &mut state,
        "date,description,amount\n2026-03-01,XFER TO SAVINGS,-50.00\n",
        "s2",
        t0(),
    );
    state.apply(defer_pending_savings(&state, ACCOUNT, Some("s2"), t0()));

    stage(
        &mut state,
        "date,description,amount\n2026-03-05,Coffee,-4.00\n",
        "s3",
        t0(),
    );
    state.apply(undo_staged_import(&state, ACCOUNT, "s3", t0(), 30));

    let mut manual = Transaction::manual(
        ACCOUNT,
        NaiveDate::from_ymd_opt(2026, 3, 6).unwrap(),
        "Cash gift",
        dec!(40),
        TxnType::Income,
    );
    manual.category = Some("Gifts".into());
    state
        .accounts
        .get_mut(ACCOUNT)
        .unwrap()
        .transactions
        .push(manual);
    state
}

// ── Schema ────────────────────────────────────────────────────

#[test]
fn test_fresh_database_is_at_current_version() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.schema_version().unwrap(), schema::CURRENT_VERSION);
}

#[test]
fn test_fresh_database_loads_empty_state() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.load_state().unwrap(), LedgerState::default());
}

#[test]
fn test_reopen_keeps_version_and_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let state = busy_state();
    {
        let mut db = Database::open(&path).unwrap();
        db.save_state(&state).unwrap();
    }
    let db = Database::open(&path).unwrap();
    assert_eq!(db.schema_version().unwrap(), schema::CURRENT_VERSION);
    assert_eq!(db.load_state().unwrap(), state);
}

// ── Round trip ────────────────────────────────────────────────

#[test]
fn test_save_then_load_preserves_every_slice() {
    let state = busy_state();
    assert!(!state.import_history.is_empty());
    assert!(!state.import_manifests.is_empty());
    assert!(!state.savings_review_queue.is_empty());
    assert!(!state.monthly_actuals.is_empty());
    assert!(!state.savings_log.is_empty());
    assert!(!state.savings_goals.is_empty());

    let mut db = Database::open_in_memory().unwrap();
    db.save_state(&state).unwrap();
    let loaded = db.load_state().unwrap();

    assert_eq!(loaded.accounts, state.accounts);
    assert_eq!(loaded.import_history, state.import_history);
    assert_eq!(loaded.import_manifests, state.import_manifests);
    assert_eq!(loaded.pending_savings_by_account, state.pending_savings_by_account);
    assert_eq!(loaded.savings_review_queue, state.savings_review_queue);
    assert_eq!(loaded.monthly_actuals, state.monthly_actuals);
    assert_eq!(loaded.savings_log, state.savings_log);
    assert_eq!(loaded.savings_goals, state.savings_goals);
}

#[test]
fn test_transaction_order_and_flags_survive() {
    let state = busy_state();
    let mut db = Database::open_in_memory().unwrap();
    db.save_state(&state).unwrap();
    let loaded = db.load_state().unwrap();

    let ids: Vec<&str> = loaded.transactions(ACCOUNT).iter().map(|t| t.id.as_str()).collect();
    let expected: Vec<&str> = state.transactions(ACCOUNT).iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, expected);

    let payroll = &loaded.transactions(ACCOUNT)[0];
    assert!(payroll.budget_applied);
    assert!(!payroll.staged);
    assert_eq!(payroll.balance, Some(dec!(2500.00)));
    assert_eq!(payroll.raw_amount, dec!(1500));

    let manual = loaded.transactions(ACCOUNT).last().unwrap();
    assert!(manual.import_session_id.is_none());
    assert_eq!(manual.category.as_deref(), Some("Gifts"));
}

#[test]
fn test_transaction_columns_survive() {
    let state = busy_state();
    let mut db = Database::open_in_memory().unwrap();
    db.save_state(&state).unwrap();
    let loaded = db.load_state().unwrap();

    let grocer = &loaded.transactions(ACCOUNT)[1];
    assert_eq!(grocer.description, "Corner Grocer");
    assert_eq!(grocer.raw_amount, dec!(-20.50));
    assert_eq!(grocer.amount, "-$20.50");
    assert_eq!(grocer.date, NaiveDate::from_ymd_opt(2026, 2, 2).unwrap());

    let manual = loaded.transactions(ACCOUNT).last().unwrap();
    assert_eq!(manual.description, "Cash gift");
    assert_eq!(manual.txn_type, TxnType::Income);
}

#[test]
fn test_undone_history_survives() {
    let state = busy_state();
    let mut db = Database::open_in_memory().unwrap();
    db.save_state(&state).unwrap();
    let loaded = db.load_state().unwrap();

    let entry = loaded.history_entry(ACCOUNT, "s3").unwrap();
    assert_eq!(entry.undone_at, Some(t0()));
    assert_eq!(entry.removed, Some(1));
}

#[test]
fn test_actual_totals_are_recomputed_on_load() {
    let state = busy_state();
    let mut db = Database::open_in_memory().unwrap();
    db.save_state(&state).unwrap();
    let loaded = db.load_state().unwrap();

    let jan = &loaded.monthly_actuals["2026-01"];
    assert_eq!(jan.income, dec!(1500.00));
    assert_eq!(jan.net_income, dec!(1500.00));
}

#[test]
fn test_account_without_transactions_survives() {
    let mut state = LedgerState::default();
    state.accounts.insert("9999".into(), AccountState::default());
    let mut db = Database::open_in_memory().unwrap();
    db.save_state(&state).unwrap();
    assert_eq!(db.load_state().unwrap(), state);
}

// ── Replace semantics ─────────────────────────────────────────

#[test]
fn test_save_replaces_previous_state() {
    let mut db = Database::open_in_memory().unwrap();
    db.save_state(&busy_state()).unwrap();

    let mut smaller = LedgerState::default();
    stage(&mut smaller, "date,description,amount\n2026-04-01,Rent,-900\n", "s9", t0());
    db.save_state(&smaller).unwrap();

    let loaded = db.load_state().unwrap();
    assert_eq!(loaded, smaller);
    assert!(loaded.savings_goals.is_empty());
    assert_eq!(loaded.import_history.len(), 1);
}

#[test]
fn test_saving_default_state_clears_everything() {
    let mut db = Database::open_in_memory().unwrap();
    db.save_state(&busy_state()).unwrap();
    db.save_state(&LedgerState::default()).unwrap();
    assert_eq!(db.load_state().unwrap(), LedgerState::default());
}

// ── Corrupt data ──────────────────────────────────────────────

#[test]
fn test_bad_decimal_is_reported() {
    let mut db = Database::open_in_memory().unwrap();
    db.save_state(&busy_state()).unwrap();
    db.conn
        .execute("UPDATE transactions SET raw_amount = 'lots' WHERE position = 0", [])
        .unwrap();
    assert!(db.load_state().is_err());
}

#[test]
fn test_unknown_txn_type_is_reported() {
    let mut db = Database::open_in_memory().unwrap();
    db.save_state(&busy_state()).unwrap();
    db.conn
        .execute("UPDATE transactions SET txn_type = 'transfer'", [])
        .unwrap();
    let err = db.load_state().unwrap_err();
    assert!(format!("{err:#}").contains("transfer"));
}
