#![allow(clippy::unwrap_used)]

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;

// ── Transaction ───────────────────────────────────────────────

fn make_txn(amount: Decimal) -> Transaction {
    Transaction::manual(
        "1234",
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        "Test",
        amount,
        if amount < Decimal::ZERO {
            TxnType::Expense
        } else {
            TxnType::Income
        },
    )
}

fn staged(amount: Decimal, session: &str) -> Transaction {
    let mut txn = make_txn(amount);
    txn.import_session_id = Some(session.into());
    txn.staged = true;
    txn
}

#[test]
fn test_display_amount() {
    assert_eq!(make_txn(dec!(1234.5)).amount, "$1,234.50");
    assert_eq!(make_txn(dec!(-50.00)).amount, "-$50.00");
}

#[test]
fn test_manual_transaction_has_key_and_no_session() {
    let txn = make_txn(dec!(-5));
    assert!(!txn.key.is_empty());
    assert!(txn.import_session_id.is_none());
    assert!(!txn.staged);
    assert!(!txn.is_pending());
}

#[test]
fn test_month() {
    assert_eq!(make_txn(dec!(1)).month(), "2024-01");
}

#[test]
fn test_mark_applied_flips_staged_once() {
    let mut txn = staged(dec!(-5), "s1");
    assert!(txn.is_pending());
    assert!(txn.mark_applied(true));
    assert!(!txn.staged);
    assert!(txn.budget_applied);
    assert!(txn.auto_applied);
    assert!(!txn.mark_applied(false));
    assert!(txn.auto_applied);
}

#[test]
fn test_mark_applied_ignores_unstaged() {
    let mut txn = make_txn(dec!(-5));
    assert!(!txn.mark_applied(false));
    assert!(!txn.budget_applied);
}

#[test]
fn test_txn_type_parse() {
    assert_eq!(TxnType::parse("Income"), Some(TxnType::Income));
    assert_eq!(TxnType::parse(" savings "), Some(TxnType::Savings));
    assert_eq!(TxnType::parse("transfer"), None);
    assert_eq!(TxnType::Expense.to_string(), "expense");
}

#[test]
fn test_transaction_serializes_type_field() {
    let json = serde_json::to_value(make_txn(dec!(-5))).unwrap();
    assert_eq!(json["type"], "expense");
    assert_eq!(json["staged"], false);
}

// ── MonthlyActuals ────────────────────────────────────────────

fn row(txn_type: TxnType, amount: Decimal) -> ActualRow {
    ActualRow {
        transaction_id: uuid::Uuid::new_v4().to_string(),
        account_number: "1234".into(),
        session_id: Some("s1".into()),
        category: None,
        txn_type,
        amount,
    }
}

#[test]
fn test_actuals_recompute() {
    let mut actuals = MonthlyActuals {
        rows: vec![
            row(TxnType::Income, dec!(1000)),
            row(TxnType::Expense, dec!(-250.50)),
            row(TxnType::Savings, dec!(-100)),
        ],
        ..MonthlyActuals::default()
    };
    actuals.recompute();
    assert_eq!(actuals.income, dec!(1000));
    assert_eq!(actuals.expenses, dec!(-250.50));
    assert_eq!(actuals.savings, dec!(-100));
    assert_eq!(actuals.net_income, dec!(749.50));

    actuals.rows.pop();
    actuals.rows.pop();
    actuals.recompute();
    assert_eq!(actuals.expenses, Decimal::ZERO);
    assert_eq!(actuals.net_income, dec!(1000));
}

#[test]
fn test_actuals_has_transaction() {
    let r = row(TxnType::Income, dec!(1));
    let id = r.transaction_id.clone();
    let actuals = MonthlyActuals {
        rows: vec![r],
        ..MonthlyActuals::default()
    };
    assert!(actuals.has_transaction(&id));
    assert!(!actuals.has_transaction("other"));
}

// ── ImportManifest ────────────────────────────────────────────

#[test]
fn test_manifest_register_is_idempotent() {
    let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let t1 = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
    let mut manifest = ImportManifest::new("abc", t0);
    manifest.register("1234", "s1", t1);
    manifest.register("1234", "s1", t0);
    manifest.register("9999", "s2", t0);

    assert_eq!(manifest.sessions_for("1234"), ["s1".to_string()]);
    assert_eq!(manifest.sessions_for("9999"), ["s2".to_string()]);
    assert!(manifest.sessions_for("0000").is_empty());
    assert_eq!(manifest.first_seen_at, t0);
    assert_eq!(manifest.last_seen_at, t1);
}

#[test]
fn test_manifest_forget() {
    let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut manifest = ImportManifest::new("abc", t0);
    manifest.register("1234", "s1", t0);
    manifest.register("1234", "s2", t0);

    assert!(manifest.forget("1234", "s1"));
    assert!(!manifest.forget("1234", "s1"));
    assert!(!manifest.forget("9999", "s2"));
    assert!(!manifest.is_unused());
    assert!(manifest.forget("1234", "s2"));
    assert!(manifest.is_unused());
    assert!(!manifest.accounts.contains_key("1234"));
}

// ── LedgerState / StatePatch ──────────────────────────────────

#[test]
fn test_empty_patch_changes_nothing() {
    let mut state = LedgerState::default();
    state
        .accounts
        .entry("1234".into())
        .or_default()
        .transactions
        .push(staged(dec!(-5), "s1"));
    let before = state.clone();

    let patch = StatePatch::default();
    assert!(patch.is_empty());
    state.apply(patch);
    assert_eq!(state, before);
}

#[test]
fn test_patch_replaces_only_named_slices() {
    let mut state = LedgerState::default();
    state.accounts.insert(
        "1234".into(),
        AccountState {
            transactions: vec![staged(dec!(-5), "s1")],
        },
    );
    state.accounts.insert(
        "9999".into(),
        AccountState {
            transactions: vec![staged(dec!(-7), "s2")],
        },
    );

    let mut patch = StatePatch::default();
    patch.accounts.insert("1234".into(), AccountState::default());
    patch.savings_goals = Some(Vec::new());
    assert!(!patch.is_empty());
    state.apply(patch);

    assert!(state.transactions("1234").is_empty());
    assert_eq!(state.transactions("9999").len(), 1);
    assert!(state.transactions("nope").is_empty());
}

#[test]
fn test_plan_months_sorted_and_distinct() {
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
    let mut feb = staged(dec!(-1), "s1");
    feb.date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
    let mut jan = staged(dec!(-1), "s1");
    jan.date = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
    let plan = ImportPlan {
        session: ImportSession {
            session_id: "s1".into(),
            account_number: "1234".into(),
            imported_at: at,
            hash: "0123456789abcdef".into(),
            new_count: 3,
        },
        accepted: vec![feb.clone(), jan, feb],
        stats: ImportStats::default(),
        errors: Vec::new(),
        duplicates_sample: Vec::new(),
        savings_queue: Vec::new(),
    };
    assert_eq!(plan.months(), vec!["2026-01", "2026-02"]);
    assert!(!plan.is_empty());

    let entry = ImportHistoryEntry::from_plan(&plan);
    assert_eq!(entry.new_count, 3);
    assert_eq!(entry.savings_count, Some(0));
    assert_eq!(entry.undo_deadline(30), at + chrono::Duration::minutes(30));
    assert!(!entry.is_undone());
}
