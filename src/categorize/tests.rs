#![allow(clippy::unwrap_used)]

use super::*;
use crate::models::TxnType;
use chrono::NaiveDate;
use rust_decimal_macros::dec;

fn make_txn(desc: &str, category: Option<&str>) -> Transaction {
    let mut txn = Transaction::manual(
        "1234",
        NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        desc,
        dec!(-10.00),
        TxnType::Expense,
    );
    txn.category = category.map(str::to_string);
    txn
}

fn no_rules() -> Categorizer {
    Categorizer::new(&[]).0
}

// ── Categorizer ───────────────────────────────────────────────

#[test]
fn test_keyword_match_case_insensitive() {
    let rules = vec![CategoryRule::new_keyword("Coffee", "Coffee Shops")];
    let (cat, bad) = Categorizer::new(&rules);
    assert!(bad.is_empty());
    assert_eq!(
        cat.infer(None, "BLUE BOTTLE COFFEE #12"),
        (Some("Coffee Shops".into()), CategorySource::Keyword)
    );
}

#[test]
fn test_provided_category_wins() {
    let rules = vec![CategoryRule::new_keyword("coffee", "Coffee Shops")];
    let (cat, _) = Categorizer::new(&rules);
    assert_eq!(
        cat.infer(Some(" Dining "), "coffee"),
        (Some("Dining".into()), CategorySource::Provided)
    );
}

#[test]
fn test_placeholder_category_is_ignored() {
    let rules = vec![CategoryRule::new_keyword("coffee", "Coffee Shops")];
    let (cat, _) = Categorizer::new(&rules);
    for placeholder in ["", "Uncategorized", "OTHER", "n/a", "-"] {
        let (category, source) = cat.infer(Some(placeholder), "coffee");
        assert_eq!(category.as_deref(), Some("Coffee Shops"), "{placeholder}");
        assert_eq!(source, CategorySource::Keyword);
    }
}

#[test]
fn test_keyword_before_regex() {
    let rules = vec![
        CategoryRule::new_regex(r"^amzn", "Shopping"),
        CategoryRule::new_keyword("prime video", "Streaming"),
    ];
    let (cat, _) = Categorizer::new(&rules);
    assert_eq!(
        cat.infer(None, "AMZN Prime Video"),
        (Some("Streaming".into()), CategorySource::Keyword)
    );
    assert_eq!(
        cat.infer(None, "AMZN Mktp US"),
        (Some("Shopping".into()), CategorySource::Regex)
    );
}

#[test]
fn test_priority_orders_rules() {
    let rules = vec![
        CategoryRule::new_keyword("shop", "General"),
        CategoryRule::new_keyword("coffee shop", "Coffee Shops").with_priority(5),
    ];
    let (cat, _) = Categorizer::new(&rules);
    assert_eq!(cat.infer(None, "Corner Coffee Shop").0.as_deref(), Some("Coffee Shops"));
    assert_eq!(cat.infer(None, "Gift Shop").0.as_deref(), Some("General"));
}

#[test]
fn test_first_match_wins_on_equal_priority() {
    let rules = vec![
        CategoryRule::new_keyword("shop", "General"),
        CategoryRule::new_keyword("coffee shop", "Coffee Shops"),
    ];
    let (cat, _) = Categorizer::new(&rules);
    assert_eq!(cat.infer(None, "Corner Coffee Shop").0.as_deref(), Some("General"));
}

#[test]
fn test_invalid_regex_is_reported_and_skipped() {
    let rules = vec![
        CategoryRule::new_regex("[invalid", "Broken"),
        CategoryRule::new_regex(r"^uber\b", "Ride Share"),
    ];
    let (cat, bad) = Categorizer::new(&rules);
    assert_eq!(bad, vec!["[invalid".to_string()]);
    assert_eq!(cat.infer(None, "UBER TRIP").0.as_deref(), Some("Ride Share"));
}

#[test]
fn test_no_match_yields_none() {
    assert_eq!(no_rules().infer(None, "Mystery"), (None, CategorySource::None));
}

#[test]
fn test_defaults_apply_after_user_rules() {
    let user = vec![CategoryRule::new_keyword("starbucks", "Treats")];
    let (cat, bad) = Categorizer::with_defaults(&user);
    assert!(bad.is_empty());
    assert_eq!(cat.infer(None, "STARBUCKS 0042").0.as_deref(), Some("Treats"));
    assert_eq!(cat.infer(None, "ACME PAYROLL").0.as_deref(), Some("Income"));
    assert_eq!(cat.infer(None, "AMAZON MKTPLACE").0.as_deref(), Some("Shopping"));
}

// ── vendor_key ────────────────────────────────────────────────

#[test]
fn test_vendor_key_strips_reference_noise() {
    assert_eq!(vendor_key("STARBUCKS #1234"), "starbucks");
    assert_eq!(vendor_key("Corner Bodega 0042 NYC"), "corner bodega nyc");
    assert_eq!(vendor_key("corner   bodega 7781"), "corner bodega");
    assert_eq!(vendor_key("SQ *BLUE BOTTLE"), "sq blue bottle");
    assert_eq!(vendor_key("12345"), "");
}

#[test]
fn test_vendor_key_keeps_merchant_after_bank_prefix() {
    assert_eq!(vendor_key("POS PURCHASE STARBUCKS 123"), "pos purchase starbucks");
    assert_ne!(
        vendor_key("POS PURCHASE STARBUCKS 123"),
        vendor_key("POS PURCHASE ACME HARDWARE 77")
    );
}

// ── apply_vendor_consensus ────────────────────────────────────

#[test]
fn test_consensus_fills_unlabeled_from_same_vendor() {
    let mut txns = vec![
        make_txn("Corner Bodega 0042", Some("Groceries")),
        make_txn("CORNER BODEGA 0099", None),
    ];
    let mut sources = vec![CategorySource::Provided, CategorySource::None];
    let filled = apply_vendor_consensus(&mut txns, &mut sources, &ConsensusPolicy::default());
    assert_eq!(filled, 1);
    assert_eq!(txns[1].category.as_deref(), Some("Groceries"));
    assert_eq!(sources[1], CategorySource::Consensus);
}

#[test]
fn test_consensus_requires_strict_majority() {
    let mut txns = vec![
        make_txn("Corner Bodega 1", Some("Groceries")),
        make_txn("Corner Bodega 2", Some("Snacks")),
        make_txn("Corner Bodega 3", None),
    ];
    let mut sources = vec![
        CategorySource::Provided,
        CategorySource::Provided,
        CategorySource::None,
    ];
    let filled = apply_vendor_consensus(&mut txns, &mut sources, &ConsensusPolicy::default());
    assert_eq!(filled, 0);
    assert!(txns[2].category.is_none());
    assert_eq!(sources[2], CategorySource::None);
}

#[test]
fn test_consensus_respects_min_labeled() {
    let mut txns = vec![
        make_txn("Corner Bodega 1", Some("Groceries")),
        make_txn("Corner Bodega 2", None),
    ];
    let mut sources = vec![CategorySource::Keyword, CategorySource::None];
    let policy = ConsensusPolicy {
        min_labeled: 2,
        min_share: 0.5,
    };
    assert_eq!(apply_vendor_consensus(&mut txns, &mut sources, &policy), 0);
}

#[test]
fn test_consensus_ignores_other_vendors() {
    let mut txns = vec![
        make_txn("Corner Bodega 1", Some("Groceries")),
        make_txn("Mystery Vendor", None),
    ];
    let mut sources = vec![CategorySource::Provided, CategorySource::None];
    assert_eq!(
        apply_vendor_consensus(&mut txns, &mut sources, &ConsensusPolicy::default()),
        0
    );
    assert!(txns[1].category.is_none());
}

#[test]
fn test_consensus_keeps_shared_prefix_vendors_apart() {
    let mut txns = vec![
        make_txn("POS PURCHASE STARBUCKS 123", Some("Coffee Shops")),
        make_txn("POS PURCHASE ACME HARDWARE 77", None),
        make_txn("POS PURCHASE STARBUCKS 456", None),
    ];
    let mut sources = vec![
        CategorySource::Provided,
        CategorySource::None,
        CategorySource::None,
    ];
    let filled = apply_vendor_consensus(&mut txns, &mut sources, &ConsensusPolicy::default());
    assert_eq!(filled, 1);
    assert!(txns[1].category.is_none());
    assert_eq!(sources[1], CategorySource::None);
    assert_eq!(txns[2].category.as_deref(), Some("Coffee Shops"));
}

#[test]
fn test_consensus_does_not_vote_with_consensus_labels() {
    let mut txns = vec![
        make_txn("Corner Bodega 1", Some("Groceries")),
        make_txn("Corner Bodega 2", None),
    ];
    let mut sources = vec![CategorySource::Consensus, CategorySource::None];
    assert_eq!(
        apply_vendor_consensus(&mut txns, &mut sources, &ConsensusPolicy::default()),
        0
    );
}
