/// Which header carries each field the normalizer needs. Names are the
/// original header spelling so they can be looked up in a `RawRow` directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ColumnMap {
    pub(crate) account: Option<String>,
    pub(crate) date: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) amount: Option<String>,
    pub(crate) debit: Option<String>,
    pub(crate) credit: Option<String>,
    pub(crate) category: Option<String>,
    pub(crate) balance: Option<String>,
}

const ACCOUNT_ALIASES: &[&str] = &["accountnumber", "account number", "account no", "account"];
const DATE_ALIASES: &[&str] = &[
    "posted date",
    "posting date",
    "date",
    "transaction date",
    "trans date",
];
const DESCRIPTION_ALIASES: &[&str] = &["description", "payee", "memo", "details", "name"];
const AMOUNT_ALIASES: &[&str] = &["amount", "transaction amount"];
const DEBIT_ALIASES: &[&str] = &["debit", "withdrawal", "withdrawals"];
const CREDIT_ALIASES: &[&str] = &["credit", "deposit", "deposits"];
const CATEGORY_ALIASES: &[&str] = &["category"];
const BALANCE_ALIASES: &[&str] = &["balance", "running bal.", "running balance"];

/// Map headers to fields. Aliases are tried in priority order, so a file with
/// both "Posted Date" and "Date" uses "Posted Date".
pub(crate) fn detect_columns(headers: &[String]) -> ColumnMap {
    ColumnMap {
        account: find(headers, ACCOUNT_ALIASES),
        date: find(headers, DATE_ALIASES),
        description: find(headers, DESCRIPTION_ALIASES),
        amount: find(headers, AMOUNT_ALIASES),
        debit: find(headers, DEBIT_ALIASES),
        credit: find(headers, CREDIT_ALIASES),
        category: find(headers, CATEGORY_ALIASES),
        balance: find(headers, BALANCE_ALIASES),
    }
}

fn find(headers: &[String], aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| {
        headers
            .iter()
            .find(|h| normalize_header(h) == *alias)
            .cloned()
    })
}

fn normalize_header(h: &str) -> String {
    h.trim()
        .trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('_', " ")
        .to_lowercase()
}
