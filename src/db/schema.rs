pub(crate) const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS accounts (
    account_number TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS transactions (
    id                TEXT PRIMARY KEY,
    position          INTEGER NOT NULL,
    account_number    TEXT NOT NULL,
    key               TEXT NOT NULL,
    date              TEXT NOT NULL,
    description       TEXT NOT NULL,
    raw_amount        TEXT NOT NULL,
    amount            TEXT NOT NULL,
    txn_type          TEXT NOT NULL,
    category          TEXT,
    balance           TEXT,
    import_session_id TEXT,
    staged            BOOLEAN NOT NULL DEFAULT 0,
    budget_applied    BOOLEAN NOT NULL DEFAULT 0,
    auto_applied      BOOLEAN NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_number, position);
CREATE INDEX IF NOT EXISTS idx_transactions_session ON transactions(import_session_id);

CREATE TABLE IF NOT EXISTS import_history (
    position         INTEGER NOT NULL,
    session_id       TEXT NOT NULL,
    account_number   TEXT NOT NULL,
    imported_at      TEXT NOT NULL,
    hash             TEXT NOT NULL,
    new_count        INTEGER NOT NULL,
    dupes_existing   INTEGER,
    dupes_intra_file INTEGER,
    savings_count    INTEGER,
    undone_at        TEXT,
    removed          INTEGER,
    UNIQUE(session_id, account_number)
);

CREATE TABLE IF NOT EXISTS import_manifests (
    hash          TEXT PRIMARY KEY,
    first_seen_at TEXT NOT NULL,
    last_seen_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS import_manifest_sessions (
    hash           TEXT NOT NULL REFERENCES import_manifests(hash) ON DELETE CASCADE,
    position       INTEGER NOT NULL,
    account_number TEXT NOT NULL,
    session_id     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pending_savings (
    position       INTEGER NOT NULL,
    account_number TEXT NOT NULL,
    session_id     TEXT NOT NULL,
    transaction_id TEXT NOT NULL,
    date           TEXT NOT NULL,
    description    TEXT NOT NULL,
    raw_amount     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS savings_review_queue (
    position       INTEGER NOT NULL,
    account_number TEXT NOT NULL,
    session_id     TEXT NOT NULL,
    transaction_id TEXT NOT NULL,
    date           TEXT NOT NULL,
    description    TEXT NOT NULL,
    raw_amount     TEXT NOT NULL,
    queued_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS monthly_actuals (
    month          TEXT NOT NULL,
    position       INTEGER NOT NULL,
    transaction_id TEXT NOT NULL,
    account_number TEXT NOT NULL,
    session_id     TEXT,
    category       TEXT,
    txn_type       TEXT NOT NULL,
    amount         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_actuals_month ON monthly_actuals(month, position);

CREATE TABLE IF NOT EXISTS savings_goals (
    id                        TEXT PRIMARY KEY,
    position                  INTEGER NOT NULL,
    name                      TEXT NOT NULL,
    target                    TEXT,
    originated_session_id     TEXT,
    originated_account_number TEXT,
    created_at                TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS savings_log (
    id             TEXT PRIMARY KEY,
    position       INTEGER NOT NULL,
    goal_id        TEXT NOT NULL,
    account_number TEXT NOT NULL,
    session_id     TEXT,
    transaction_id TEXT NOT NULL,
    date           TEXT NOT NULL,
    amount         TEXT NOT NULL
);
"#;

pub(crate) const CURRENT_VERSION: i32 = 1;

/// Migrations from version N to N+1.
/// Each entry is (from_version, sql).
pub(crate) const MIGRATIONS: &[(i32, &str)] = &[];

/// Every table `save_state` rewrites, children before parents.
pub(crate) const STATE_TABLES: &[&str] = &[
    "transactions",
    "accounts",
    "import_history",
    "import_manifest_sessions",
    "import_manifests",
    "pending_savings",
    "savings_review_queue",
    "monthly_actuals",
    "savings_log",
    "savings_goals",
];
