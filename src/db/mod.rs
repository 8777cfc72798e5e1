mod schema;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::models::*;

/// SQLite store for the whole ledger. The lifecycle works on an in-memory
/// `LedgerState`; this layer only loads it and writes it back.
pub(crate) struct Database {
    conn: Connection,
}

impl Database {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("Failed to set database pragmas")?;
        let mut db = Self { conn };
        db.migrate().context("Database migration failed")?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&mut self) -> Result<()> {
        let has_version_table: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            self.conn.execute_batch(schema::SCHEMA_V1)?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            return Ok(());
        }

        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                self.conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            self.conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
        }

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn schema_version(&self) -> Result<i32> {
        Ok(self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })?)
    }

    // ── Load ──────────────────────────────────────────────────

    pub(crate) fn load_state(&self) -> Result<LedgerState> {
        let mut state = LedgerState::default();

        for account_number in self.read_accounts()? {
            state.accounts.entry(account_number).or_default();
        }
        for txn in self.read_transactions()? {
            state
                .accounts
                .entry(txn.account_number.clone())
                .or_default()
                .transactions
                .push(txn);
        }

        state.import_history = self.read_history()?;
        state.import_manifests = self.read_manifests()?;

        for candidate in self.read_pending_savings()? {
            state
                .pending_savings_by_account
                .entry(candidate.account_number.clone())
                .or_default()
                .push(candidate);
        }
        state.savings_review_queue = self.read_review_queue()?;

        for (month, row) in self.read_actual_rows()? {
            state.monthly_actuals.entry(month).or_default().rows.push(row);
        }
        for actuals in state.monthly_actuals.values_mut() {
            actuals.recompute();
        }

        state.savings_goals = self.read_goals()?;
        state.savings_log = self.read_savings_log()?;

        debug!(
            accounts = state.accounts.len(),
            history = state.import_history.len(),
            "Loaded ledger state"
        );
        Ok(state)
    }

    fn read_accounts(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT account_number FROM accounts ORDER BY account_number")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn read_transactions(&self) -> Result<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, key, account_number, date, description, raw_amount, amount,
                    txn_type, category, balance, import_session_id, staged,
                    budget_applied, auto_applied
             FROM transactions
             ORDER BY account_number, position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Transaction {
                id: row.get(0)?,
                key: row.get(1)?,
                account_number: row.get(2)?,
                date: parse_col(row, 3)?,
                description: row.get(4)?,
                raw_amount: parse_col(row, 5)?,
                amount: row.get(6)?,
                txn_type: txn_type_col(row, 7)?,
                category: row.get(8)?,
                balance: parse_opt_col(row, 9)?,
                import_session_id: row.get(10)?,
                staged: row.get(11)?,
                budget_applied: row.get(12)?,
                auto_applied: row.get(13)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn read_history(&self) -> Result<Vec<ImportHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, account_number, imported_at, hash, new_count,
                    dupes_existing, dupes_intra_file, savings_count, undone_at, removed
             FROM import_history
             ORDER BY position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ImportHistoryEntry {
                session_id: row.get(0)?,
                account_number: row.get(1)?,
                imported_at: parse_col(row, 2)?,
                hash: row.get(3)?,
                new_count: count_col(row, 4)?,
                dupes_existing: opt_count_col(row, 5)?,
                dupes_intra_file: opt_count_col(row, 6)?,
                savings_count: opt_count_col(row, 7)?,
                undone_at: parse_opt_col(row, 8)?,
                removed: opt_count_col(row, 9)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn read_manifests(&self) -> Result<BTreeMap<String, ImportManifest>> {
        let mut manifests = BTreeMap::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT hash, first_seen_at, last_seen_at FROM import_manifests")?;
            let rows = stmt.query_map([], |row| {
                Ok(ImportManifest {
                    hash: row.get(0)?,
                    first_seen_at: parse_col(row, 1)?,
                    last_seen_at: parse_col(row, 2)?,
                    accounts: BTreeMap::new(),
                })
            })?;
            for manifest in rows {
                let manifest = manifest?;
                manifests.insert(manifest.hash.clone(), manifest);
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT hash, account_number, session_id
             FROM import_manifest_sessions
             ORDER BY hash, position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (hash, account_number, session_id) = row?;
            if let Some(manifest) = manifests.get_mut(&hash) {
                manifest
                    .accounts
                    .entry(account_number)
                    .or_default()
                    .push(session_id);
            }
        }
        Ok(manifests)
    }

    fn read_pending_savings(&self) -> Result<Vec<SavingsCandidate>> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, account_number, transaction_id, date, description, raw_amount
             FROM pending_savings
             ORDER BY account_number, position",
        )?;
        let rows = stmt.query_map([], candidate_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn read_review_queue(&self) -> Result<Vec<SavingsReviewEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, account_number, transaction_id, date, description, raw_amount,
                    queued_at
             FROM savings_review_queue
             ORDER BY position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SavingsReviewEntry {
                candidate: candidate_from_row(row)?,
                queued_at: parse_col(row, 6)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn read_actual_rows(&self) -> Result<Vec<(String, ActualRow)>> {
        let mut stmt = self.conn.prepare(
            "SELECT month, transaction_id, account_number, session_id, category, txn_type, amount
             FROM monthly_actuals
             ORDER BY month, position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get(0)?,
                ActualRow {
                    transaction_id: row.get(1)?,
                    account_number: row.get(2)?,
                    session_id: row.get(3)?,
                    category: row.get(4)?,
                    txn_type: txn_type_col(row, 5)?,
                    amount: parse_col(row, 6)?,
                },
            ))
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn read_goals(&self) -> Result<Vec<SavingsGoal>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, target, originated_session_id, originated_account_number, created_at
             FROM savings_goals
             ORDER BY position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SavingsGoal {
                id: row.get(0)?,
                name: row.get(1)?,
                target: parse_opt_col(row, 2)?,
                originated_session_id: row.get(3)?,
                originated_account_number: row.get(4)?,
                created_at: parse_col(row, 5)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn read_savings_log(&self) -> Result<Vec<SavingsLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, goal_id, account_number, session_id, transaction_id, date, amount
             FROM savings_log
             ORDER BY position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SavingsLogEntry {
                id: row.get(0)?,
                goal_id: row.get(1)?,
                account_number: row.get(2)?,
                session_id: row.get(3)?,
                transaction_id: row.get(4)?,
                date: parse_col(row, 5)?,
                amount: parse_col(row, 6)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // ── Save ──────────────────────────────────────────────────

    /// Replace every stored slice with `state` inside one transaction, so a
    /// failed write leaves the previous state intact.
    pub(crate) fn save_state(&mut self, state: &LedgerState) -> Result<()> {
        let tx = self.conn.transaction()?;
        for table in schema::STATE_TABLES {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }
        write_accounts(&tx, state)?;
        write_history(&tx, &state.import_history)?;
        write_manifests(&tx, &state.import_manifests)?;
        write_pending_savings(&tx, &state.pending_savings_by_account)?;
        write_review_queue(&tx, &state.savings_review_queue)?;
        write_actuals(&tx, &state.monthly_actuals)?;
        write_goals(&tx, &state.savings_goals)?;
        write_savings_log(&tx, &state.savings_log)?;
        tx.commit().context("Failed to save ledger state")?;
        debug!(accounts = state.accounts.len(), "Saved ledger state");
        Ok(())
    }
}

fn write_accounts(conn: &Connection, state: &LedgerState) -> Result<()> {
    let mut account_stmt = conn.prepare("INSERT INTO accounts (account_number) VALUES (?1)")?;
    let mut txn_stmt = conn.prepare(
        "INSERT INTO transactions (id, position, account_number, key, date, description,
            raw_amount, amount, txn_type, category, balance, import_session_id, staged,
            budget_applied, auto_applied)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    )?;
    for (account_number, account) in &state.accounts {
        account_stmt.execute(params![account_number])?;
        for (position, txn) in account.transactions.iter().enumerate() {
            txn_stmt
                .execute(params![
                    txn.id,
                    position as i64,
                    txn.account_number,
                    txn.key,
                    txn.date.to_string(),
                    txn.description,
                    txn.raw_amount.to_string(),
                    txn.amount,
                    txn.txn_type.as_str(),
                    txn.category,
                    txn.balance.map(|b| b.to_string()),
                    txn.import_session_id,
                    txn.staged,
                    txn.budget_applied,
                    txn.auto_applied,
                ])
                .with_context(|| format!("Failed to save transaction {}", txn.id))?;
        }
    }
    Ok(())
}

fn write_history(conn: &Connection, history: &[ImportHistoryEntry]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO import_history (position, session_id, account_number, imported_at, hash,
            new_count, dupes_existing, dupes_intra_file, savings_count, undone_at, removed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    for (position, entry) in history.iter().enumerate() {
        stmt.execute(params![
            position as i64,
            entry.session_id,
            entry.account_number,
            entry.imported_at.to_rfc3339(),
            entry.hash,
            entry.new_count as i64,
            entry.dupes_existing.map(|n| n as i64),
            entry.dupes_intra_file.map(|n| n as i64),
            entry.savings_count.map(|n| n as i64),
            entry.undone_at.map(|t| t.to_rfc3339()),
            entry.removed.map(|n| n as i64),
        ])?;
    }
    Ok(())
}

fn write_manifests(conn: &Connection, manifests: &BTreeMap<String, ImportManifest>) -> Result<()> {
    let mut manifest_stmt = conn.prepare(
        "INSERT INTO import_manifests (hash, first_seen_at, last_seen_at) VALUES (?1, ?2, ?3)",
    )?;
    let mut session_stmt = conn.prepare(
        "INSERT INTO import_manifest_sessions (hash, position, account_number, session_id)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for manifest in manifests.values() {
        manifest_stmt.execute(params![
            manifest.hash,
            manifest.first_seen_at.to_rfc3339(),
            manifest.last_seen_at.to_rfc3339(),
        ])?;
        let mut position = 0i64;
        for (account_number, sessions) in &manifest.accounts {
            for session_id in sessions {
                session_stmt.execute(params![manifest.hash, position, account_number, session_id])?;
                position += 1;
            }
        }
    }
    Ok(())
}

fn write_pending_savings(
    conn: &Connection,
    pending: &BTreeMap<String, Vec<SavingsCandidate>>,
) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO pending_savings (position, account_number, session_id, transaction_id,
            date, description, raw_amount)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for (account_number, candidates) in pending {
        for (position, c) in candidates.iter().enumerate() {
            stmt.execute(params![
                position as i64,
                account_number,
                c.session_id,
                c.transaction_id,
                c.date.to_string(),
                c.description,
                c.raw_amount.to_string(),
            ])?;
        }
    }
    Ok(())
}

fn write_review_queue(conn: &Connection, queue: &[SavingsReviewEntry]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO savings_review_queue (position, account_number, session_id, transaction_id,
            date, description, raw_amount, queued_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (position, entry) in queue.iter().enumerate() {
        let c = &entry.candidate;
        stmt.execute(params![
            position as i64,
            c.account_number,
            c.session_id,
            c.transaction_id,
            c.date.to_string(),
            c.description,
            c.raw_amount.to_string(),
            entry.queued_at.to_rfc3339(),
        ])?;
    }
    Ok(())
}

// Totals are not stored; `load_state` recomputes them from the rows.
fn write_actuals(conn: &Connection, actuals: &BTreeMap<String, MonthlyActuals>) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO monthly_actuals (month, position, transaction_id, account_number,
            session_id, category, txn_type, amount)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (month, month_actuals) in actuals {
        for (position, row) in month_actuals.rows.iter().enumerate() {
            stmt.execute(params![
                month,
                position as i64,
                row.transaction_id,
                row.account_number,
                row.session_id,
                row.category,
                row.txn_type.as_str(),
                row.amount.to_string(),
            ])?;
        }
    }
    Ok(())
}

fn write_goals(conn: &Connection, goals: &[SavingsGoal]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO savings_goals (id, position, name, target, originated_session_id,
            originated_account_number, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for (position, goal) in goals.iter().enumerate() {
        stmt.execute(params![
            goal.id,
            position as i64,
            goal.name,
            goal.target.map(|t| t.to_string()),
            goal.originated_session_id,
            goal.originated_account_number,
            goal.created_at.to_rfc3339(),
        ])?;
    }
    Ok(())
}

fn write_savings_log(conn: &Connection, log: &[SavingsLogEntry]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO savings_log (id, position, goal_id, account_number, session_id,
            transaction_id, date, amount)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (position, entry) in log.iter().enumerate() {
        stmt.execute(params![
            entry.id,
            position as i64,
            entry.goal_id,
            entry.account_number,
            entry.session_id,
            entry.transaction_id,
            entry.date.to_string(),
            entry.amount.to_string(),
        ])?;
    }
    Ok(())
}

// ── Column conversion ─────────────────────────────────────────

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse::<T>().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn txn_type_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<TxnType> {
    let raw: String = row.get(idx)?;
    TxnType::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown transaction type: {raw}").into(),
        )
    })
}

fn count_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<usize> {
    let n: i64 = row.get(idx)?;
    usize::try_from(n).map_err(|e| conversion_error(idx, e))
}

fn opt_count_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<usize>> {
    let n: Option<i64> = row.get(idx)?;
    n.map(|n| usize::try_from(n).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn candidate_from_row(row: &Row<'_>) -> rusqlite::Result<SavingsCandidate> {
    Ok(SavingsCandidate {
        session_id: row.get(0)?,
        account_number: row.get(1)?,
        transaction_id: row.get(2)?,
        date: parse_col::<NaiveDate>(row, 3)?,
        description: row.get(4)?,
        raw_amount: parse_col::<Decimal>(row, 5)?,
    })
}

#[cfg(test)]
mod tests;
