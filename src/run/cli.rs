use anyhow::{bail, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::categorize::Categorizer;
use crate::clock::{Clock, SystemClock};
use crate::db::Database;
use crate::import::{
    analyze_file, parse_json_rows, read_source, should_stream, AnalyzeOptions, CsvStream,
    ImportSource, StreamOptions,
};
use crate::lifecycle::{
    apply_in_batches, auto_expire_staged, clear_session_everywhere, commit_import,
    defer_pending_savings, import_status, link_savings, manifest_warning, prune_import_history,
    session_statuses, undo_staged_import, SessionStatus,
};
use crate::models::{ImportPlan, LedgerState, StatePatch};
use crate::schedule::{AbortHandle, Yield};
use crate::settings::{load_settings, save_settings, Settings};
use crate::util::{format_amount, is_month, truncate};

/// How many row errors `import` prints before summarizing the rest.
const ERROR_PREVIEW: usize = 10;

/// Everything a command needs: the loaded ledger and where to write it back.
pub(crate) struct Context {
    db: Database,
    state: LedgerState,
    settings: Settings,
    categorizer: Categorizer,
    clock: SystemClock,
}

impl Context {
    pub(crate) fn open(db_path: &Path, settings: Settings) -> Result<Self> {
        let db = Database::open(db_path)?;
        let state = db.load_state()?;
        let (categorizer, _) = Categorizer::with_defaults(&settings.rules);
        Ok(Self {
            db,
            state,
            settings,
            categorizer,
            clock: SystemClock::new(),
        })
    }

    fn window(&self) -> i64 {
        self.settings.import_undo_window_minutes
    }

    /// Merge `patch` and persist. Returns false for a no-op patch, which is
    /// not written.
    fn commit_patch(&mut self, patch: StatePatch) -> Result<bool> {
        if patch.is_empty() {
            return Ok(false);
        }
        self.state.apply(patch);
        self.db.save_state(&self.state)?;
        Ok(true)
    }

    // ── import ────────────────────────────────────────────────

    pub(crate) fn import(
        &mut self,
        file: &str,
        account: Option<&str>,
        commit: bool,
        force_stream: bool,
        json: bool,
    ) -> Result<()> {
        let path = PathBuf::from(shellexpand(file));
        if !path.exists() {
            bail!("File not found: {}", path.display());
        }
        let text = read_source(&path)?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let source = if is_json {
            ImportSource::Rows(parse_json_rows(&text)?)
        } else if force_stream || should_stream(&text, &self.settings) {
            let (stream, _abort) =
                CsvStream::start(text.clone(), StreamOptions::from_settings(&self.settings))?;
            let outcome = stream.run(|p| {
                debug!(
                    rows = p.rows_parsed,
                    bytes = p.bytes_consumed,
                    total = p.total_bytes,
                    "Streaming CSV"
                );
            });
            ImportSource::Streamed {
                text: &text,
                parsed: outcome.parsed,
            }
        } else {
            ImportSource::Text(&text)
        };

        let options = AnalyzeOptions::from_settings(&self.settings, &self.categorizer);
        let plans = analyze_file(source, &self.state, account, &options, &self.clock)?;

        for plan in &plans {
            let seen = manifest_warning(
                &self.state,
                &plan.session.hash,
                &plan.session.account_number,
            );
            if !seen.is_empty() {
                warn!(
                    account = %plan.session.account_number,
                    hash = %plan.session.hash,
                    sessions = seen.len(),
                    "File was imported before"
                );
            }

            if json {
                println!("{}", serde_json::to_string_pretty(plan)?);
            } else {
                print_plan(plan, &seen);
            }
        }

        if !commit {
            if !json {
                println!();
                println!("Dry run. Re-run with --commit to stage these transactions.");
            }
            return Ok(());
        }

        let now = self.clock.now();
        let mut staged = 0;
        for plan in &plans {
            let patch = commit_import(&self.state, plan, now)?;
            if !patch.is_empty() {
                staged += plan.accepted.len();
                self.state.apply(patch);
            }
        }
        self.db.save_state(&self.state)?;
        if !json {
            println!();
            println!(
                "Staged {staged} transactions. Undo is possible for {} minutes.",
                self.window()
            );
        }
        Ok(())
    }

    // ── apply / undo ──────────────────────────────────────────

    pub(crate) fn apply(
        &mut self,
        account: &str,
        months: &[String],
        session: Option<&str>,
    ) -> Result<()> {
        if let Some(bad) = months.iter().find(|m| !is_month(m)) {
            bail!("Invalid month '{bad}', expected YYYY-MM");
        }
        let months: Vec<String> = if months.is_empty() {
            staged_months(&self.state, account, session)
        } else {
            months.to_vec()
        };
        if months.is_empty() {
            println!("Nothing staged for account {account}");
            return Ok(());
        }

        let abort = AbortHandle::new();
        let batch = self.settings.apply_batch_months;
        let result = apply_in_batches(
            &mut self.state,
            account,
            session,
            &months,
            batch,
            &abort,
            |done, total| {
                eprintln!("  applied {done}/{total} months");
                Yield::Continue
            },
        );
        if result.applied > 0 {
            self.db.save_state(&self.state)?;
        }
        println!(
            "Applied {} transactions across {} months",
            result.applied, result.months_done
        );
        Ok(())
    }

    pub(crate) fn undo(&mut self, account: &str, session: &str) -> Result<()> {
        let now = self.clock.now();
        let window = self.window();
        let Some(before) = import_status(&self.state, account, session, now, window) else {
            bail!("No import session {session} for account {account}");
        };

        let patch = undo_staged_import(&self.state, account, session, now, window);
        if !self.commit_patch(patch)? {
            println!(
                "Nothing to undo: session is {} (undo window closed {})",
                before.status,
                before.undo_deadline.format("%Y-%m-%d %H:%M UTC")
            );
            return Ok(());
        }

        let removed = self
            .state
            .history_entry(account, session)
            .and_then(|h| h.removed)
            .unwrap_or(0);
        println!("Removed {removed} staged transactions from session {session}");
        if before.applied > 0 {
            println!("  {} already applied transactions were kept", before.applied);
        }
        Ok(())
    }

    // ── status / history ──────────────────────────────────────

    pub(crate) fn status(&self, account: &str, session: Option<&str>, json: bool) -> Result<()> {
        let now = self.clock.now();
        let statuses: Vec<SessionStatus> = match session {
            Some(s) => match import_status(&self.state, account, s, now, self.window()) {
                Some(status) => vec![status],
                None => bail!("No import session {s} for account {account}"),
            },
            None => session_statuses(&self.state, account, now, self.window()),
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&statuses)?);
            return Ok(());
        }
        if statuses.is_empty() {
            println!("No imports for account {account}");
            return Ok(());
        }

        println!(
            "{:<38} {:<16} {:>6} {:>7} {:>8} {:>8}  Undo until",
            "Session", "Status", "New", "Staged", "Applied", "Removed"
        );
        println!("{}", "─".repeat(110));
        for s in &statuses {
            let deadline = if s.can_undo {
                s.undo_deadline.format("%Y-%m-%d %H:%M").to_string()
            } else {
                "-".to_string()
            };
            println!(
                "{:<38} {:<16} {:>6} {:>7} {:>8} {:>8}  {}",
                truncate(&s.session_id, 38),
                s.status,
                s.new_count,
                s.staged,
                s.applied,
                s.removed,
                deadline
            );
        }
        Ok(())
    }

    pub(crate) fn history(&self, account: Option<&str>) -> Result<()> {
        let entries: Vec<_> = self
            .state
            .import_history
            .iter()
            .filter(|h| account.map_or(true, |a| h.account_number == a))
            .collect();
        if entries.is_empty() {
            println!("No import history");
            return Ok(());
        }

        println!(
            "{:<17} {:<12} {:<38} {:>5} {:>6} {:>6}  Undone",
            "Imported", "Account", "Session", "New", "Dupes", "Saved"
        );
        println!("{}", "─".repeat(100));
        for h in entries {
            let dupes = h.dupes_existing.unwrap_or(0) + h.dupes_intra_file.unwrap_or(0);
            let undone = match (h.undone_at, h.removed) {
                (Some(at), Some(n)) => format!("{} ({n} removed)", at.format("%Y-%m-%d %H:%M")),
                (Some(at), None) => at.format("%Y-%m-%d %H:%M").to_string(),
                _ => String::new(),
            };
            println!(
                "{:<17} {:<12} {:<38} {:>5} {:>6} {:>6}  {}",
                h.imported_at.format("%Y-%m-%d %H:%M"),
                truncate(&h.account_number, 12),
                truncate(&h.session_id, 38),
                h.new_count,
                dupes,
                h.savings_count.unwrap_or(0),
                undone
            );
        }
        Ok(())
    }

    // ── maintenance ───────────────────────────────────────────

    pub(crate) fn expire(&mut self) -> Result<()> {
        let before = pending_count(&self.state);
        let patch = auto_expire_staged(
            &self.state,
            self.settings.staged_auto_expire_days,
            self.window(),
            self.clock.now(),
        );
        self.commit_patch(patch)?;
        let expired = before - pending_count(&self.state);
        println!("Auto-applied {expired} staged transactions");
        Ok(())
    }

    pub(crate) fn prune(&mut self) -> Result<()> {
        let before = self.state.import_history.len();
        let patch = prune_import_history(
            &self.state,
            self.settings.import_history_max_entries,
            self.settings.import_history_max_age_days,
            self.clock.now(),
        );
        self.commit_patch(patch)?;
        println!(
            "Pruned {} history entries, {} kept",
            before - self.state.import_history.len(),
            self.state.import_history.len()
        );
        Ok(())
    }

    pub(crate) fn clear_session(&mut self, account: &str, session: &str) -> Result<()> {
        let before = self.state.transactions(account).len();
        let patch = clear_session_everywhere(&self.state, account, session);
        if !self.commit_patch(patch)? {
            println!("Nothing recorded for session {session} on account {account}");
            return Ok(());
        }
        println!(
            "Cleared session {session}: {} transactions removed",
            before - self.state.transactions(account).len()
        );
        Ok(())
    }

    // ── savings ───────────────────────────────────────────────

    pub(crate) fn pending(&self, account: Option<&str>) -> Result<()> {
        let pending: Vec<_> = self
            .state
            .pending_savings_by_account
            .iter()
            .filter(|(a, _)| account.map_or(true, |acct| a.as_str() == acct))
            .flat_map(|(_, entries)| entries)
            .collect();
        let queued: Vec<_> = self
            .state
            .savings_review_queue
            .iter()
            .filter(|e| account.map_or(true, |a| e.candidate.account_number == a))
            .collect();

        if pending.is_empty() && queued.is_empty() {
            println!("No savings transfers waiting");
            return Ok(());
        }
        if !pending.is_empty() {
            println!("Pending:");
            for c in pending {
                println!(
                    "  {} {:<12} {:<28} {:>12}  {} {}",
                    c.date,
                    c.account_number,
                    truncate(&c.description, 28),
                    format_amount(c.raw_amount),
                    c.session_id,
                    c.transaction_id
                );
            }
        }
        if !queued.is_empty() {
            println!("Deferred for review:");
            for e in queued {
                let c = &e.candidate;
                println!(
                    "  {} {:<12} {:<28} {:>12}  {} {}",
                    c.date,
                    c.account_number,
                    truncate(&c.description, 28),
                    format_amount(c.raw_amount),
                    c.session_id,
                    c.transaction_id
                );
            }
        }
        Ok(())
    }

    pub(crate) fn defer_savings(&mut self, account: &str, session: Option<&str>) -> Result<()> {
        let before = self.state.savings_review_queue.len();
        let patch = defer_pending_savings(&self.state, account, session, self.clock.now());
        self.commit_patch(patch)?;
        println!(
            "Deferred {} savings transfers",
            self.state.savings_review_queue.len() - before
        );
        Ok(())
    }

    pub(crate) fn link_savings(
        &mut self,
        account: &str,
        session: &str,
        transaction: &str,
        goal: &str,
    ) -> Result<()> {
        if goal.trim().is_empty() {
            bail!("Goal name cannot be empty");
        }
        let patch = link_savings(
            &self.state,
            account,
            session,
            transaction,
            goal,
            self.clock.now(),
        );
        if !self.commit_patch(patch)? {
            bail!("No savings transfer {transaction} waiting in session {session}");
        }
        println!("Linked {transaction} to goal '{}'", goal.trim());
        Ok(())
    }
}

// ── helpers ───────────────────────────────────────────────────

pub(crate) fn config(path: &Path, init: bool) -> Result<()> {
    if init {
        if path.exists() {
            println!("Settings already exist at {}", path.display());
        } else {
            save_settings(path, &Settings::default())?;
            println!("Wrote default settings to {}", path.display());
        }
    }
    let settings = load_settings(path)?;
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

fn print_plan(plan: &ImportPlan, seen_in: &[String]) {
    let stats = &plan.stats;
    let sources = &stats.category_sources;
    println!(
        "Account {}  session {}",
        plan.session.account_number, plan.session.session_id
    );
    println!("{}", "─".repeat(60));
    println!("  Rows:        {}", stats.rows_total);
    println!("  New:         {}", stats.new_count);
    println!(
        "  Duplicates:  {} existing, {} within file",
        stats.dupes_existing, stats.dupes_intra_file
    );
    println!(
        "  Errors:      {} parse, {} normalize",
        stats.parse_errors, stats.normalize_errors
    );
    println!(
        "  Categories:  {} provided, {} keyword, {} regex, {} consensus, {} none",
        sources.provided, sources.keyword, sources.regex, sources.consensus, sources.none
    );
    if !plan.savings_queue.is_empty() {
        println!(
            "  Savings:     {} transfers to link",
            plan.savings_queue.len()
        );
    }
    let months = plan.months();
    if !months.is_empty() {
        println!("  Months:      {}", months.join(", "));
    }
    println!(
        "  Elapsed:     {:.1} ms ({:.0} rows/s)",
        stats.timings.total_ms, stats.rows_per_sec
    );

    if !seen_in.is_empty() {
        println!(
            "  Warning: this file was already imported into {} by session(s) {}",
            plan.session.account_number,
            seen_in.join(", ")
        );
    }

    for err in plan.errors.iter().take(ERROR_PREVIEW) {
        println!("    {err}");
    }
    if plan.errors.len() > ERROR_PREVIEW {
        println!("    ... and {} more", plan.errors.len() - ERROR_PREVIEW);
    }
}

/// Months that still hold staged rows for `account`, optionally one session's.
fn staged_months(state: &LedgerState, account: &str, session: Option<&str>) -> Vec<String> {
    state
        .transactions(account)
        .iter()
        .filter(|t| t.is_pending() && session.map_or(true, |s| t.in_session(s)))
        .map(|t| t.month())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn pending_count(state: &LedgerState) -> usize {
    state
        .accounts
        .values()
        .flat_map(|a| &a.transactions)
        .filter(|t| t.is_pending())
        .count()
}

pub(crate) fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        format!("{home}/{rest}")
    } else {
        path.to_string()
    }
}
