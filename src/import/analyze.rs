use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use super::classify::{is_internal_transfer, Classifier};
use super::columns::{detect_columns, ColumnMap};
use super::key::{build_key, KeyInput};
use super::normalize::normalize_row;
use super::source::{content_hash, parse_csv, rows_hash, ParsedCsv, RawRow};
use crate::categorize::{apply_vendor_consensus, Categorizer, ConsensusPolicy};
use crate::clock::{as_ms, Clock};
use crate::error::{DuplicateReason, IngestError, RowError};
use crate::models::{
    CategorySourceCounts, DuplicateSample, ImportPlan, ImportSession, ImportStats, LedgerState,
    SavingsCandidate, StageTimings, Transaction, TxnType,
};
use crate::settings::Settings;
use crate::util::format_amount;

/// Where the rows of one ingestion run come from.
pub(crate) enum ImportSource<'a> {
    /// Raw CSV text, parsed synchronously.
    Text(&'a str),
    /// Rows already produced by a [`super::CsvStream`] over `text`.
    Streamed { text: &'a str, parsed: ParsedCsv },
    /// Rows parsed by some other collaborator.
    Rows(ParsedCsv),
}

impl ImportSource<'_> {
    /// Parsed rows plus the short content hash used by the import manifest.
    fn into_parsed(self) -> Result<(ParsedCsv, String), IngestError> {
        match self {
            Self::Text(text) => Ok((parse_csv(text)?, content_hash(text.as_bytes()))),
            Self::Streamed { text, parsed } => Ok((parsed, content_hash(text.as_bytes()))),
            Self::Rows(parsed) => {
                let hash = rows_hash(&parsed.rows);
                Ok((parsed, hash))
            }
        }
    }
}

pub(crate) struct AnalyzeOptions<'a> {
    /// Pin the session id; a fresh v4 uuid is used otherwise.
    pub(crate) session_id: Option<String>,
    pub(crate) categorizer: &'a Categorizer,
    pub(crate) consensus: ConsensusPolicy,
    pub(crate) duplicate_error_cap: usize,
    pub(crate) duplicate_sample_size: usize,
}

impl<'a> AnalyzeOptions<'a> {
    pub(crate) fn from_settings(settings: &Settings, categorizer: &'a Categorizer) -> Self {
        Self {
            session_id: None,
            categorizer,
            consensus: settings.consensus_policy(),
            duplicate_error_cap: settings.duplicate_error_cap,
            duplicate_sample_size: settings.duplicate_sample_size,
        }
    }
}

/// Turn one source into an import plan for `account_number`. Every row is
/// treated as belonging to that account; use [`analyze_file`] to split a
/// multi-account file.
///
/// Pure: reads nothing but its arguments, writes nothing.
pub(crate) fn analyze_import(
    source: ImportSource<'_>,
    existing: &[Transaction],
    account_number: &str,
    options: &AnalyzeOptions<'_>,
    clock: &dyn Clock,
) -> Result<ImportPlan, IngestError> {
    let account = validate_account(account_number)?;
    let started = clock.tick();
    let (parsed, hash) = source.into_parsed()?;
    let parse_ms = as_ms(clock.since(started));
    let columns = detect_columns(&parsed.headers);
    let session_id = session_id(options);

    Ok(plan_rows(
        parsed,
        &columns,
        RunContext {
            account: &account,
            session_id: &session_id,
            hash: &hash,
            started,
            parse_ms,
        },
        existing,
        options,
        clock,
    ))
}

/// Analyze a whole file, producing one plan per distinct account number.
/// Rows without an account value (or files without the column) use
/// `fallback_account`. All plans share one session id and the file's hash.
/// Parse errors are reported on the first plan.
pub(crate) fn analyze_file(
    source: ImportSource<'_>,
    state: &LedgerState,
    fallback_account: Option<&str>,
    options: &AnalyzeOptions<'_>,
    clock: &dyn Clock,
) -> Result<Vec<ImportPlan>, IngestError> {
    let started = clock.tick();
    let (parsed, hash) = source.into_parsed()?;
    let parse_ms = as_ms(clock.since(started));
    let columns = detect_columns(&parsed.headers);
    let session_id = session_id(options);

    let fallback = fallback_account.map(validate_account).transpose()?;
    let groups = split_by_account(parsed, &columns, fallback.as_deref())?;

    let mut plans = Vec::with_capacity(groups.len());
    for (account, part) in groups {
        let account = validate_account(&account)?;
        let plan = plan_rows(
            part,
            &columns,
            RunContext {
                account: &account,
                session_id: &session_id,
                hash: &hash,
                started,
                parse_ms,
            },
            state.transactions(&account),
            options,
            clock,
        );
        plans.push(plan);
    }
    Ok(plans)
}

fn validate_account(account_number: &str) -> Result<String, IngestError> {
    let account = account_number.trim();
    if account.is_empty() {
        return Err(IngestError::MissingAccountNumber);
    }
    // `|` separates key fields
    if account.contains('|') || account.chars().any(char::is_control) {
        return Err(IngestError::InvalidAccountNumber(account.to_string()));
    }
    Ok(account.to_string())
}

fn session_id(options: &AnalyzeOptions<'_>) -> String {
    options
        .session_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Group rows by their account value, keeping first-seen account order.
fn split_by_account(
    parsed: ParsedCsv,
    columns: &ColumnMap,
    fallback: Option<&str>,
) -> Result<Vec<(String, ParsedCsv)>, IngestError> {
    let ParsedCsv {
        headers,
        rows,
        mut errors,
    } = parsed;

    let mut groups: Vec<(String, Vec<RawRow>)> = Vec::new();
    for row in rows {
        let value = columns
            .account
            .as_deref()
            .and_then(|c| row.get(c))
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let account = match (value, fallback) {
            (Some(v), _) => v.to_string(),
            (None, Some(f)) => f.to_string(),
            (None, None) => return Err(IngestError::MissingAccountNumber),
        };
        match groups.iter_mut().find(|(a, _)| *a == account) {
            Some((_, group)) => group.push(row),
            None => groups.push((account, vec![row])),
        }
    }

    if groups.is_empty() {
        let account = fallback.ok_or(IngestError::MissingAccountNumber)?;
        groups.push((account.to_string(), Vec::new()));
    }

    Ok(groups
        .into_iter()
        .map(|(account, rows)| {
            let part = ParsedCsv {
                headers: headers.clone(),
                rows,
                errors: std::mem::take(&mut errors),
            };
            (account, part)
        })
        .collect())
}

struct RunContext<'a> {
    account: &'a str,
    session_id: &'a str,
    hash: &'a str,
    started: Duration,
    parse_ms: f64,
}

fn plan_rows(
    parsed: ParsedCsv,
    columns: &ColumnMap,
    ctx: RunContext<'_>,
    existing: &[Transaction],
    options: &AnalyzeOptions<'_>,
    clock: &dyn Clock,
) -> ImportPlan {
    let classifier = Classifier::new();
    let mut timings = StageTimings {
        parse_ms: ctx.parse_ms,
        ..StageTimings::default()
    };
    let mut stats = ImportStats {
        parse_errors: parsed.errors.len(),
        ..ImportStats::default()
    };
    let mut errors = parsed.errors;
    let mut samples: Vec<DuplicateSample> = Vec::new();
    let mut accepted: Vec<Transaction> = Vec::new();
    let mut sources = Vec::new();

    let t = clock.tick();
    let existing_keys: HashSet<String> = existing
        .iter()
        .map(|txn| build_key(&KeyInput::from(txn)))
        .collect();
    timings.key_ms += as_ms(clock.since(t));
    let mut seen: HashSet<String> = HashSet::new();

    for row in &parsed.rows {
        let t = clock.tick();
        let normalized = normalize_row(row, columns);
        timings.normalize_ms += as_ms(clock.since(t));
        let normalized = match normalized {
            Ok(n) => n,
            Err(e) => {
                stats.normalize_errors += 1;
                errors.push(e);
                continue;
            }
        };

        let t = clock.tick();
        let key = build_key(&KeyInput::for_normalized(ctx.account, &normalized));
        timings.key_ms += as_ms(clock.since(t));

        let t = clock.tick();
        let duplicate = if existing_keys.contains(&key) {
            Some(DuplicateReason::Existing)
        } else if !seen.insert(key.clone()) {
            Some(DuplicateReason::IntraFile)
        } else {
            None
        };
        timings.dedupe_ms += as_ms(clock.since(t));

        if let Some(reason) = duplicate {
            match reason {
                DuplicateReason::Existing => {
                    stats.dupes_existing += 1;
                    stats.early_exit_existing += 1;
                }
                DuplicateReason::IntraFile => {
                    stats.dupes_intra_file += 1;
                    stats.early_exit_intra_file += 1;
                }
            }
            if stats.duplicates() <= options.duplicate_error_cap {
                errors.push(RowError::Duplicate {
                    line: normalized.line,
                    reason,
                    message: duplicate_message(reason, &normalized.description),
                });
            } else {
                stats.duplicate_errors_suppressed += 1;
            }
            if samples.len() < options.duplicate_sample_size {
                samples.push(DuplicateSample {
                    line: normalized.line,
                    reason,
                    key,
                    date: normalized.date,
                    description: normalized.description,
                    raw_amount: normalized.raw_amount,
                });
            }
            continue;
        }

        let t = clock.tick();
        let txn_type = classifier.classify(&normalized.description, normalized.raw_amount);
        timings.classify_ms += as_ms(clock.since(t));

        let t = clock.tick();
        let (category, source) = options
            .categorizer
            .infer(normalized.category.as_deref(), &normalized.description);
        timings.infer_ms += as_ms(clock.since(t));

        let txn = Transaction {
            id: format!("{}:{}:{}", ctx.session_id, ctx.account, accepted.len() + 1),
            key,
            account_number: ctx.account.to_string(),
            date: normalized.date,
            description: normalized.description,
            raw_amount: normalized.raw_amount,
            amount: format_amount(normalized.raw_amount),
            txn_type,
            category,
            balance: normalized.balance,
            import_session_id: Some(ctx.session_id.to_string()),
            staged: true,
            budget_applied: false,
            auto_applied: false,
        };
        // Type and category never feed the key, so it still matches the early one.
        debug_assert_eq!(build_key(&KeyInput::from(&txn)), txn.key);
        accepted.push(txn);
        sources.push(source);
    }

    let t = clock.tick();
    let filled = apply_vendor_consensus(&mut accepted, &mut sources, &options.consensus);
    timings.consensus_ms = as_ms(clock.since(t));

    let mut category_sources = CategorySourceCounts::default();
    for source in &sources {
        category_sources.record(*source);
    }

    let savings_queue: Vec<SavingsCandidate> = accepted
        .iter()
        .filter(|t| t.txn_type == TxnType::Savings && !is_internal_transfer(&t.description))
        .map(|t| SavingsCandidate::from_transaction(t, ctx.session_id))
        .collect();

    errors.sort_by_key(|e| e.line().unwrap_or(usize::MAX));

    stats.rows_total = parsed.rows.len() + stats.parse_errors;
    stats.new_count = accepted.len();
    stats.category_sources = category_sources;
    if !parsed.rows.is_empty() {
        stats.duplicate_ratio = stats.duplicates() as f64 / parsed.rows.len() as f64;
    }
    timings.total_ms = as_ms(clock.since(ctx.started));
    if timings.total_ms > 0.0 {
        stats.rows_per_sec = stats.rows_total as f64 / (timings.total_ms / 1000.0);
    }
    stats.timings = timings;

    debug!(
        account = ctx.account,
        consensus_filled = filled,
        normalize_ms = stats.timings.normalize_ms,
        dedupe_ms = stats.timings.dedupe_ms,
        "Import stages finished"
    );
    info!(
        account = ctx.account,
        session = ctx.session_id,
        accepted = stats.new_count,
        dupes_existing = stats.dupes_existing,
        dupes_intra_file = stats.dupes_intra_file,
        errors = errors.len(),
        elapsed_ms = stats.timings.total_ms,
        "Import analyzed"
    );

    ImportPlan {
        session: ImportSession {
            session_id: ctx.session_id.to_string(),
            account_number: ctx.account.to_string(),
            imported_at: clock.now(),
            hash: ctx.hash.to_string(),
            new_count: accepted.len(),
        },
        accepted,
        stats,
        errors,
        duplicates_sample: samples,
        savings_queue,
    }
}

fn duplicate_message(reason: DuplicateReason, description: &str) -> String {
    match reason {
        DuplicateReason::Existing => format!("'{description}' is already in this account"),
        DuplicateReason::IntraFile => format!("'{description}' appears earlier in this file"),
    }
}

#[cfg(test)]
#[path = "analyze_tests.rs"]
mod tests;
