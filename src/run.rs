mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stagebook",
    version,
    about = "Stage bank CSV imports, apply them month by month, undo the ones you regret."
)]
pub(crate) struct Cli {
    /// Ledger database (default: platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Settings file (default: platform config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a CSV export (or a JSON array of rows) and optionally stage it.
    Import {
        /// Path to the .csv or .json file
        file: String,
        /// Account number for files without an AccountNumber column
        #[arg(long)]
        account: Option<String>,
        /// Stage the accepted transactions
        #[arg(long)]
        commit: bool,
        /// Force the chunked parser regardless of file size
        #[arg(long)]
        stream: bool,
        /// Print the plan as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Fold staged transactions into the budget.
    Apply {
        account: String,
        /// Months to apply, YYYY-MM (default: every month with staged rows)
        months: Vec<String>,
        /// Only touch this import session
        #[arg(long)]
        session: Option<String>,
    },
    /// Remove whatever an import session still has staged.
    Undo { account: String, session: String },
    /// Derived status of an account's import sessions.
    Status {
        account: String,
        session: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Import audit log.
    History {
        #[arg(long)]
        account: Option<String>,
    },
    /// Apply sessions that have sat staged past the configured age.
    Expire,
    /// Trim the import history to the configured size and age.
    Prune,
    /// Delete every trace of an import session.
    ClearSession { account: String, session: String },
    /// Savings transfers waiting to be linked to a goal.
    Pending { account: Option<String> },
    /// Move pending savings transfers into the review queue.
    DeferSavings {
        account: String,
        #[arg(long)]
        session: Option<String>,
    },
    /// Link a savings transfer to a goal, creating the goal if needed.
    LinkSavings {
        account: String,
        session: String,
        transaction: String,
        goal: String,
    },
    /// Show the settings file, or write one with defaults.
    Config {
        #[arg(long)]
        init: bool,
    },
}

pub(crate) fn as_cli(cli: Cli) -> Result<()> {
    let settings_path = match cli.settings {
        Some(path) => path,
        None => crate::settings::settings_path()?,
    };
    if let Command::Config { init } = cli.command {
        return cli::config(&settings_path, init);
    }

    let settings = crate::settings::load_settings(&settings_path)?;
    let db_path = match cli.db {
        Some(path) => path,
        None => crate::get_db_path()?,
    };
    let mut ctx = cli::Context::open(&db_path, settings)?;

    match cli.command {
        Command::Import {
            file,
            account,
            commit,
            stream,
            json,
        } => ctx.import(&file, account.as_deref(), commit, stream, json),
        Command::Apply {
            account,
            months,
            session,
        } => ctx.apply(&account, &months, session.as_deref()),
        Command::Undo { account, session } => ctx.undo(&account, &session),
        Command::Status {
            account,
            session,
            json,
        } => ctx.status(&account, session.as_deref(), json),
        Command::History { account } => ctx.history(account.as_deref()),
        Command::Expire => ctx.expire(),
        Command::Prune => ctx.prune(),
        Command::ClearSession { account, session } => ctx.clear_session(&account, &session),
        Command::Pending { account } => ctx.pending(account.as_deref()),
        Command::DeferSavings { account, session } => {
            ctx.defer_savings(&account, session.as_deref())
        }
        Command::LinkSavings {
            account,
            session,
            transaction,
            goal,
        } => ctx.link_savings(&account, &session, &transaction, &goal),
        Command::Config { .. } => Ok(()),
    }
}
