//! Cashtrack - a command line expense tracker that keeps working offline.
//!
//! Lists are served from the local cache first and refreshed from the remote
//! when a connection is available. Expenses and categories added without a
//! connection are queued and sent on the next `sync` or online `list`.

mod app;
mod output;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

/// Prefix of the daily log files in the cache directory
const LOG_FILE_PREFIX: &str = "cashtrack";

#[derive(Parser, Debug)]
#[command(name = "cashtrack")]
#[command(about = "Track personal expenses, online or offline")]
#[command(version)]
struct Cli {
    /// Work from the local cache only, queueing every change
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password
    Login {
        email: Option<String>,
        /// Remember the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },
    /// Create an account
    Signup { email: Option<String> },
    /// Sign out and forget the cached lists
    Logout {
        /// Also remove the remembered password from the OS keychain
        #[arg(long)]
        forget: bool,
    },
    /// Show expenses, newest first
    List {
        /// Show at most this many expenses
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Record an expense
    Add {
        title: String,
        amount: f64,
        /// Category name or id
        #[arg(short, long)]
        category: Option<String>,
        /// Spending date, YYYY-MM-DD (default: today)
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Spending totals per category
    Stats,
    /// Manage categories
    Categories {
        #[command(subcommand)]
        action: Option<CategoryAction>,
    },
    /// Show changes waiting to be sent
    Pending,
    /// Send pending changes and refresh both lists
    Sync,
    /// Connection, session and cache state
    Status {
        /// Keep printing the offline/sync indicator as it changes
        #[arg(long)]
        watch: bool,
    },
    /// Remove every cached list and pending change
    ClearCache,
}

#[derive(Subcommand, Debug)]
enum CategoryAction {
    /// List categories
    List,
    /// Add a category
    Add {
        name: String,
        #[arg(long)]
        icon: Option<String>,
        /// Hex color, e.g. #3B82F6
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a category by name or id
    Delete { category: String },
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). Events go to stderr and,
/// when `log_dir` is usable, to a daily rolling file there.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let appender = log_dir.and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .build(dir)
            .map_err(|e| eprintln!("Warning: file logging disabled: {}", e))
            .ok()
    });
    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_dir = app::log_dir();
    let _log_guard = init_tracing(log_dir.as_deref());
    info!("cashtrack starting");

    let mut app = App::new(cli.offline)?;
    app.refresh_session_if_needed().await;

    let result = match cli.command {
        Command::Login { email, remember } => app.login(email, remember).await,
        Command::Signup { email } => app.signup(email).await,
        Command::Logout { forget } => app.logout(forget).await,
        Command::List { limit } => app.list(limit).await,
        Command::Add {
            title,
            amount,
            category,
            date,
        } => app.add_expense(&title, amount, category.as_deref(), date).await,
        Command::Stats => app.stats().await,
        Command::Categories { action } => match action.unwrap_or(CategoryAction::List) {
            CategoryAction::List => app.list_categories().await,
            CategoryAction::Add { name, icon, color } => {
                app.add_category(&name, icon.as_deref(), color.as_deref()).await
            }
            CategoryAction::Delete { category } => app.delete_category(&category).await,
        },
        Command::Pending => app.pending(),
        Command::Sync => app.sync().await,
        Command::Status { watch } => app.status(watch).await,
        Command::ClearCache => app.clear_cache(),
    };

    info!("cashtrack finished");
    result
}
