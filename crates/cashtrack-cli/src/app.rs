//! Application wiring for the cashtrack binary.
//!
//! `App` owns the configuration, the persisted session and the core services,
//! and implements one method per command.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use cashtrack_core::api::RestClient;
use cashtrack_core::auth::{AuthError, AuthProvider, CredentialStore, RestAuth, Session};
use cashtrack_core::cache::{CacheManager, CacheSlot};
use cashtrack_core::config::{Config, Endpoint};
use cashtrack_core::connectivity::{spawn_indicator, ConnectivityProbe, IndicatorState, NetworkStatus};
use cashtrack_core::models::{Category, Expense, NewCategory, NewExpense, User};
use cashtrack_core::queue::{PendingKind, PendingQueue};
use cashtrack_core::routes::Route;
use cashtrack_core::stats::category_totals;
use cashtrack_core::store::FileStore;
use cashtrack_core::sync::{
    ListUpdate, LoadOutcome, LoadReport, SubmitOutcome, Synchronizer, CHANNEL_BUFFER_SIZE,
};
use cashtrack_core::utils::format_amount;

use crate::output;

/// Subdirectory of the cache directory holding the key-value store
const STORE_DIR: &str = "store";

/// Subdirectory of the cache directory holding log files
const LOG_DIR: &str = "logs";

/// Where log files go, if a cache directory can be determined.
pub fn log_dir() -> Option<PathBuf> {
    Config::default().cache_dir().ok().map(|dir| dir.join(LOG_DIR))
}

type AppSynchronizer<'a> = Synchronizer<'a, FileStore, NetworkStatus, RestClient>;

pub struct App {
    config: Config,
    session: Session,
    endpoint: Endpoint,
    api: RestClient,
    auth: RestAuth,
    cache: Arc<CacheManager<FileStore>>,
    network: Arc<NetworkStatus>,
}

impl App {
    pub fn new(force_offline: bool) -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?cache_dir, "Cache directory configured");

        let mut session = Session::new(cache_dir.clone());
        if let Err(e) = session.load() {
            warn!(error = %e, "Failed to load session");
        }

        let endpoint = Endpoint::from_env();
        let mut api = RestClient::new(&endpoint)?;
        if let Some(token) = session.token() {
            api.set_token(token.to_string());
            debug!("Token set on API client");
        }
        let auth = RestAuth::new(&endpoint)?;

        let store = FileStore::new(cache_dir.join(STORE_DIR))
            .context("Failed to open cache directory")?;
        let cache = Arc::new(CacheManager::with_namespace(store, &config.key_namespace));

        let online = !(force_offline || config.force_offline);
        let network = Arc::new(NetworkStatus::new(online));
        debug!(online, "Network status initialised");

        Ok(Self {
            config,
            session,
            endpoint,
            api,
            auth,
            cache,
            network,
        })
    }

    fn synchronizer(&self) -> AppSynchronizer<'_> {
        Synchronizer::new(self.cache.as_ref(), self.network.as_ref(), &self.api)
            .with_drain_on_reconnect(self.config.drain_on_reconnect)
    }

    fn queue(&self) -> PendingQueue<'_, FileStore> {
        PendingQueue::new(self.cache.as_ref())
    }

    /// Enforce the route guard for a command and return the signed-in user.
    fn require_user(&self, route: Route) -> Result<User> {
        match route.resolve(self.session.is_valid()) {
            Route::Login => bail!("Not signed in. Run `cashtrack login` first."),
            _ => self.session.user().cloned().context("Session has no user"),
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Swap a session close to expiry for a fresh one while online.
    ///
    /// Failure only logs: the old token stays in use until it lapses.
    pub async fn refresh_session_if_needed(&mut self) {
        if !self.network.is_online() {
            return;
        }
        let Some(refresh_token) = self.session.refresh_token_due().map(str::to_string) else {
            return;
        };

        match self.auth.refresh_session(&refresh_token).await {
            Ok(data) => {
                self.api.set_token(data.access_token.clone());
                self.session.update(data);
                if let Err(e) = self.session.save() {
                    warn!(error = %e, "Failed to save refreshed session");
                }
            }
            Err(e) => warn!(error = %e, "Session refresh failed"),
        }
    }

    pub async fn login(&mut self, email: Option<String>, remember: bool) -> Result<()> {
        let email = match email {
            Some(email) => email,
            None => self.prompt_email()?,
        };
        let password = Self::password_for(&email)?;

        println!("Signing in...");
        let data = self.auth.sign_in(&email, &password).await?;

        if remember {
            if let Err(e) = CredentialStore::remember(&email, &password) {
                warn!(error = %e, "Failed to store credentials");
            }
        }
        self.remember_email(&email);

        self.api.set_token(data.access_token.clone());
        self.session.update(data);
        self.session.save()?;

        info!("Login successful");
        println!("Signed in as {}", email);
        Ok(())
    }

    pub async fn signup(&mut self, email: Option<String>) -> Result<()> {
        let email = match email {
            Some(email) => email,
            None => self.prompt_email()?,
        };
        let password = rpassword::prompt_password("Password: ")?;
        let confirm = rpassword::prompt_password("Repeat password: ")?;
        if password != confirm {
            bail!("Passwords do not match");
        }

        match self.auth.sign_up(&email, &password).await {
            Ok(data) => {
                self.remember_email(&email);
                self.api.set_token(data.access_token.clone());
                self.session.update(data);
                self.session.save()?;
                println!("Account created, signed in as {}", email);
                Ok(())
            }
            Err(e @ AuthError::ConfirmationRequired(_)) => {
                self.remember_email(&email);
                println!("Account created. {}", e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Sign out. Cached lists are dropped; pending changes are kept for the
    /// next sign-in.
    pub async fn logout(&mut self, forget: bool) -> Result<()> {
        if forget {
            if let Some(ref email) = self.config.last_email {
                CredentialStore::forget(email)?;
            }
        }

        if let Some(token) = self.session.token().map(str::to_string) {
            if self.network.is_online() {
                if let Err(e) = self.auth.sign_out(&token).await {
                    warn!(error = %e, "Remote sign-out failed");
                }
            }
        }
        self.session.clear()?;

        for slot in [CacheSlot::Expenses, CacheSlot::Categories, CacheSlot::LastSync] {
            if let Err(e) = self.cache.remove(slot) {
                warn!(slot = ?slot, error = %e, "Failed to clear cache slot");
            }
        }

        let queue = self.queue();
        let kept = queue.len(PendingKind::Expense) + queue.len(PendingKind::Category);
        if kept > 0 {
            println!("{} pending change(s) kept for the next sign-in", kept);
        }
        println!("Signed out");
        Ok(())
    }

    fn prompt_email(&self) -> Result<String> {
        match self.config.last_email {
            Some(ref last) => print!("Email [{}]: ", last),
            None => print!("Email: "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        match (input.is_empty(), &self.config.last_email) {
            (true, Some(last)) => Ok(last.clone()),
            (true, None) => bail!("Email required"),
            (false, _) => Ok(input.to_string()),
        }
    }

    fn password_for(email: &str) -> Result<String> {
        let stored = CredentialStore::recall(email).unwrap_or_else(|e| {
            warn!(error = %e, "Keychain unavailable");
            None
        });
        if let Some(stored) = stored {
            print!("Use stored password? [Y/n]: ");
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            if input.trim().to_lowercase() != "n" {
                return Ok(stored);
            }
        }
        Ok(rpassword::prompt_password("Password: ")?)
    }

    fn remember_email(&mut self, email: &str) {
        self.config.last_email = Some(email.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }

    // =========================================================================
    // Lists
    // =========================================================================

    pub async fn list(&self, limit: Option<usize>) -> Result<()> {
        let user = self.require_user(Route::Main)?;
        let (report, shown) = self.load_expenses(&user).await;

        output::print_expenses(shown.records(), limit);

        let pending: Vec<Expense> = self.queue().peek();
        if !pending.is_empty() {
            println!();
            output::print_pending_expenses(&pending);
        }
        self.print_load_notice(&report);
        Ok(())
    }

    pub async fn stats(&self) -> Result<()> {
        let user = self.require_user(Route::Statistics)?;
        let (report, shown) = self.load_expenses(&user).await;

        let stats = category_totals(shown.records(), &user.id);
        output::print_stats(&stats);
        self.print_load_notice(&report);
        Ok(())
    }

    pub async fn list_categories(&self) -> Result<()> {
        let user = self.require_user(Route::Categories)?;
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let report = self.synchronizer().load_categories(&user.id, &tx).await;
        drop(tx);
        let shown = latest_update(rx);

        output::print_categories(shown.records());

        let pending: Vec<Category> = self.queue().peek();
        if !pending.is_empty() {
            println!();
            output::print_pending_categories(&pending);
        }
        self.print_load_notice(&report);
        Ok(())
    }

    /// Run the expense load and keep the last list it published.
    async fn load_expenses(&self, user: &User) -> (LoadReport<Expense>, ListUpdate<Expense>) {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let report = self.synchronizer().load_expenses(&user.id, &tx).await;
        drop(tx);
        (report, latest_update(rx))
    }

    fn print_load_notice<T>(&self, report: &LoadReport<T>) {
        if let Some(ref drain) = report.drain {
            if drain.sent() > 0 {
                println!("\nSent {} pending change(s)", drain.sent());
            }
        }
        match report.outcome {
            LoadOutcome::Refreshed => {}
            LoadOutcome::Offline => {
                println!("\nWorking offline (last sync: {})", self.cache.last_sync_display());
            }
            LoadOutcome::FetchFailed => println!(
                "\nCould not reach the server, showing cached data (last sync: {})",
                self.cache.last_sync_display()
            ),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub async fn add_expense(
        &self,
        title: &str,
        amount: f64,
        category: Option<&str>,
        date: Option<String>,
    ) -> Result<()> {
        let user = self.require_user(Route::AddExpense)?;

        let category_id = match category {
            Some(query) => Some(self.find_category(query)?.id),
            None => None,
        };
        let date = match date {
            Some(date) => {
                NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", date))?;
                date
            }
            None => Local::now().format("%Y-%m-%d").to_string(),
        };

        let draft = NewExpense::new(&user.id, title, amount, category_id, &date);
        match self.synchronizer().submit_expense(draft).await? {
            SubmitOutcome::Saved(expense) => {
                println!("Saved {} ({})", expense.title, format_amount(expense.amount));
            }
            SubmitOutcome::Queued(expense) => {
                println!(
                    "Queued {} ({}), it will be sent on the next sync",
                    expense.title,
                    format_amount(expense.amount)
                );
            }
        }
        Ok(())
    }

    pub async fn add_category(&self, name: &str, icon: Option<&str>, color: Option<&str>) -> Result<()> {
        let user = self.require_user(Route::Categories)?;

        let draft = NewCategory::new(&user.id, name, icon, color);
        match self.synchronizer().submit_category(draft).await? {
            SubmitOutcome::Saved(category) => println!("Saved category {}", category.label()),
            SubmitOutcome::Queued(category) => println!(
                "Queued category {}, it will be sent on the next sync",
                category.label()
            ),
        }
        Ok(())
    }

    pub async fn delete_category(&self, query: &str) -> Result<()> {
        let user = self.require_user(Route::Categories)?;
        let category = self.find_category(query)?;

        self.synchronizer()
            .delete_category(&user.id, &category.id)
            .await?;
        println!("Deleted category {}", category.label());
        Ok(())
    }

    /// Look a category up by id or (case-insensitive) name among cached and
    /// pending categories.
    fn find_category(&self, query: &str) -> Result<Category> {
        let wanted = query.trim().to_lowercase();
        let mut known = self.cache.load_categories();
        known.extend(self.queue().peek::<Category>());

        known
            .into_iter()
            .find(|c| c.id == query || c.name.to_lowercase() == wanted)
            .with_context(|| {
                format!(
                    "Unknown category '{}'. Run `cashtrack categories` to refresh the list.",
                    query
                )
            })
    }

    // =========================================================================
    // Sync and status
    // =========================================================================

    pub fn pending(&self) -> Result<()> {
        let expenses: Vec<Expense> = self.queue().peek();
        let categories: Vec<Category> = self.queue().peek();

        if expenses.is_empty() && categories.is_empty() {
            println!("Nothing pending");
            return Ok(());
        }
        if !categories.is_empty() {
            output::print_pending_categories(&categories);
        }
        if !expenses.is_empty() {
            if !categories.is_empty() {
                println!();
            }
            output::print_pending_expenses(&expenses);
        }
        Ok(())
    }

    pub async fn sync(&self) -> Result<()> {
        let user = self.require_user(Route::Main)?;
        if !self.network.is_online() {
            bail!("Cannot sync while offline");
        }

        let (expense_tx, _expense_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let (category_tx, _category_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let (expenses, categories) = self
            .synchronizer()
            .with_drain_on_reconnect(true)
            .refresh_all(&user.id, &expense_tx, &category_tx)
            .await;

        if let Some(ref drain) = expenses.drain {
            output::print_drain(drain);
        }
        for (name, outcome, count) in [
            ("expenses", expenses.outcome, expenses.displayed.len()),
            ("categories", categories.outcome, categories.displayed.len()),
        ] {
            match outcome {
                LoadOutcome::Refreshed => println!("Refreshed {} {}", count, name),
                _ => println!("Could not refresh {}, keeping {} cached", name, count),
            }
        }
        Ok(())
    }

    pub async fn status(&self, watch: bool) -> Result<()> {
        let online = self.network.is_online();
        println!("Network:   {}", if online { "online" } else { "offline" });
        println!(
            "Server:    {}",
            if self.endpoint.is_configured() {
                self.endpoint.url.as_str()
            } else {
                "not configured"
            }
        );

        match self.session.data.as_ref().filter(|d| !d.is_expired()) {
            Some(data) => {
                let mut line = format!(
                    "Signed in: {} (session expires in {} min)",
                    data.user.email,
                    data.minutes_until_expiry()
                );
                if data.needs_refresh() {
                    if data.refresh_token.is_some() {
                        line.push_str(", refreshed on the next online command");
                    } else {
                        line.push_str(", sign in again soon");
                    }
                }
                println!("{}", line);

                if online {
                    if let Err(e) = self.auth.current_user(&data.access_token).await {
                        warn!(error = %e, "Session check failed");
                        println!("           server rejected the session: {}", e);
                    }
                }
            }
            None => println!("Signed in: no"),
        }

        let queue = self.queue();
        println!("Last sync: {}", self.cache.last_sync_display());
        println!("Cache:     {}", self.cache.store().dir().display());
        println!(
            "Pending:   {} expense(s), {} category(ies)",
            queue.len(PendingKind::Expense),
            queue.len(PendingKind::Category)
        );

        let state = IndicatorState::evaluate(self.network.as_ref(), self.cache.as_ref());
        if let Some(message) = state.message() {
            println!("\n{}", message);
        }

        if watch {
            let (_handle, mut rx) = spawn_indicator(self.network.clone(), self.cache.clone());
            while rx.changed().await.is_ok() {
                let state = *rx.borrow_and_update();
                println!("{}", state.message().unwrap_or("Up to date"));
            }
        }
        Ok(())
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear_all();
        println!("Cache cleared");
        Ok(())
    }
}

/// Last update a finished load published. A load that published nothing
/// showed an empty list.
fn latest_update<T>(mut rx: mpsc::Receiver<ListUpdate<T>>) -> ListUpdate<T> {
    let mut latest = ListUpdate::Cached(Vec::new());
    while let Ok(update) = rx.try_recv() {
        latest = update;
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_update_keeps_last() {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        tx.try_send(ListUpdate::Cached(vec![1])).unwrap();
        tx.try_send(ListUpdate::Authoritative(vec![1, 2])).unwrap();
        drop(tx);

        assert_eq!(latest_update(rx), ListUpdate::Authoritative(vec![1, 2]));
    }

    #[test]
    fn test_latest_update_defaults_to_empty() {
        let (tx, rx) = mpsc::channel::<ListUpdate<i32>>(CHANNEL_BUFFER_SIZE);
        drop(tx);
        assert_eq!(latest_update(rx), ListUpdate::Cached(Vec::new()));
    }
}
