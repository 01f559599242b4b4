//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::{ApiServer, AuthManager};
use crate::core::banner;
use crate::core::cli::{self, CliConfig, Commands, SystemCommands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG, ENV_LOG_FORMAT};
use crate::core::secret::SecretManager;
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::data::TransactionalService;
use crate::data::cache::CacheService;
use crate::data::files::FileService;
use crate::domain::{DeadlineSweeper, Notifier};
use crate::utils::time::today;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: AppStorage,
    pub database: Arc<TransactionalService>,
    pub cache: Arc<CacheService>,
    pub auth: Arc<AuthManager>,
    pub notifier: Notifier,
    pub files: Arc<FileService>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::System {
                command: system_cmd,
            }) => Self::handle_system_command(system_cmd),
            Some(Commands::Sweep) => {
                let app = Self::init(&cli_config).await?;
                app.run_sweep().await
            }
            Some(Commands::Start) | None => {
                let app = Self::init(&cli_config).await?;
                Self::start_server(app).await
            }
        }
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init().await?;
        let secrets = SecretManager::init(&storage).await?;

        let cache = Arc::new(CacheService::new(&config.cache));
        tracing::debug!(max_entries = config.cache.max_entries, "Cache initialized");

        let database = Arc::new(
            TransactionalService::init(&storage)
                .await
                .context("Failed to open the project database")?,
        );
        let auth = Arc::new(AuthManager::new(&secrets, config.auth.token_ttl_hours));
        let notifier = Notifier::new(database.clone());
        let files = Arc::new(FileService::new(&storage, database.clone()));
        let shutdown = ShutdownService::new(database.clone());

        Ok(Self {
            shutdown,
            config,
            storage,
            database,
            cache,
            auth,
            notifier,
            files,
        })
    }

    fn sweeper(&self) -> DeadlineSweeper {
        DeadlineSweeper::new(
            self.database.clone(),
            self.notifier.clone(),
            self.files.clone(),
            self.config.sweep.clone(),
        )
    }

    /// One-shot sweep for cron-style scheduling
    async fn run_sweep(self) -> Result<()> {
        let result = self.sweeper().run_once(today()).await;
        self.database.close().await;

        let report = result.context("Deadline sweep failed")?;
        println!(
            "Sweep complete: {} tasks due, {} projects ending, {} budgets low, {} notifications sent, {} failed, {} orphaned notifications removed, {} orphaned attachments removed",
            report.tasks_due,
            report.projects_ending,
            report.budgets_low,
            report.notifications_sent,
            report.delivery_failures,
            report.orphans_removed,
            report.blobs_removed
        );
        Ok(())
    }

    fn handle_system_command(cmd: SystemCommands) -> Result<()> {
        match cmd {
            SystemCommands::Prune { yes } => Self::prune_data(yes),
        }
    }

    fn prune_data(skip_confirm: bool) -> Result<()> {
        let data_dir = AppStorage::resolve_data_dir();

        if !data_dir.exists() {
            println!(
                "Nothing to prune. Data directory does not exist: {}",
                data_dir.display()
            );
            return Ok(());
        }

        let data_dir = data_dir.canonicalize().unwrap_or(data_dir);

        println!("This will permanently delete the local data directory:");
        println!("  {}", data_dir.display());
        println!();
        println!(
            "The database, attachments and the signing key are removed. \
             Stop the server first."
        );

        if !skip_confirm {
            print!("\nContinue? [y/N] ");
            std::io::Write::flush(&mut std::io::stdout())?;

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;

            if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
                println!("Aborted.");
                return Ok(());
            }
        }

        std::fs::remove_dir_all(&data_dir)
            .with_context(|| format!("Failed to delete data directory: {}", data_dir.display()))?;
        println!("Pruned: {}", data_dir.display());
        Ok(())
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        let json = std::env::var(ENV_LOG_FORMAT).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
        if json {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_target(false)
                .with_thread_ids(false)
                .with_level(true)
                .with_ansi(true)
                .compact()
                .with_env_filter(filter)
                .init();
        }
    }

    async fn start_server(app: Self) -> Result<()> {
        // Signal handlers go first so Ctrl+C during startup still shuts down cleanly
        app.shutdown.install_signal_handlers();

        app.start_background_tasks().await;

        banner::print_banner(&app.config, &app.storage.data_dir().display().to_string());

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }

    pub async fn start_background_tasks(&self) {
        self.shutdown
            .register(
                self.database
                    .start_checkpoint_task(self.shutdown.subscribe()),
            )
            .await;

        if self.config.sweep.enabled {
            let sweeper = Arc::new(self.sweeper());
            self.shutdown
                .register(sweeper.start_sweep_task(self.shutdown.subscribe()))
                .await;
        } else {
            tracing::debug!("Deadline sweep disabled by config");
        }

        tracing::debug!("Background tasks started");
    }
}
