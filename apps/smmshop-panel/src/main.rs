mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use smmshop_db::init_db;
use smmshop_panel::AppState;
use smmshop_panel::config::Config;
use smmshop_panel::services::notification_service::{NoopNotifier, Notifier, TelegramNotifier};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::Bot;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "smmshop-panel")]
#[command(about = "SMM shop panel: bot API, admin API and order reconciliation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server and background workers
    Serve,
    /// Administrative tools
    Admin {
        #[command(subcommand)]
        subcommand: AdminCommands,
    },
    /// Write a database snapshot to a local file
    Backup {
        /// Target file, must not exist yet
        path: PathBuf,
    },
    /// Install the panel as a systemd service
    Install,
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Grant admin rights to a registered Telegram user
    Grant {
        /// Telegram id of the user
        telegram_id: i64,
        /// Revoke instead of granting
        #[arg(long)]
        revoke: bool,
    },
    /// Show configuration and shop totals
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        println!("⚠️  Warning: Failed to load .env file: {}", e);
    }

    let cli = Cli::parse();

    if let Commands::Install = cli.command {
        return cli::install_service();
    }

    let file_appender = tracing_appender::rolling::never(".", "panel.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smmshop_panel=debug,tower_http=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    let config = Config::from_env()?;
    let pool = init_db(&config.database_url).await?;
    tracing::info!("Database ready at {}", config.database_url);

    let notifier: Arc<dyn Notifier> = match &config.bot_token {
        Some(token) => Arc::new(TelegramNotifier::new(Bot::new(token))),
        None => {
            tracing::warn!("BOT_TOKEN not set, notifications are disabled");
            Arc::new(NoopNotifier)
        }
    };
    let state = AppState::new(pool, config.clone(), notifier).await?;

    match cli.command {
        Commands::Serve => run_server(state).await?,
        Commands::Admin { subcommand } => match subcommand {
            AdminCommands::Grant { telegram_id, revoke } => cli::grant_admin(&state, telegram_id, revoke).await?,
            AdminCommands::Info => cli::print_info(&state, &config).await?,
        },
        Commands::Backup { path } => cli::backup_to(&state, &path).await?,
        Commands::Install => {}
    }

    Ok(())
}

async fn run_server(state: AppState) -> Result<()> {
    let seeded = state.user_service.seed_admins().await?;
    if seeded > 0 {
        tracing::info!("Granted admin rights to {} configured users", seeded);
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let reconcile = state.reconcile_service.clone();
    let reconcile_rx = shutdown_tx.subscribe();
    let reconcile_handle = tokio::spawn(async move { reconcile.start(reconcile_rx).await });

    let backups = state.backup_service.clone();
    let backup_rx = shutdown_tx.subscribe();
    let backup_handle = tokio::spawn(async move { backups.start(backup_rx).await });

    let addr = state.config.bind_addr;
    let app = smmshop_panel::app(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let mut server_rx = shutdown_tx.subscribe();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = server_rx.recv().await;
    });

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = signal_tx.send(());
    });

    server.await?;
    let _ = shutdown_tx.send(());
    let _ = tokio::join!(reconcile_handle, backup_handle);
    tracing::info!("Panel stopped");
    Ok(())
}
