//! votrack-server - campaign canvassing tracker
//!
//! Startup: configuration (CLI > env > TOML > defaults), logging, root
//! folder layout, database, bootstrap admin, then the HTTP server until
//! Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use votrack_common::config::{
    load_default_toml_config, load_toml_config, CompiledDefaults, RootFolderInitializer,
    RootFolderResolver,
};
use votrack_common::db::init_database;
use votrack_common::events::EventBus;
use votrack_server::db::{sessions, users};
use votrack_server::evidence::LocalEvidenceStore;
use votrack_server::{build_router, AppState, EVENT_BUS_CAPACITY};

/// Command-line arguments for votrack-server
#[derive(Parser, Debug)]
#[command(name = "votrack-server")]
#[command(about = "Campaign canvassing tracker HTTP service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "VOTRACK_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(short, long, env = "VOTRACK_BIND_ADDRESS")]
    bind: Option<String>,

    /// Root folder holding votrack.db and evidence/ (also VOTRACK_ROOT_FOLDER)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file (default ~/.config/votrack/config.toml, then /etc/votrack/config.toml)
    #[arg(short, long, env = "VOTRACK_CONFIG")]
    config: Option<PathBuf>,

    /// Password for the bootstrap admin, used only when no active admin exists
    #[arg(long, env = "VOTRACK_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,
}

fn default_log_filter(level: &str) -> String {
    format!(
        "votrack_server={level},votrack_common={level},tower_http={level}",
        level = level
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = match &args.config {
        Some(path) => load_toml_config(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => load_default_toml_config(),
    };
    let defaults = CompiledDefaults::for_current_platform();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(&toml_config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting votrack-server v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder.clone())
        .with_toml_config(toml_config.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to prepare root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let db_path = initializer.database_path();
    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready: {}", db_path.display());
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let purged = sessions::purge_expired(&pool).await?;
    if purged > 0 {
        info!("Removed {} expired session(s)", purged);
    }

    let admin_username = toml_config
        .admin_username
        .clone()
        .unwrap_or_else(|| defaults.admin_username.clone());
    if let Some(password) =
        users::ensure_bootstrap_admin(&pool, &admin_username, args.admin_password.clone()).await?
    {
        warn!(
            "Generated password for admin '{}': {} (shown once; change it after logging in)",
            admin_username, password
        );
    }

    let evidence = Arc::new(LocalEvidenceStore::new(initializer.evidence_path()));
    let state = AppState::new(pool, EventBus::new(EVENT_BUS_CAPACITY), evidence);
    let app = build_router(state);

    let bind = args
        .bind
        .or_else(|| toml_config.bind_address.clone())
        .unwrap_or(defaults.bind_address);
    let port = args.port.or(toml_config.port).unwrap_or(defaults.port);
    let addr = format!("{}:{}", bind, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("votrack-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
