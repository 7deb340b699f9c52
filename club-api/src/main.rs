//! club-api - sports club web platform backend
//!
//! Serves the public site API (events, tickets, shop, memberships, news,
//! fixtures) and the admin API from one process over SQLite.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};

use club_api::config::ServerConfig;
use club_api::db::{sessions, users};
use club_api::{build_router, AppState};
use club_common::config::{load_toml_config, RootFolderInitializer, RootFolderResolver};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "club-api")]
#[command(about = "Sports club web platform API")]
#[command(version)]
struct Args {
    /// HTTP port (overrides club.toml)
    #[arg(short, long, env = "CLUB_PORT")]
    port: Option<u16>,

    /// Root folder holding the database, config and stored documents
    #[arg(short, long, env = "CLUB_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Config file (defaults to club.toml in the root folder)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Grant the admin role to this registered email at startup
    #[arg(long, env = "CLUB_BOOTSTRAP_ADMIN")]
    bootstrap_admin: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "club_api=info,club_common=info,tower_http=info".into()),
        )
        .init();

    info!("Starting club-api v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let root_folder = RootFolderResolver::new("club-api")
        .with_cli_arg(args.root_folder.clone())
        .with_config_file(args.config.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let config_path = args.config.clone().unwrap_or_else(|| initializer.config_path());
    let toml = load_toml_config(&config_path).context("Failed to load configuration")?;
    let config = ServerConfig::from_toml(&toml, initializer.root_folder().to_path_buf(), args.port);

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let pool = club_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    if let Some(email) = &args.bootstrap_admin {
        bootstrap_admin(&pool, email).await?;
    }

    let purged = sessions::delete_expired_sessions(&pool, Utc::now()).await?;
    if purged > 0 {
        info!("Removed {} expired sessions", purged);
    }

    if config.payments.secret_key.is_none() {
        warn!("No payment secret key configured; checkout of paid orders will fail");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::from_config(pool, config).context("Failed to configure services")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("club-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn bootstrap_admin(pool: &sqlx::SqlitePool, email: &str) -> Result<()> {
    let email = email.trim().to_lowercase();
    match users::find_user_by_email(pool, &email).await? {
        Some(user) if user.is_admin() => info!("{} is already an admin", email),
        Some(user) => {
            users::set_role(pool, &user.guid, users::ROLE_ADMIN, Utc::now()).await?;
            info!("Granted admin role to {}", email);
        }
        None => warn!("Bootstrap admin {} has not registered yet", email),
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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
