//! club-scrape - one fixtures and standings pass against the club database

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use club_api::config::ServerConfig;
use club_api::scraper::{LffScraper, ScrapeOptions};
use club_common::config::{load_toml_config, RootFolderInitializer, RootFolderResolver};

#[derive(Parser, Debug)]
#[command(name = "club-scrape")]
#[command(about = "Scrape fixtures and standings into the club database")]
#[command(version)]
struct Args {
    #[arg(short, long, env = "CLUB_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fixtures page path or URL (overrides club.toml)
    #[arg(long)]
    fixtures_path: Option<String>,

    /// Standings page path or URL (overrides club.toml)
    #[arg(long)]
    standings_path: Option<String>,

    /// Also fetch each match page for statistics
    #[arg(long)]
    details: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "club_api=info,club_common=info".into()),
        )
        .init();

    let args = Args::parse();

    let root_folder = RootFolderResolver::new("club-scrape")
        .with_cli_arg(args.root_folder.clone())
        .with_config_file(args.config.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let config_path = args.config.clone().unwrap_or_else(|| initializer.config_path());
    let toml = load_toml_config(&config_path)?;
    let config = ServerConfig::from_toml(&toml, initializer.root_folder().to_path_buf(), None);

    let pool = club_common::db::init_database(&initializer.database_path())
        .await
        .context("Failed to open database")?;

    let scraper = LffScraper::new(config.scraper.clone())?;
    let options = ScrapeOptions {
        fixtures_path: args.fixtures_path,
        standings_path: args.standings_path,
        include_details: args.details.then_some(true),
    };
    let report = scraper.run(&pool, &options).await?;

    for error in &report.errors {
        warn!("{}", error);
    }
    info!(
        "Upserted {} fixtures and {} standings",
        report.fixtures_upserted, report.standings_upserted
    );

    if report.errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Scrape finished with {} errors", report.errors.len())
    }
}
