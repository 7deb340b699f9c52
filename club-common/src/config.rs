//! Configuration loading and root folder resolution
//!
//! The root folder holds the SQLite database, the optional `club.toml`
//! file and the local storage directory. It is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `CLUB_ROOT_FOLDER`
//! 3. `root_folder` key of the TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "CLUB_ROOT_FOLDER";

/// Default config file name inside the root folder
pub const CONFIG_FILE_NAME: &str = "club.toml";

/// Default database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "club.db";

/// Parsed `club.toml`
///
/// Every section is optional; a missing file yields `TomlConfig::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<String>,
    pub server: ServerSection,
    pub payments: PaymentsSection,
    pub email: EmailSection,
    pub pdf: PdfSection,
    pub storage: StorageSection,
    pub scraper: ScraperSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Public URL of the web front end, used in emails and payment redirects
    pub public_base_url: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_base_url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaymentsSection {
    pub api_base_url: String,
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub currency: String,
}

impl Default for PaymentsSection {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.stripe.com".to_string(),
            secret_key: None,
            webhook_secret: None,
            currency: "eur".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailSection {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from: String,
    /// Address receiving contact form messages
    pub club_inbox: String,
}

impl Default for EmailSection {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com".to_string(),
            api_key: None,
            from: "Club <no-reply@club.local>".to_string(),
            club_inbox: "info@club.local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PdfSection {
    /// Base URL of a headless-browser rendering service exposing `POST /pdf`.
    /// When unset, PDFs are produced by the in-process fallback only.
    pub renderer_url: Option<String>,
    pub renderer_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// "local" or "http"
    pub backend: String,
    pub url: Option<String>,
    pub bucket: String,
    pub api_key: Option<String>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            url: None,
            bucket: "documents".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperSection {
    pub base_url: String,
    pub fixtures_path: String,
    pub standings_path: String,
    pub competition: String,
    pub season: String,
    pub include_details: bool,
}

impl Default for ScraperSection {
    fn default() -> Self {
        Self {
            base_url: "https://www.lff.lt".to_string(),
            fixtures_path: "/rungtynes".to_string(),
            standings_path: "/turnyrine-lentele".to_string(),
            competition: "A Lyga".to_string(),
            season: "2026".to_string(),
            include_details: false,
        }
    }
}

/// Load a TOML config file.
///
/// A missing file is not an error: defaults are returned and a warning is
/// logged. A file that exists but does not parse is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded config file {}", path.display());
    Ok(config)
}

/// Resolves the root folder for one binary
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            config_file: None,
        }
    }

    /// Root folder given on the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Explicit config file to consult for `root_folder`
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            info!("[{}] Root folder from command line: {}", self.module_name, path.display());
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!("[{}] Root folder from {}: {}", self.module_name, ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(config_path) = &self.config_file {
            match load_toml_config(config_path) {
                Ok(config) => {
                    if let Some(root) = config.root_folder {
                        info!("[{}] Root folder from config file: {}", self.module_name, root);
                        return PathBuf::from(root);
                    }
                }
                Err(e) => warn!("[{}] Ignoring unreadable config file: {}", self.module_name, e),
            }
        }

        // Priority 4: OS-dependent compiled default
        default_root_folder()
    }
}

/// Creates the root folder layout and hands out well-known paths
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root_folder.join(CONFIG_FILE_NAME)
    }

    pub fn storage_path(&self) -> PathBuf {
        self.root_folder.join("storage")
    }
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("club"))
        .unwrap_or_else(|| PathBuf::from("./club_data"))
}

/// Read a secret from the environment, falling back to the config value.
///
/// Empty or whitespace-only values count as unset in both places.
pub fn env_or(env_var: &str, fallback: Option<&String>) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| fallback.filter(|v| !v.trim().is_empty()).cloned())
}
