//! Runtime configuration for club-api
//!
//! Built once at startup from the command line, the environment and
//! `club.toml`. Secrets resolve environment first, then TOML.

use club_common::config::{env_or, TomlConfig};
use std::path::PathBuf;

pub const PAYMENTS_SECRET_ENV: &str = "CLUB_PAYMENTS_SECRET_KEY";
pub const PAYMENTS_WEBHOOK_SECRET_ENV: &str = "CLUB_PAYMENTS_WEBHOOK_SECRET";
pub const EMAIL_API_KEY_ENV: &str = "CLUB_EMAIL_API_KEY";
pub const STORAGE_API_KEY_ENV: &str = "CLUB_STORAGE_API_KEY";

/// Resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_base_url: String,
    pub root_folder: PathBuf,
    pub payments: PaymentsConfig,
    pub email: EmailConfig,
    pub pdf: PdfConfig,
    pub storage: StorageConfig,
    pub scraper: ScraperConfig,
}

#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    pub api_base_url: String,
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from: String,
    pub club_inbox: String,
}

#[derive(Debug, Clone)]
pub struct PdfConfig {
    pub renderer_url: Option<String>,
    pub renderer_token: Option<String>,
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local { root: PathBuf },
    Http { url: String, bucket: String, api_key: Option<String> },
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub base_url: String,
    pub fixtures_path: String,
    pub standings_path: String,
    pub competition: String,
    pub season: String,
    pub include_details: bool,
}

impl ServerConfig {
    /// Merge the TOML file with command-line overrides
    pub fn from_toml(toml: &TomlConfig, root_folder: PathBuf, port: Option<u16>) -> Self {
        let storage = match (toml.storage.backend.as_str(), &toml.storage.url) {
            ("http", Some(url)) => StorageConfig::Http {
                url: url.trim_end_matches('/').to_string(),
                bucket: toml.storage.bucket.clone(),
                api_key: env_or(STORAGE_API_KEY_ENV, toml.storage.api_key.as_ref()),
            },
            _ => StorageConfig::Local {
                root: root_folder.join("storage"),
            },
        };

        Self {
            host: toml.server.host.clone(),
            port: port.unwrap_or(toml.server.port),
            public_base_url: toml.server.public_base_url.trim_end_matches('/').to_string(),
            root_folder,
            payments: PaymentsConfig {
                api_base_url: toml.payments.api_base_url.trim_end_matches('/').to_string(),
                secret_key: env_or(PAYMENTS_SECRET_ENV, toml.payments.secret_key.as_ref()),
                webhook_secret: env_or(
                    PAYMENTS_WEBHOOK_SECRET_ENV,
                    toml.payments.webhook_secret.as_ref(),
                ),
                currency: toml.payments.currency.to_lowercase(),
            },
            email: EmailConfig {
                api_url: toml.email.api_url.trim_end_matches('/').to_string(),
                api_key: env_or(EMAIL_API_KEY_ENV, toml.email.api_key.as_ref()),
                from: toml.email.from.clone(),
                club_inbox: toml.email.club_inbox.clone(),
            },
            pdf: PdfConfig {
                renderer_url: toml.pdf.renderer_url.clone(),
                renderer_token: toml.pdf.renderer_token.clone(),
            },
            storage,
            scraper: ScraperConfig {
                base_url: toml.scraper.base_url.trim_end_matches('/').to_string(),
                fixtures_path: toml.scraper.fixtures_path.clone(),
                standings_path: toml.scraper.standings_path.clone(),
                competition: toml.scraper.competition.clone(),
                season: toml.scraper.season.clone(),
                include_details: toml.scraper.include_details,
            },
        }
    }

    /// Configuration for tests and local development: everything local,
    /// no third-party credentials.
    pub fn local(root_folder: PathBuf) -> Self {
        Self::from_toml(&TomlConfig::default(), root_folder, None)
    }

    pub fn success_url(&self, order_id: &str) -> String {
        format!("{}/checkout/success?order={}", self.public_base_url, order_id)
    }

    pub fn cancel_url(&self, order_id: &str) -> String {
        format!("{}/checkout/cancel?order={}", self.public_base_url, order_id)
    }

    pub fn ticket_pdf_url(&self, ticket_id: &str) -> String {
        format!("{}/api/tickets/{}/pdf", self.public_base_url, ticket_id)
    }

    pub fn subscription_card_url(&self, subscription_id: &str) -> String {
        format!("{}/api/subscriptions/{}/card", self.public_base_url, subscription_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_defaults() {
        let config = ServerConfig::local(PathBuf::from("/tmp/club"));

        assert_eq!(config.port, 8080);
        assert!(matches!(
            config.storage,
            StorageConfig::Local { ref root } if root == &PathBuf::from("/tmp/club/storage")
        ));
        assert_eq!(config.payments.currency, "eur");
    }

    #[test]
    fn test_http_storage_requires_url() {
        let mut toml = TomlConfig::default();
        toml.storage.backend = "http".to_string();
        let config = ServerConfig::from_toml(&toml, PathBuf::from("/tmp/club"), None);
        assert!(matches!(config.storage, StorageConfig::Local { .. }));

        toml.storage.url = Some("https://storage.example.com/storage/v1/".to_string());
        let config = ServerConfig::from_toml(&toml, PathBuf::from("/tmp/club"), Some(9000));
        assert_eq!(config.port, 9000);
        match config.storage {
            StorageConfig::Http { url, bucket, .. } => {
                assert_eq!(url, "https://storage.example.com/storage/v1");
                assert_eq!(bucket, "documents");
            }
            other => panic!("expected http storage, got {:?}", other),
        }
    }

    #[test]
    fn test_redirect_urls() {
        let config = ServerConfig::local(PathBuf::from("/tmp/club"));
        assert_eq!(
            config.success_url("abc"),
            "http://localhost:3000/checkout/success?order=abc"
        );
        assert_eq!(
            config.ticket_pdf_url("t1"),
            "http://localhost:3000/api/tickets/t1/pdf"
        );
    }
}
