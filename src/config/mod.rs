use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_source_url")]
    pub source_url: String,

    /// Where the fetched HTML gets saved for inspection / offline runs.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Email configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub from_address: String,

    #[serde(default)]
    pub recipients: Vec<String>,

    #[serde(default)]
    pub resend_api_key: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_source_url() -> String {
    "https://www.sharesansar.com".to_string()
}
fn default_cache_path() -> PathBuf {
    PathBuf::from("data/ipo_listing.html")
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    1000
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_max_retries() -> u32 {
    3
}
fn default_user_agent() -> String {
    "ipo-alert/0.1 (IPO opening notifier)".to_string()
}
fn default_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}
fn default_history_path() -> PathBuf {
    PathBuf::from("data/ipo_history.json")
}
fn default_retention_days() -> i64 {
    30
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            cache_path: default_cache_path(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from_address: String::new(),
            recipients: Vec::new(),
            resend_api_key: None,
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
            retention_days: default_retention_days(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("IPO").separator("__"))
            .build()?;

        cfg.try_deserialize().context("Invalid configuration")
    }

    /// Checks needed before a real (sending) run. Dry runs and offline
    /// commands skip this so they work without email credentials.
    pub fn validate_for_sending(&self) -> Result<()> {
        Url::parse(&self.scraper.source_url)
            .with_context(|| format!("Invalid source URL '{}'", self.scraper.source_url))?;

        if self.email.recipients.is_empty() {
            bail!("No recipients configured (IPO__EMAIL__RECIPIENTS)");
        }
        for addr in &self.email.recipients {
            if !addr.contains('@') {
                bail!("Invalid recipient email: {}", addr);
            }
        }
        if !self.email.from_address.contains('@') {
            bail!("Invalid sender email: {:?}", self.email.from_address);
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_usable() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.scraper.source_url, "https://www.sharesansar.com");
        assert_eq!(cfg.storage.retention_days, 30);
        assert!(cfg.email.recipients.is_empty());
    }

    #[test]
    fn test_validation_rejects_missing_recipients() {
        let cfg = AppConfig::default();
        assert!(cfg.validate_for_sending().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_addresses() {
        let mut cfg = AppConfig::default();
        cfg.email.from_address = "alerts@example.com".into();
        cfg.email.recipients = vec!["not-an-email".into()];
        assert!(cfg.validate_for_sending().is_err());

        cfg.email.recipients = vec!["someone@example.com".into()];
        assert!(cfg.validate_for_sending().is_ok());
    }
}
