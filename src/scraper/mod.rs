pub mod cleaner;
pub mod extract;
pub mod http_client;

use crate::config::ScraperConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use self::http_client::HttpClient;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Where the raw listing HTML comes from. Production fetches the live
/// portal; tests hand in fixture strings.
#[async_trait]
pub trait IpoSource: Send + Sync {
    async fn fetch_listing(&self) -> Result<String>;
}

// ── ShareSansar fetcher ───────────────────────────────────────────────────────

/// Fetches the portal's front page and keeps a local copy, so the last
/// scraped HTML can be inspected (or re-run offline) after the fact.
pub struct ShareSansarFetcher {
    client: HttpClient,
    source_url: String,
    cache_path: PathBuf,
}

impl ShareSansarFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            source_url: config.source_url.trim_end_matches('/').to_string(),
            cache_path: config.cache_path.clone(),
        })
    }

    fn save_cache(&self, html: &str) -> Result<()> {
        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        std::fs::write(&self.cache_path, html)
            .with_context(|| format!("Failed to write HTML cache {:?}", self.cache_path))?;
        debug!("Saved {} bytes to {:?}", html.len(), self.cache_path);
        Ok(())
    }
}

#[async_trait]
impl IpoSource for ShareSansarFetcher {
    async fn fetch_listing(&self) -> Result<String> {
        info!("Fetching listing page ({})", self.source_url);

        let html = self
            .client
            .get_text(&self.source_url)
            .await
            .with_context(|| format!("Failed to fetch {}", self.source_url))?;

        self.save_cache(&html)?;
        Ok(html)
    }
}

// ── Cached source ─────────────────────────────────────────────────────────────

/// Reads the previously saved HTML instead of hitting the network.
pub struct CachedSource {
    path: PathBuf,
}

impl CachedSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl IpoSource for CachedSource {
    async fn fetch_listing(&self) -> Result<String> {
        info!("Reading cached listing from {:?}", self.path);
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read HTML cache {:?}", self.path))
    }
}
