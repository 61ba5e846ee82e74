use crate::config::ScraperConfig;
use anyhow::{Context, Result};
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Thin reqwest wrapper: one portal page per cycle, fetched politely
/// (delay + jitter) with bounded retry on transient failures.
pub struct HttpClient {
    inner: reqwest::Client,
    config: ScraperConfig,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Fetch a URL as text. Retries on network errors and on 429/503;
    /// any other non-success status fails immediately.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.polite_delay().await;

        let mut last_err = anyhow::anyhow!("no attempts made");

        for attempt in 1..=(self.config.max_retries + 1) {
            debug!("GET {} (attempt {})", url, attempt);

            let resp = match self.inner.get(url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!("Request failed on attempt {}: {}", attempt, e);
                    last_err = anyhow::anyhow!("request error: {}", e);
                    sleep(self.backoff(attempt, false)).await;
                    continue;
                }
            };

            let status = resp.status();
            if status.is_success() {
                return resp.text().await.context("Failed to read response body");
            }

            last_err = anyhow::anyhow!("HTTP {}", status);
            if status.as_u16() == 429 || status.as_u16() == 503 {
                let pause = self.backoff(attempt, true);
                warn!(
                    "Throttled ({}) on attempt {}, sleeping {:?}",
                    status, attempt, pause
                );
                sleep(pause).await;
            } else {
                // 4xx/5xx other than throttling won't improve on retry
                break;
            }
        }

        Err(last_err).with_context(|| format!("All retries exhausted for {}", url))
    }

    fn backoff(&self, attempt: u32, throttled: bool) -> Duration {
        let factor = if throttled {
            2u64.pow(attempt)
        } else {
            attempt as u64
        };
        Duration::from_millis(self.config.request_delay_ms * factor)
    }

    /// Configured delay plus random jitter before each request.
    async fn polite_delay(&self) {
        let jitter = rand::thread_rng().gen_range(0..=self.config.jitter_ms);
        sleep(Duration::from_millis(self.config.request_delay_ms + jitter)).await;
    }
}
