//! Email delivery for IPO alerts.
//!
//! The pipeline only knows the [`EmailProvider`] seam; transport lives
//! behind it. The production provider posts to the Resend HTTP API.

use crate::config::EmailConfig;
use crate::models::IpoRecord;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

// ── Provider trait ────────────────────────────────────────────────────────────

#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Deliver one message to one recipient.
    async fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<()>;

    /// Cheap connectivity probe for the health command. Providers
    /// without a meaningful probe report healthy.
    async fn check_connection(&self) -> Result<()> {
        Ok(())
    }
}

// ── Resend provider ───────────────────────────────────────────────────────────

pub struct ResendProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from_address: String,
}

impl ResendProvider {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let Some(api_key) = config.resend_api_key.clone() else {
            bail!("IPO__EMAIL__RESEND_API_KEY is not configured");
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build email HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    async fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<()> {
        debug!("POST {} (to {})", self.api_url, recipient);

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from_address,
                "to": [recipient],
                "subject": subject,
                "text": body,
            }))
            .send()
            .await
            .with_context(|| format!("Email API request failed for {}", recipient))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            bail!("Email API returned {} for {}: {}", status, recipient, detail);
        }

        info!("Email sent to {}", recipient);
        Ok(())
    }

    /// Probe the domains endpoint: it answers a GET with a valid key
    /// and rejects a bad one, without sending anything.
    async fn check_connection(&self) -> Result<()> {
        let url = format!("{}/domains", self.api_url.trim_end_matches("/emails"));
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Email API unreachable")?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else if status.as_u16() == 401 || status.as_u16() == 403 {
            bail!("Email API rejected the configured key ({})", status)
        } else {
            bail!("Email API probe returned {}", status)
        }
    }
}

// ── No-op provider ────────────────────────────────────────────────────────────

/// Stand-in for dry runs, where the pipeline must not deliver anything.
pub struct NoopProvider;

#[async_trait]
impl EmailProvider for NoopProvider {
    async fn send(&self, _subject: &str, _body: &str, recipient: &str) -> Result<()> {
        debug!("noop send to {}", recipient);
        Ok(())
    }
}

// ── Message composition ───────────────────────────────────────────────────────

/// Build the alert subject and plain-text body for an open IPO.
pub fn compose_alert(ipo: &IpoRecord) -> (String, String) {
    let subject = format!("IPO Alert: {} is now open", ipo.company_name);

    let body = format!(
        "Hello,\n\n\
         The following IPO is now open for application:\n\n\
         Company Name:    {}\n\
         Units Available: {}\n\
         Price per Unit:  {}\n\
         Open Date:       {}\n\
         Close Date:      {}\n\
         Status:          {}\n\n\
         Visit https://meroshare.cdsc.com.np to apply.\n\n\
         -- \n\
         Automated notification from ipo-alert.\n",
        ipo.company_name,
        ipo.units_available,
        ipo.price_per_unit,
        ipo.start_date,
        ipo.end_date,
        ipo.status,
    );

    (subject, body)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_alert_interpolates_all_fields() {
        let ipo = IpoRecord {
            company_name: "Acme Co".into(),
            units_available: "1,000".into(),
            price_per_unit: "NPR 100".into(),
            start_date: "2025-01-05".into(),
            end_date: "2025-01-10".into(),
            status: "Open".into(),
        };

        let (subject, body) = compose_alert(&ipo);
        assert_eq!(subject, "IPO Alert: Acme Co is now open");
        for field in ["Acme Co", "1,000", "NPR 100", "2025-01-05", "2025-01-10", "Open"] {
            assert!(body.contains(field), "body missing '{}'", field);
        }
    }

    #[tokio::test]
    async fn test_noop_provider_reports_healthy() {
        assert!(NoopProvider.check_connection().await.is_ok());
        assert!(NoopProvider.send("s", "b", "x@example.com").await.is_ok());
    }

    #[test]
    fn test_resend_provider_requires_api_key() {
        let config = EmailConfig {
            resend_api_key: None,
            ..EmailConfig::default()
        };
        assert!(ResendProvider::new(&config).is_err());
    }
}
