//! Notification pipeline: extract → select → dedup check → send → record.
//!
//! One cycle runs sequentially to completion. Expected absence ("no
//! open IPO") is a successful [`Outcome`], not an error; structural
//! extraction failures propagate as `Err` because they mean the source
//! schema changed and an operator should look.

use crate::email::{EmailProvider, compose_alert};
use crate::models::IpoRecord;
use crate::scraper::IpoSource;
use crate::scraper::extract::{extract_ipo_table, select_open_row};
use crate::storage::HistoryStore;
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

/// Every way a cycle can end, kept distinct so the CLI can map each to
/// its own exit code instead of collapsing them into a boolean.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// The listing had no open IPO. A normal, successful cycle.
    NoOpenIpo,
    /// The open IPO was already in the history; nothing was sent.
    AlreadyNotified { company: String },
    /// Dry-run mode: an alert would have gone out for this company.
    DryRun { company: String },
    /// At least one recipient got the alert and the history was updated.
    Sent { company: String, delivered: usize, failed: usize },
    /// Every recipient failed; nothing was recorded.
    SendFailed { company: String },
    /// The alert went out but the history write failed. A future run
    /// would resend; the operator must reconcile manually.
    SentNotRecorded { company: String, delivered: usize },
}

pub struct Pipeline<'a> {
    store: &'a HistoryStore,
    provider: &'a dyn EmailProvider,
    recipients: &'a [String],
    dry_run: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        store: &'a HistoryStore,
        provider: &'a dyn EmailProvider,
        recipients: &'a [String],
        dry_run: bool,
    ) -> Self {
        Self {
            store,
            provider,
            recipients,
            dry_run,
        }
    }

    /// Full cycle: fetch the listing through the source, then process it.
    pub async fn run(&self, source: &dyn IpoSource, force: bool) -> Result<Outcome> {
        let html = source.fetch_listing().await.context("Listing fetch failed")?;
        self.run_on_html(&html, force).await
    }

    /// Process one already-fetched listing page.
    pub async fn run_on_html(&self, html: &str, force: bool) -> Result<Outcome> {
        let table = extract_ipo_table(html)?;
        info!("Extracted {} IPO entries", table.rows.len());

        let Some(row) = select_open_row(&table)? else {
            info!("No open IPOs found");
            return Ok(Outcome::NoOpenIpo);
        };

        let ipo = IpoRecord::from_row(row, &table.headers)?;
        info!("Found open IPO: {}", ipo.company_name);

        if !force && self.store.is_notified(&ipo.company_name) {
            info!("Already notified about {}, skipping", ipo.company_name);
            return Ok(Outcome::AlreadyNotified {
                company: ipo.company_name,
            });
        }

        if self.dry_run {
            let (subject, _) = compose_alert(&ipo);
            info!(
                "DRY RUN: would send '{}' to {} recipient(s)",
                subject,
                self.recipients.len()
            );
            return Ok(Outcome::DryRun {
                company: ipo.company_name,
            });
        }

        let (delivered, failed) = self.send_to_all(&ipo).await;
        if delivered == 0 {
            error!("Failed to send any notifications for {}", ipo.company_name);
            return Ok(Outcome::SendFailed {
                company: ipo.company_name,
            });
        }

        // The send happened; a failed history write must be surfaced, not
        // retried into a duplicate alert.
        match self.store.record(&ipo, Utc::now()) {
            Ok(()) => Ok(Outcome::Sent {
                company: ipo.company_name,
                delivered,
                failed,
            }),
            Err(e) => {
                error!(
                    "Notification sent for {} but history write failed: {:#}",
                    ipo.company_name, e
                );
                Ok(Outcome::SentNotRecorded {
                    company: ipo.company_name,
                    delivered,
                })
            }
        }
    }

    /// One send per recipient, sequentially. Failing recipients are
    /// logged and skipped; they are not retried within this cycle.
    async fn send_to_all(&self, ipo: &IpoRecord) -> (usize, usize) {
        let (subject, body) = compose_alert(ipo);
        let mut delivered = 0usize;
        let mut failed = 0usize;

        for recipient in self.recipients {
            match self.provider.send(&subject, &body, recipient).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Send to {} failed: {:#}", recipient, e);
                    failed += 1;
                }
            }
        }

        info!("Alerts sent: {}/{}", delivered, self.recipients.len());
        (delivered, failed)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
