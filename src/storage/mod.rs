//! Notification history, the durable state of the whole system.
//!
//! A JSON object keyed by company name, pretty-printed so operators can
//! read and hand-edit it. Every update is a full read-modify-write of
//! the file; last successful write wins. The design assumes a single
//! process instance at a time (one scheduler-driven invocation), so
//! there is no file locking around the read-modify-write cycle.

use crate::models::{IpoRecord, NotificationRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub type History = BTreeMap<String, NotificationRecord>;

pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full history. A missing or corrupt file degrades to an
    /// empty history with a warning; the store is advisory and must
    /// never block a cycle.
    pub fn load(&self) -> History {
        if !self.path.exists() {
            return History::new();
        }

        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not read history file {:?}: {}", self.path, e);
                return History::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(history) => history,
            Err(e) => {
                warn!(
                    "History file {:?} is corrupt ({}), treating as empty",
                    self.path, e
                );
                History::new()
            }
        }
    }

    /// Whether a notification already went out for this company.
    pub fn is_notified(&self, company_name: &str) -> bool {
        match self.load().get(company_name) {
            Some(rec) => {
                debug!(
                    "{} was already notified at {}",
                    company_name, rec.notified_at
                );
                true
            }
            None => false,
        }
    }

    /// Upsert the notification record for an IPO. One record per
    /// company; re-notifying overwrites (most recent wins), it never
    /// accumulates.
    pub fn record(&self, ipo: &IpoRecord, at: DateTime<Utc>) -> Result<()> {
        let mut history = self.load();
        history.insert(
            ipo.company_name.clone(),
            NotificationRecord::new(ipo, at),
        );
        self.persist(&history)?;
        info!("Saved notification record for {}", ipo.company_name);
        Ok(())
    }

    /// Drop entries older than `age_days`. Entries whose timestamp does
    /// not parse are kept: retention must fail safe, never delete on a
    /// guess.
    pub fn evict_older_than(&self, age_days: i64) -> Result<usize> {
        let history = self.load();
        let cutoff = Utc::now() - Duration::days(age_days);

        let before = history.len();
        let kept: History = history
            .into_iter()
            .filter(|(company, rec)| match rec.notified_at() {
                Some(at) => at.with_timezone(&Utc) >= cutoff,
                None => {
                    warn!(
                        "Keeping {} despite unparsable timestamp '{}'",
                        company, rec.notified_at
                    );
                    true
                }
            })
            .collect();

        let removed = before - kept.len();
        if removed > 0 {
            self.persist(&kept)?;
        }
        info!("Retention cleanup removed {} record(s)", removed);
        Ok(removed)
    }

    /// Probe for the health command: the history must load and the file
    /// must be writable. Rewrites the file with its own content, so a
    /// healthy store is left unchanged.
    pub fn health_check(&self) -> bool {
        let history = self.load();
        self.persist(&history).is_ok()
    }

    pub fn stats(&self) -> HistoryStats {
        let history = self.load();
        let mut dates: Vec<_> = history.values().filter_map(|r| r.notified_at()).collect();
        dates.sort();

        HistoryStats {
            total_notifications: history.len(),
            first_notified_at: dates.first().map(|d| d.to_rfc3339()),
            last_notified_at: dates.last().map(|d| d.to_rfc3339()),
            file_size_bytes: std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0),
        }
    }

    fn persist(&self, history: &History) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(history)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write history file {:?}", self.path))
    }
}

#[derive(Debug)]
pub struct HistoryStats {
    pub total_notifications: usize,
    pub first_notified_at: Option<String>,
    pub last_notified_at: Option<String>,
    pub file_size_bytes: u64,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
