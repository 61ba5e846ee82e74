use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ── Header map ────────────────────────────────────────────────────────────────

/// Maps a table header label ("Status", "Company Name", …) to its
/// zero-based column index. Built once per scrape, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMap {
    index: HashMap<String, usize>,
    len: usize,
}

impl HeaderMap {
    /// Build from header labels in document order. Duplicate labels keep
    /// the last occurrence.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = HashMap::new();
        let mut len = 0usize;
        for (i, label) in labels.into_iter().enumerate() {
            index.insert(label.into(), i);
            len = i + 1;
        }
        Self { index, len }
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Number of columns, counting duplicates that were overwritten.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(|s| s.as_str())
    }
}

// ── IPO record ────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("row has no column {index} for '{field}'")]
    ColumnOutOfRange { field: &'static str, index: usize },

    #[error("required field '{0}' is empty")]
    EmptyField(&'static str),
}

/// One IPO listing, as scraped. All fields are kept verbatim from the
/// source table; no numeric or date parsing happens at this layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IpoRecord {
    pub company_name: String,
    pub units_available: String,
    pub price_per_unit: String,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
}

impl IpoRecord {
    /// Build a record from a table row, resolving each field's column
    /// through the header map. The numeric fallbacks are the columns the
    /// source table has historically used; they only apply when a header
    /// label is missing, as a compatibility shim against label drift.
    pub fn from_row(row: &[String], headers: &HeaderMap) -> Result<Self, RecordError> {
        let cell = |field: &'static str, fallback: usize| -> Result<String, RecordError> {
            let idx = headers.get(field).unwrap_or(fallback);
            row.get(idx)
                .cloned()
                .ok_or(RecordError::ColumnOutOfRange { field, index: idx })
        };

        let record = Self {
            company_name: cell("Company Name", 2)?,
            units_available: cell("Units", 3)?,
            price_per_unit: cell("Price", 4)?,
            start_date: cell("Open Date", 5)?,
            end_date: cell("Close Date", 6)?,
            status: cell("Status", 1)?,
        };
        record.validate()?;
        Ok(record)
    }

    fn validate(&self) -> Result<(), RecordError> {
        if self.company_name.trim().is_empty() {
            return Err(RecordError::EmptyField("company_name"));
        }
        if self.status.trim().is_empty() {
            return Err(RecordError::EmptyField("status"));
        }
        Ok(())
    }

    /// Whether the listing is currently open for application.
    pub fn is_open(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("open")
    }
}

// ── Notification record ───────────────────────────────────────────────────────

/// Persisted proof that a notification went out for a company.
///
/// `notified_at` is kept as an RFC 3339 string rather than a parsed
/// timestamp so one malformed entry can't poison the whole history file;
/// eviction parses it per entry and retains anything unparsable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRecord {
    pub company_name: String,
    pub notified_at: String,
    pub ipo_data: IpoRecord,
}

impl NotificationRecord {
    pub fn new(ipo: &IpoRecord, at: DateTime<Utc>) -> Self {
        Self {
            company_name: ipo.company_name.clone(),
            notified_at: at.to_rfc3339(),
            ipo_data: ipo.clone(),
        }
    }

    pub fn notified_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.notified_at).ok()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> HeaderMap {
        HeaderMap::from_labels([
            "SN",
            "Status",
            "Company Name",
            "Units",
            "Price",
            "Open Date",
            "Close Date",
        ])
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_header_map_last_duplicate_wins() {
        let map = HeaderMap::from_labels(["A", "B", "A"]);
        assert_eq!(map.get("A"), Some(2));
        assert_eq!(map.get("B"), Some(1));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_from_row_maps_fields_by_header_name() {
        let r = row(&[
            "1", "Open", "Acme Co", "1,000", "NPR 100", "2025-01-05", "2025-01-10",
        ]);
        let ipo = IpoRecord::from_row(&r, &headers()).unwrap();
        assert_eq!(ipo.company_name, "Acme Co");
        assert_eq!(ipo.units_available, "1,000");
        assert_eq!(ipo.price_per_unit, "NPR 100");
        assert_eq!(ipo.start_date, "2025-01-05");
        assert_eq!(ipo.end_date, "2025-01-10");
        assert_eq!(ipo.status, "Open");
        assert!(ipo.is_open());
    }

    #[test]
    fn test_from_row_follows_headers_not_positions() {
        // Same data, columns shuffled: header lookup must still win.
        let map = HeaderMap::from_labels([
            "Company Name",
            "Open Date",
            "Close Date",
            "Units",
            "Price",
            "Status",
        ]);
        let r = row(&[
            "Acme Co", "2025-01-05", "2025-01-10", "1,000", "NPR 100", "Open",
        ]);
        let ipo = IpoRecord::from_row(&r, &map).unwrap();
        assert_eq!(ipo.company_name, "Acme Co");
        assert_eq!(ipo.start_date, "2025-01-05");
        assert_eq!(ipo.status, "Open");
    }

    #[test]
    fn test_from_row_uses_fallback_indices_without_headers() {
        // Empty header map: every field falls back to its documented index.
        let r = row(&[
            "1", "Open", "Acme Co", "1,000", "NPR 100", "2025-01-05", "2025-01-10",
        ]);
        let ipo = IpoRecord::from_row(&r, &HeaderMap::default()).unwrap();
        assert_eq!(ipo.company_name, "Acme Co");
        assert_eq!(ipo.status, "Open");
    }

    #[test]
    fn test_from_row_short_row_is_an_error() {
        let r = row(&["1", "Open", "Acme Co"]);
        let err = IpoRecord::from_row(&r, &headers()).unwrap_err();
        assert_eq!(
            err,
            RecordError::ColumnOutOfRange {
                field: "Units",
                index: 3
            }
        );
    }

    #[test]
    fn test_from_row_rejects_empty_company() {
        let r = row(&["1", "Open", " ", "1,000", "NPR 100", "a", "b"]);
        let err = IpoRecord::from_row(&r, &headers()).unwrap_err();
        assert_eq!(err, RecordError::EmptyField("company_name"));
    }

    #[test]
    fn test_is_open_is_case_insensitive() {
        let mut ipo = IpoRecord::from_row(
            &row(&["1", "OPEN", "Acme", "x", "x", "x", "x"]),
            &headers(),
        )
        .unwrap();
        assert!(ipo.is_open());
        ipo.status = " open ".into();
        assert!(ipo.is_open());
        ipo.status = "Closed".into();
        assert!(!ipo.is_open());
    }

    #[test]
    fn test_notification_record_timestamp_roundtrip() {
        let ipo = IpoRecord::from_row(
            &row(&["1", "Open", "Acme", "x", "x", "x", "x"]),
            &headers(),
        )
        .unwrap();
        let now = Utc::now();
        let rec = NotificationRecord::new(&ipo, now);
        assert_eq!(rec.notified_at().unwrap(), now);

        let broken = NotificationRecord {
            notified_at: "yesterday-ish".into(),
            ..rec
        };
        assert!(broken.notified_at().is_none());
    }
}
