//! Structural extraction of the IPO listing table.
//!
//! The source page carries its IPO table inside a container with a
//! stable `id="eipo"` anchor. Everything here is a structural + text
//! cleaning transform; interpreting cell content is the caller's job.

use crate::models::HeaderMap;
use crate::scraper::cleaner::clean_text;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;

/// Anchor id of the IPO section on the listing page. A fixed contract
/// with the source site; if it changes, extraction fails loudly.
pub const IPO_SECTION_ID: &str = "eipo";

#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("IPO section '#{IPO_SECTION_ID}' not found on the page")]
    SectionNotFound,

    #[error("IPO table body not found")]
    TableBodyNotFound,

    #[error("no table headings found")]
    NoHeadings,

    #[error("'Status' column not found in table headings")]
    StatusColumnMissing,
}

/// The IPO listing as a normalised table: a header-name → column-index
/// map plus data rows in document order. Rows may be shorter than the
/// header count; they are never padded.
#[derive(Debug, Clone, PartialEq)]
pub struct IpoTable {
    pub headers: HeaderMap,
    pub rows: Vec<Vec<String>>,
}

// Selector::parse only fails on malformed selector syntax, which for
// these literals would be a programming error.
fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("bad selector '{}': {:?}", css, e))
}

/// Locate the IPO section and convert its table into headers + rows.
pub fn extract_ipo_table(html: &str) -> Result<IpoTable, ExtractError> {
    let doc = Html::parse_document(html);

    let section = doc
        .select(&sel(&format!("#{}", IPO_SECTION_ID)))
        .next()
        .ok_or(ExtractError::SectionNotFound)?;

    let body = section
        .select(&sel("tbody"))
        .next()
        .ok_or(ExtractError::TableBodyNotFound)?;

    let headers = extract_headings(section)?;
    let rows = extract_rows(body);

    debug!(
        "Extracted {} rows, headings: {:?}",
        rows.len(),
        headers.labels().collect::<Vec<_>>()
    );

    Ok(IpoTable { headers, rows })
}

/// Collect all `th` cells within the section (not just the body) in
/// document order and map each label to its column index.
fn extract_headings(section: ElementRef<'_>) -> Result<HeaderMap, ExtractError> {
    let labels: Vec<String> = section
        .select(&sel("th"))
        .map(|th| clean_text(&th.text().collect::<String>()))
        .collect();

    if labels.is_empty() {
        return Err(ExtractError::NoHeadings);
    }
    Ok(HeaderMap::from_labels(labels))
}

/// Data rows from the table body. Rows with zero `td` cells are
/// separators or padding, not data, and are dropped. Short rows are
/// kept as-is.
fn extract_rows(body: ElementRef<'_>) -> Vec<Vec<String>> {
    let td = sel("td");
    body.select(&sel("tr"))
        .map(|tr| {
            tr.select(&td)
                .map(|cell| clean_text(&cell.text().collect::<String>()))
                .collect::<Vec<String>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect()
}

/// Find the first row whose "Status" cell equals "open" (trimmed,
/// case-insensitive). Rows too short to cover the status column are
/// skipped, not errors. A missing "Status" heading is a hard error:
/// it means the source schema changed, which must not be mistaken for
/// "no open IPO today".
///
/// Only the first match is ever returned. The domain lists at most one
/// notification-worthy open IPO at a time; simultaneous opens are a
/// known limitation.
pub fn select_open_row(table: &IpoTable) -> Result<Option<&[String]>, ExtractError> {
    let status_col = table
        .headers
        .get("Status")
        .ok_or(ExtractError::StatusColumnMissing)?;

    let open = table.rows.iter().find(|row| {
        row.get(status_col)
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("open"))
    });

    Ok(open.map(|row| row.as_slice()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn listing_page(table: &str) -> String {
        format!(
            r#"<html><body>
                <div class="nav">ShareSansar</div>
                <div id="eipo"><table>{}</table></div>
            </body></html>"#,
            table
        )
    }

    const SAMPLE_TABLE: &str = r#"
        <thead><tr>
            <th>SN</th><th> Status </th><th>Company
            Name</th><th>Units</th><th>Price</th><th>Open Date</th><th>Close Date</th>
        </tr></thead>
        <tbody>
            <tr><td>1</td><td>Closed</td><td>Old Corp</td><td>500</td><td>NPR 90</td><td>2024-12-01</td><td>2024-12-05</td></tr>
            <tr></tr>
            <tr><td>2</td><td>
                Open </td><td>Acme Co</td><td>1,000</td><td>NPR 100</td><td>2025-01-05</td><td>2025-01-10</td></tr>
        </tbody>"#;

    #[test]
    fn test_extracts_headers_and_rows() {
        let table = extract_ipo_table(&listing_page(SAMPLE_TABLE)).unwrap();

        assert_eq!(table.headers.get("Status"), Some(1));
        assert_eq!(table.headers.get("Company Name"), Some(2));
        assert_eq!(table.headers.get("Close Date"), Some(6));
        assert_eq!(table.headers.len(), 7);

        // The empty separator row has no td cells and is dropped
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][2], "Acme Co");
        assert_eq!(table.rows[1][1], "Open");
    }

    #[test]
    fn test_missing_section_is_an_error() {
        let html = "<html><body><div id='other'>nothing</div></body></html>";
        assert_eq!(
            extract_ipo_table(html).unwrap_err(),
            ExtractError::SectionNotFound
        );
    }

    #[test]
    fn test_missing_body_is_an_error() {
        let html = listing_page("<thead><tr><th>Status</th></tr></thead>");
        assert_eq!(
            extract_ipo_table(&html).unwrap_err(),
            ExtractError::TableBodyNotFound
        );
    }

    #[test]
    fn test_no_headings_is_an_error() {
        let html = listing_page("<tbody><tr><td>1</td></tr></tbody>");
        assert_eq!(
            extract_ipo_table(&html).unwrap_err(),
            ExtractError::NoHeadings
        );
    }

    #[test]
    fn test_duplicate_headings_last_wins() {
        let html = listing_page(
            r#"<thead><tr><th>Status</th><th>Name</th><th>Status</th></tr></thead>
               <tbody><tr><td>x</td></tr></tbody>"#,
        );
        let table = extract_ipo_table(&html).unwrap();
        assert_eq!(table.headers.get("Status"), Some(2));
    }

    #[test]
    fn test_select_open_returns_first_match() {
        let table = IpoTable {
            headers: HeaderMap::from_labels(["SN", "Status", "Company Name"]),
            rows: vec![
                vec!["1".into(), "closed".into(), "A".into()],
                vec!["2".into(), "Open".into(), "B".into()],
                vec!["3".into(), "OPEN".into(), "C".into()],
            ],
        };
        let row = select_open_row(&table).unwrap().unwrap();
        assert_eq!(row[2], "B");
    }

    #[test]
    fn test_select_open_none_when_no_match() {
        let table = IpoTable {
            headers: HeaderMap::from_labels(["Status"]),
            rows: vec![vec!["closed".into()], vec!["coming soon".into()]],
        };
        assert_eq!(select_open_row(&table).unwrap(), None);
    }

    #[test]
    fn test_select_open_skips_short_rows() {
        let table = IpoTable {
            headers: HeaderMap::from_labels(["SN", "Status"]),
            rows: vec![
                vec!["1".into()], // too short to cover the status column
                vec!["2".into(), "open".into()],
            ],
        };
        let row = select_open_row(&table).unwrap().unwrap();
        assert_eq!(row[0], "2");
    }

    #[test]
    fn test_select_open_without_status_column_is_an_error() {
        let table = IpoTable {
            headers: HeaderMap::from_labels(["SN", "Name"]),
            rows: vec![],
        };
        assert_eq!(
            select_open_row(&table).unwrap_err(),
            ExtractError::StatusColumnMissing
        );
    }

    #[test]
    fn test_reordered_columns_yield_the_same_record() {
        // Same listing with the columns shuffled: selection and field
        // mapping must follow header names, not positions.
        let reordered = r#"
            <thead><tr>
                <th>Company Name</th><th>Open Date</th><th>Close Date</th>
                <th>Units</th><th>Price</th><th>Status</th>
            </tr></thead>
            <tbody>
                <tr><td>Old Corp</td><td>2024-12-01</td><td>2024-12-05</td><td>500</td><td>NPR 90</td><td>Closed</td></tr>
                <tr><td>Acme Co</td><td>2025-01-05</td><td>2025-01-10</td><td>1,000</td><td>NPR 100</td><td>Open</td></tr>
            </tbody>"#;

        let base = extract_ipo_table(&listing_page(SAMPLE_TABLE)).unwrap();
        let base_row = select_open_row(&base).unwrap().unwrap();
        let expected = crate::models::IpoRecord::from_row(base_row, &base.headers).unwrap();

        let table = extract_ipo_table(&listing_page(reordered)).unwrap();
        let row = select_open_row(&table).unwrap().unwrap();
        let ipo = crate::models::IpoRecord::from_row(row, &table.headers).unwrap();

        assert_eq!(ipo, expected);
        assert_eq!(ipo.company_name, "Acme Co");
    }

    #[test]
    fn test_end_to_end_extract_and_select() {
        let table = extract_ipo_table(&listing_page(SAMPLE_TABLE)).unwrap();
        let row = select_open_row(&table).unwrap().unwrap();
        let ipo = crate::models::IpoRecord::from_row(row, &table.headers).unwrap();

        assert_eq!(ipo.company_name, "Acme Co");
        assert_eq!(ipo.units_available, "1,000");
        assert_eq!(ipo.price_per_unit, "NPR 100");
        assert_eq!(ipo.start_date, "2025-01-05");
        assert_eq!(ipo.end_date, "2025-01-10");
        assert!(ipo.is_open());
    }
}
