//! CSV import and export of the domain list.

use csv::{ReaderBuilder, StringRecord, Trim, Writer};

use crate::error::{CertwatchError, Result};
use crate::reconcile::ImportRow;
use crate::registry::{CertStatus, DomainRecord};

const PLACEHOLDER: &str = "-";

pub const EXPORT_HEADERS: [&str; 7] = [
    "Domain",
    "Expiry Date",
    "Days Left",
    "Status",
    "Issuer",
    "Notes",
    "Last Checked",
];

/// Parse import content into rows.
///
/// When the first record has a `domain` column (any case) it is treated as a
/// header and an optional `notes` column is picked up. Otherwise every line is
/// a domain in the first column. Lines starting with `#` are ignored.
pub fn parse_import(content: &str) -> Result<Vec<ImportRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let records = reader
        .records()
        .collect::<std::result::Result<Vec<StringRecord>, csv::Error>>()?;

    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };

    let column = |name: &str| first.iter().position(|h| h.eq_ignore_ascii_case(name));

    let rows = match column("domain") {
        Some(domain_idx) => {
            let notes_idx = column("notes");
            records[1..]
                .iter()
                .map(|record| ImportRow {
                    domain: record.get(domain_idx).unwrap_or_default().to_string(),
                    notes: notes_idx.map(|i| record.get(i).unwrap_or_default().to_string()),
                })
                .collect()
        }
        None => records
            .iter()
            .map(|record| ImportRow {
                domain: record.get(0).unwrap_or_default().to_string(),
                notes: None,
            })
            .collect(),
    };

    Ok(rows)
}

/// Render records as CSV with human-readable dates.
pub fn export_csv(records: &[DomainRecord]) -> Result<String> {
    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_record(EXPORT_HEADERS)?;

    for record in records {
        let expiry = record
            .valid_to
            .map(|d| d.format("%Y-%m-%d").to_string());
        let days = record.days_remaining.map(|d| format!("{} days", d));
        let status = match record.status {
            CertStatus::Unknown => None,
            status => Some(status.as_str().to_string()),
        };
        let last_checked = record
            .last_checked
            .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string());

        wtr.write_record([
            record.domain.as_str(),
            cell(expiry.as_deref()),
            cell(days.as_deref()),
            cell(status.as_deref()),
            cell(record.issuer.as_deref()),
            cell(record.notes.as_deref()),
            cell(last_checked.as_deref()),
        ])?;
    }

    let data = wtr
        .into_inner()
        .map_err(|e| CertwatchError::Other(format!("CSV writer error: {}", e)))?;
    String::from_utf8(data).map_err(|e| CertwatchError::Other(e.to_string()))
}

fn cell(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => PLACEHOLDER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RecordUpdate;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_header_columns_match_case_insensitively() {
        let rows = parse_import("Notes,DOMAIN\nprod,a.example\n,b.example\n").unwrap();
        assert_eq!(
            rows,
            vec![
                ImportRow::new("a.example", Some("prod")),
                ImportRow::new("b.example", Some("")),
            ]
        );
    }

    #[test]
    fn test_header_without_notes_column() {
        let rows = parse_import("domain\na.example\n").unwrap();
        assert_eq!(rows, vec![ImportRow::new("a.example", None)]);
    }

    #[test]
    fn test_plain_list_with_comments() {
        let content = "# production\na.example\n\n  b.example  \nc.example,ignored\n";
        let rows = parse_import(content).unwrap();
        let domains: Vec<&str> = rows.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(domains, vec!["a.example", "b.example", "c.example"]);
        assert!(rows.iter().all(|r| r.notes.is_none()));
    }

    #[test]
    fn test_short_rows_keep_blank_domain() {
        let rows = parse_import("notes,domain\norphan\n").unwrap();
        assert_eq!(rows, vec![ImportRow::new("", Some("orphan"))]);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_import("").unwrap().is_empty());
        assert!(parse_import("# nothing here\n").unwrap().is_empty());
    }

    #[test]
    fn test_export_uses_placeholders() {
        let fresh = DomainRecord::new("new.example".to_string(), None);
        let csv = export_csv(&[fresh]).unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next(),
            Some("Domain,Expiry Date,Days Left,Status,Issuer,Notes,Last Checked")
        );
        assert_eq!(lines.next(), Some("new.example,-,-,-,-,-,-"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_export_formats_dates_and_days() {
        let checked = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let mut record = DomainRecord::new("shop.example".to_string(), Some("web, eu".to_string()));
        record.apply(
            RecordUpdate::new()
                .with_status(CertStatus::Expiring)
                .with_days_remaining(5)
                .with_issuer("R3")
                .with_last_checked(checked),
        );
        record.valid_to = Some(Utc.with_ymd_and_hms(2026, 3, 6, 0, 0, 0).unwrap());

        let csv = export_csv(&[record]).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "shop.example,2026-03-06,5 days,expiring,R3,\"web, eu\",2026-03-01 09:30 UTC"
        );
    }
}
