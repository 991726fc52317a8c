use chrono::{DateTime, Utc};
use colored::Colorize;

use super::OutputFormatter;
use crate::colors::{days_color, status_color, CatppuccinExt};
use crate::inspector::CertificateResult;
use crate::reconcile::ImportReport;
use crate::registry::{CertStatus, DomainRecord};

const PLACEHOLDER: &str = "-";

/// Longest notes/issuer text shown in the table before truncation
const MAX_CELL: usize = 32;

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn format_age(checked: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - checked).num_seconds().max(0);
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}

pub struct HumanFormatter {
    use_colors: bool,
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    pub fn without_colors(mut self) -> Self {
        self.use_colors = false;
        self
    }

    fn label(&self, text: &str) -> String {
        if self.use_colors {
            text.sky().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn muted(&self, text: &str) -> String {
        if self.use_colors {
            text.overlay1().to_string()
        } else {
            text.to_string()
        }
    }

    fn success(&self, text: &str) -> String {
        if self.use_colors {
            text.ctp_green().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn warning(&self, text: &str) -> String {
        if self.use_colors {
            text.ctp_yellow().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn error(&self, text: &str) -> String {
        if self.use_colors {
            text.ctp_red().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn header(&self, text: &str) -> String {
        if self.use_colors {
            format!("\n{}\n{}", text.lavender().bold(), "─".repeat(text.len()).subtext0())
        } else {
            format!("\n{}\n{}", text, "-".repeat(text.len()))
        }
    }

    /// Pad first, then color, so escape codes never skew column widths.
    fn status(&self, status: CertStatus, width: usize) -> String {
        let padded = format!("{:<width$}", status.as_str(), width = width);
        if self.use_colors {
            status_color(status, &padded).to_string()
        } else {
            padded
        }
    }

    fn days(&self, days: Option<i64>, width: usize) -> String {
        match days {
            Some(d) => {
                let padded = format!("{:>width$}", d, width = width);
                if self.use_colors {
                    days_color(d, &padded).to_string()
                } else {
                    padded
                }
            }
            None => self.muted(&format!("{:>width$}", PLACEHOLDER, width = width)),
        }
    }

    fn icon(&self, status: CertStatus) -> String {
        match status {
            CertStatus::Valid => self.success("✓"),
            CertStatus::Expiring => self.warning("!"),
            CertStatus::Expired | CertStatus::Error => self.error("✗"),
            CertStatus::Unknown => self.muted("?"),
        }
    }

    fn summary(&self, statuses: impl Iterator<Item = CertStatus>) -> String {
        let mut counts = vec![0usize; CertStatus::ALL.len()];
        let mut total = 0;
        for status in statuses {
            if let Some(i) = CertStatus::ALL.iter().position(|s| *s == status) {
                counts[i] += 1;
            }
            total += 1;
        }

        let parts: Vec<String> = CertStatus::ALL
            .iter()
            .zip(counts)
            .filter(|(_, n)| *n > 0)
            .map(|(status, n)| {
                let text = format!("{} {}", n, status);
                if self.use_colors {
                    status_color(*status, &text).to_string()
                } else {
                    text
                }
            })
            .collect();

        let noun = if total == 1 { "domain" } else { "domains" };
        if parts.is_empty() {
            format!("{} {}", total, noun)
        } else {
            format!("{} {}: {}", total, noun, parts.join(", "))
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_records(&self, records: &[DomainRecord]) -> String {
        if records.is_empty() {
            return format!(
                "  {}",
                self.muted("No domains tracked. Use 'add <domain>' or 'import <file>'.")
            );
        }

        let now = Utc::now();
        let domain_width = records
            .iter()
            .map(|r| r.domain.len())
            .max()
            .unwrap_or(0)
            .max("DOMAIN".len());

        let mut output = Vec::new();
        output.push(self.header(&format!("Tracked domains ({})", records.len())));
        output.push(format!(
            "  {}",
            self.label(&format!(
                "{:<dw$}  {:<8}  {:>5}  {:<10}  {:<20}  {:<10}  {}",
                "DOMAIN",
                "STATUS",
                "DAYS",
                "EXPIRES",
                "ISSUER",
                "CHECKED",
                "NOTES",
                dw = domain_width
            ))
        ));

        for record in records {
            let issuer = truncate(record.issuer.as_deref().unwrap_or(PLACEHOLDER), 20);
            let checked = record
                .last_checked
                .map(|c| format_age(c, now))
                .unwrap_or_else(|| PLACEHOLDER.to_string());
            let notes = match record.notes.as_deref() {
                Some(n) if !n.trim().is_empty() => truncate(n, MAX_CELL),
                _ => String::new(),
            };

            output.push(format!(
                "  {:<dw$}  {}  {}  {:<10}  {:<20}  {}  {}",
                record.domain,
                self.status(record.status, 8),
                self.days(record.days_remaining, 5),
                format_date(record.valid_to),
                issuer,
                self.muted(&format!("{:<10}", checked)),
                self.muted(&notes),
                dw = domain_width
            ));

            if let (CertStatus::Error, Some(err)) = (record.status, record.error.as_deref()) {
                output.push(format!(
                    "  {:<dw$}  {}",
                    "",
                    self.error(&truncate(err, 80)),
                    dw = domain_width
                ));
            }
        }

        output.push(String::new());
        output.push(format!("  {}", self.summary(records.iter().map(|r| r.status))));
        output.join("\n")
    }

    fn format_results(&self, results: &[CertificateResult]) -> String {
        if results.is_empty() {
            return format!("  {}", self.muted("Nothing to refresh."));
        }

        let domain_width = results.iter().map(|r| r.domain.len()).max().unwrap_or(0);
        let mut output = Vec::new();
        output.push(self.header(&format!("Refreshed {} domains", results.len())));

        for result in results {
            let detail = match (result.reading(), result.error()) {
                (Some(reading), _) => format!(
                    "{} {}  {}",
                    self.days(Some(reading.days_remaining), 0),
                    if reading.days_remaining.abs() == 1 { "day " } else { "days" },
                    self.muted(&format!(
                        "expires {} ({})",
                        reading.valid_to.format("%Y-%m-%d"),
                        reading.issuer
                    ))
                ),
                (None, Some(err)) => self.error(&err.to_string()),
                (None, None) => String::new(),
            };

            output.push(format!(
                "  {} {:<dw$}  {}  {}",
                self.icon(result.status()),
                result.domain,
                self.status(result.status(), 8),
                detail,
                dw = domain_width
            ));
        }

        output.push(String::new());
        output.push(format!("  {}", self.summary(results.iter().map(|r| r.status()))));
        output.join("\n")
    }

    fn format_import(&self, report: &ImportReport) -> String {
        let mut output = Vec::new();
        output.push(self.header("Import"));
        output.push(format!(
            "  {}: {}",
            self.label("Imported"),
            self.success(&report.imported.to_string())
        ));
        output.push(format!(
            "  {}: {}",
            self.label("New"),
            report.created
        ));

        if !report.rejected.is_empty() {
            output.push(format!(
                "  {}: {}",
                self.label("Rejected"),
                self.warning(&report.rejected.len().to_string())
            ));
            for (domain, reason) in &report.rejected {
                output.push(format!("    {} {}", self.error(domain), self.muted(reason)));
            }
        }

        output.push(self.format_results(&report.results));
        output.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::{CertificateInfo, CertificateReading, InspectionError};
    use crate::registry::RecordUpdate;
    use chrono::Duration;

    fn formatter() -> HumanFormatter {
        HumanFormatter::new().without_colors()
    }

    #[test]
    fn test_empty_registry_hint() {
        let out = formatter().format_records(&[]);
        assert!(out.contains("No domains tracked"));
    }

    #[test]
    fn test_records_table() {
        let mut ok = DomainRecord::new("shop.example".to_string(), Some("prod".to_string()));
        ok.apply(
            RecordUpdate::new()
                .with_status(CertStatus::Valid)
                .with_days_remaining(42)
                .with_issuer("R3")
                .with_last_checked(Utc::now()),
        );
        let mut broken = DomainRecord::new("down.example".to_string(), None);
        broken.apply(
            RecordUpdate::new()
                .with_status(CertStatus::Error)
                .with_error(Some("Connection failed: refused".to_string())),
        );
        let fresh = DomainRecord::new("new.example".to_string(), None);

        let out = formatter().format_records(&[ok, broken, fresh]);

        assert!(out.contains("Tracked domains (3)"));
        assert!(out.contains("shop.example"));
        assert!(out.contains("   42"));
        assert!(out.contains("just now"));
        assert!(out.contains("prod"));
        assert!(out.contains("Connection failed: refused"));
        assert!(out.contains("3 domains: 1 valid, 1 error, 1 unknown"));
    }

    #[test]
    fn test_results_list() {
        let now = Utc::now();
        let info = CertificateInfo {
            issuer: "R3".to_string(),
            subject: None,
            valid_from: now - Duration::days(80),
            valid_to: now + Duration::days(3) - Duration::minutes(1),
        };
        let results = vec![
            CertificateResult::success(
                "a.example".to_string(),
                CertificateReading::new(info, now),
                now,
            ),
            CertificateResult::failure(
                "b.example".to_string(),
                InspectionError::Timeout("Connection to b.example timed out".to_string()),
                now,
            ),
        ];

        let out = formatter().format_results(&results);
        assert!(out.contains("Refreshed 2 domains"));
        assert!(out.contains("3 days"));
        assert!(out.contains("(R3)"));
        assert!(out.contains("Timeout: Connection to b.example timed out"));
        assert!(out.contains("2 domains: 1 expiring, 1 error"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
