use super::OutputFormatter;
use crate::inspector::CertificateResult;
use crate::reconcile::ImportReport;
use crate::registry::DomainRecord;

pub struct JsonFormatter {
    pretty: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    fn to_json<T: serde::Serialize + ?Sized>(&self, value: &T) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value)
                .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        } else {
            serde_json::to_string(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_records(&self, records: &[DomainRecord]) -> String {
        self.to_json(records)
    }

    fn format_results(&self, results: &[CertificateResult]) -> String {
        self.to_json(results)
    }

    fn format_import(&self, report: &ImportReport) -> String {
        self.to_json(report)
    }
}
