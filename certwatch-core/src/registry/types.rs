use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operational classification of a domain's certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertStatus {
    /// More than a week of validity left
    Valid,
    /// Expires within seven days
    Expiring,
    /// notAfter has passed
    Expired,
    /// The last probe failed
    Error,
    /// Never inspected
    #[default]
    Unknown,
}

impl CertStatus {
    pub const ALL: [CertStatus; 5] = [
        CertStatus::Valid,
        CertStatus::Expiring,
        CertStatus::Expired,
        CertStatus::Error,
        CertStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CertStatus::Valid => "valid",
            CertStatus::Expiring => "expiring",
            CertStatus::Expired => "expired",
            CertStatus::Error => "error",
            CertStatus::Unknown => "unknown",
        }
    }

    /// True when the domain needs an operator's attention.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            CertStatus::Expiring | CertStatus::Expired | CertStatus::Error
        )
    }
}

impl fmt::Display for CertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked domain.
///
/// Serialized with camelCase keys so existing `domains.json` files keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRecord {
    /// Normalized hostname, unique within the registry
    pub domain: String,
    /// Issuer common name of the last certificate seen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Certificate notBefore
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    /// Certificate notAfter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    /// Whole days left at the time of the last successful inspection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
    #[serde(default)]
    pub status: CertStatus,
    /// Completion time of the most recent inspection attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    /// Failure cause, only present while `status` is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Operator annotation; inspections never touch it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DomainRecord {
    /// Create a record that has not been inspected yet
    pub fn new(domain: String, notes: Option<String>) -> Self {
        Self {
            domain,
            issuer: None,
            valid_from: None,
            valid_to: None,
            days_remaining: None,
            status: CertStatus::Unknown,
            last_checked: None,
            error: None,
            notes,
        }
    }

    /// Overwrite the fields present in `update`, leaving everything else alone.
    pub fn apply(&mut self, update: RecordUpdate) {
        if let Some(issuer) = update.issuer {
            self.issuer = Some(issuer);
        }
        if let Some(valid_from) = update.valid_from {
            self.valid_from = Some(valid_from);
        }
        if let Some(valid_to) = update.valid_to {
            self.valid_to = Some(valid_to);
        }
        if let Some(days) = update.days_remaining {
            self.days_remaining = Some(days);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(last_checked) = update.last_checked {
            self.last_checked = Some(last_checked);
        }
        if let Some(error) = update.error {
            self.error = error;
        }
    }
}

/// Partial set of inspection fields to merge into a record.
///
/// `None` means "not supplied". `error` is doubly optional so a successful
/// inspection can clear a previous failure message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    pub issuer: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub days_remaining: Option<i64>,
    pub status: Option<CertStatus>,
    pub last_checked: Option<DateTime<Utc>>,
    pub error: Option<Option<String>>,
}

impl RecordUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: CertStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_days_remaining(mut self, days: i64) -> Self {
        self.days_remaining = Some(days);
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_last_checked(mut self, at: DateTime<Utc>) -> Self {
        self.last_checked = Some(at);
        self
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }
}
