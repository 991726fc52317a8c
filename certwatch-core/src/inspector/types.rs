use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::registry::{CertStatus, RecordUpdate};

/// A certificate with this many days left or fewer is reported as expiring.
pub const EXPIRING_THRESHOLD_DAYS: i64 = 7;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Whole days from `now` until `valid_to`, rounded up.
///
/// A certificate expiring in 36 hours has 2 days left; one that expired
/// 36 hours ago has -1.
pub fn days_remaining(valid_to: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (valid_to - now).num_milliseconds();
    let whole = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) > 0 {
        whole + 1
    } else {
        whole
    }
}

/// Map a day count onto valid / expiring / expired.
pub fn classify(days_remaining: i64) -> CertStatus {
    if days_remaining > EXPIRING_THRESHOLD_DAYS {
        CertStatus::Valid
    } else if days_remaining > 0 {
        CertStatus::Expiring
    } else {
        CertStatus::Expired
    }
}

/// Fields read from the leaf certificate, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateInfo {
    /// Issuer common name (or organization), "Unknown" if neither is present
    pub issuer: String,
    /// Subject common name, if any
    pub subject: Option<String>,
    /// notBefore
    pub valid_from: DateTime<Utc>,
    /// notAfter
    pub valid_to: DateTime<Utc>,
}

/// A successfully read and classified certificate.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateReading {
    pub issuer: String,
    pub subject: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub days_remaining: i64,
    pub status: CertStatus,
}

impl CertificateReading {
    /// Classify `info` relative to `now`.
    pub fn new(info: CertificateInfo, now: DateTime<Utc>) -> Self {
        let days = days_remaining(info.valid_to, now);
        Self {
            issuer: info.issuer,
            subject: info.subject,
            valid_from: info.valid_from,
            valid_to: info.valid_to,
            days_remaining: days,
            status: classify(days),
        }
    }
}

/// Why a probe did not yield a certificate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InspectionError {
    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    #[error("DNS resolution failed: {0}")]
    Resolve(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("No certificate presented by {0}")]
    NoCertificate(String),

    #[error("Certificate parsing failed: {0}")]
    Parse(String),

    #[error("Probe aborted: {0}")]
    Aborted(String),
}

/// Either a certificate reading or a typed failure, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum InspectionOutcome {
    Certificate(CertificateReading),
    Failed(InspectionError),
}

/// Result of inspecting one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateResult {
    /// Normalized domain that was probed
    pub domain: String,
    /// Completion time of the attempt
    pub checked_at: DateTime<Utc>,
    pub outcome: InspectionOutcome,
}

impl CertificateResult {
    pub fn success(domain: String, reading: CertificateReading, checked_at: DateTime<Utc>) -> Self {
        Self {
            domain,
            checked_at,
            outcome: InspectionOutcome::Certificate(reading),
        }
    }

    pub fn failure(domain: String, error: InspectionError, checked_at: DateTime<Utc>) -> Self {
        Self {
            domain,
            checked_at,
            outcome: InspectionOutcome::Failed(error),
        }
    }

    pub fn status(&self) -> CertStatus {
        match &self.outcome {
            InspectionOutcome::Certificate(reading) => reading.status,
            InspectionOutcome::Failed(_) => CertStatus::Error,
        }
    }

    pub fn reading(&self) -> Option<&CertificateReading> {
        match &self.outcome {
            InspectionOutcome::Certificate(reading) => Some(reading),
            InspectionOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&InspectionError> {
        match &self.outcome {
            InspectionOutcome::Certificate(_) => None,
            InspectionOutcome::Failed(error) => Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.reading().is_some()
    }

    /// Registry fields to merge for this result.
    ///
    /// A failure only sets status, error and lastChecked; the last known
    /// certificate fields stay on the record.
    pub fn to_update(&self) -> RecordUpdate {
        match &self.outcome {
            InspectionOutcome::Certificate(reading) => RecordUpdate {
                issuer: Some(reading.issuer.clone()),
                valid_from: Some(reading.valid_from),
                valid_to: Some(reading.valid_to),
                days_remaining: Some(reading.days_remaining),
                status: Some(reading.status),
                last_checked: Some(self.checked_at),
                error: Some(None),
            },
            InspectionOutcome::Failed(error) => RecordUpdate {
                status: Some(CertStatus::Error),
                last_checked: Some(self.checked_at),
                error: Some(Some(error.to_string())),
                ..RecordUpdate::default()
            },
        }
    }
}

/// Flat wire shape shared with `DomainRecord`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultView<'a> {
    domain: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    issuer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_to: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    days_remaining: Option<i64>,
    status: CertStatus,
    last_checked: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Serialize for CertificateResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let reading = self.reading();
        ResultView {
            domain: &self.domain,
            issuer: reading.map(|r| r.issuer.as_str()),
            valid_from: reading.map(|r| r.valid_from),
            valid_to: reading.map(|r| r.valid_to),
            days_remaining: reading.map(|r| r.days_remaining),
            status: self.status(),
            last_checked: self.checked_at,
            error: self.error().map(|e| e.to_string()),
        }
        .serialize(serializer)
    }
}
