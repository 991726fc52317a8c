//! TLS certificate inspection
//!
//! Connects to a domain, reads the leaf certificate and classifies it:
//! - more than 7 days left: valid
//! - 1 to 7 days left: expiring
//! - 0 or fewer: expired
//! - probe failure of any kind: error

mod client;
mod types;

pub use client::{
    parse_certificate_der, CertificateInspector, Inspect, DEFAULT_TIMEOUT, DEFAULT_TLS_PORT,
};
pub use types::{
    classify, days_remaining, CertificateInfo, CertificateReading, CertificateResult,
    InspectionError, InspectionOutcome, EXPIRING_THRESHOLD_DAYS,
};
