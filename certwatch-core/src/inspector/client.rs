use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::{debug, instrument};
use x509_parser::prelude::*;

use super::types::{CertificateInfo, CertificateReading, CertificateResult, InspectionError};
use crate::validation::normalize_domain;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_TLS_PORT: u16 = 443;

const UNKNOWN_ISSUER: &str = "Unknown";

/// Anything that can turn a domain into a [`CertificateResult`].
///
/// Implementations must not fail: every problem is reported inside the result.
#[async_trait]
pub trait Inspect: Send + Sync {
    async fn inspect(&self, domain: &str) -> CertificateResult;
}

/// Live TLS probe that reads the peer's leaf certificate.
#[derive(Debug, Clone)]
pub struct CertificateInspector {
    timeout: Duration,
    port: u16,
}

impl Default for CertificateInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl CertificateInspector {
    /// Create a new CertificateInspector with default settings
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            port: DEFAULT_TLS_PORT,
        }
    }

    /// Set the budget for one probe: DNS resolution, TCP connect and TLS
    /// handshake together
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Probe a port other than 443
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Inspect the certificate served for `domain`.
    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn check(&self, domain: &str) -> CertificateResult {
        let host = match normalize_domain(domain) {
            Ok(host) => host,
            Err(e) => {
                return CertificateResult::failure(
                    domain.trim().to_lowercase(),
                    InspectionError::InvalidDomain(e.to_string()),
                    Utc::now(),
                );
            }
        };

        match self.fetch_certificate_info(&host).await {
            Ok(info) => {
                let now = Utc::now();
                let reading = CertificateReading::new(info, now);
                debug!(
                    days_remaining = reading.days_remaining,
                    status = %reading.status,
                    "Certificate inspected"
                );
                CertificateResult::success(host, reading, now)
            }
            Err(e) => {
                debug!(error = %e, "Certificate inspection failed");
                CertificateResult::failure(host, e, Utc::now())
            }
        }
    }

    /// Fetch the leaf certificate, bounded by a single deadline
    async fn fetch_certificate_info(
        &self,
        domain: &str,
    ) -> std::result::Result<CertificateInfo, InspectionError> {
        timeout(self.timeout, self.read_leaf_certificate(domain))
            .await
            .map_err(|_| {
                InspectionError::Timeout(format!(
                    "{} did not present a certificate within {}s",
                    domain,
                    self.timeout.as_secs_f64()
                ))
            })?
    }

    async fn read_leaf_certificate(
        &self,
        domain: &str,
    ) -> std::result::Result<CertificateInfo, InspectionError> {
        // Expired, self-signed and mismatched certificates must still be readable
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| InspectionError::Handshake(e.to_string()))?;

        let connector = tokio_native_tls::TlsConnector::from(connector);

        let addr = format!("{}:{}", domain, self.port);
        let addrs: Vec<SocketAddr> = lookup_host(&addr)
            .await
            .map_err(|e| InspectionError::Resolve(format!("{}: {}", domain, e)))?
            .collect();

        if addrs.is_empty() {
            return Err(InspectionError::Resolve(format!(
                "{}: no addresses found",
                domain
            )));
        }

        let stream = TcpStream::connect(&addrs[..])
            .await
            .map_err(|e| InspectionError::Connect(e.to_string()))?;

        let tls_stream = connector
            .connect(domain, stream)
            .await
            .map_err(|e| InspectionError::Handshake(e.to_string()))?;

        // Get the peer certificate
        let cert = tls_stream
            .get_ref()
            .peer_certificate()
            .map_err(|e| InspectionError::Parse(e.to_string()))?
            .ok_or_else(|| InspectionError::NoCertificate(domain.to_string()))?;

        let der = cert
            .to_der()
            .map_err(|e| InspectionError::Parse(e.to_string()))?;

        parse_certificate_der(&der)
    }
}

#[async_trait]
impl Inspect for CertificateInspector {
    async fn inspect(&self, domain: &str) -> CertificateResult {
        self.check(domain).await
    }
}

/// Extract issuer, subject and validity window from a DER-encoded certificate
pub fn parse_certificate_der(
    der: &[u8],
) -> std::result::Result<CertificateInfo, InspectionError> {
    let (_, cert) =
        parse_x509_certificate(der).map_err(|e| InspectionError::Parse(e.to_string()))?;

    let issuer = name_attribute(cert.issuer()).unwrap_or_else(|| UNKNOWN_ISSUER.to_string());
    let subject = name_attribute(cert.subject());

    let validity = cert.validity();
    let valid_from = asn1_time_to_utc(&validity.not_before)?;
    let valid_to = asn1_time_to_utc(&validity.not_after)?;

    Ok(CertificateInfo {
        issuer,
        subject,
        valid_from,
        valid_to,
    })
}

/// Common Name, falling back to Organization
fn name_attribute(name: &X509Name<'_>) -> Option<String> {
    name.iter_common_name()
        .next()
        .or_else(|| name.iter_organization().next())
        .and_then(|attr| attr.as_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn asn1_time_to_utc(time: &ASN1Time) -> std::result::Result<DateTime<Utc>, InspectionError> {
    DateTime::from_timestamp(time.timestamp(), 0).ok_or_else(|| {
        InspectionError::Parse(format!("certificate date out of range: {}", time))
    })
}
