use std::path::PathBuf;
use std::time::Duration;

use crate::inspector::{CertificateInspector, DEFAULT_TIMEOUT, DEFAULT_TLS_PORT};
use crate::refresh::{RefreshOrchestrator, DEFAULT_CONCURRENCY};
use crate::storage::StorageBackend;

/// Default store file, relative to the working directory.
pub const DEFAULT_STORE_FILE: &str = "domains.json";

/// Runtime knobs for a [`crate::CertWatch`] instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub storage: StorageBackend,
    /// Budget for a whole probe (DNS, connect and handshake)
    pub timeout: Duration,
    /// Maximum probes in flight during a refresh pass
    pub concurrency: usize,
    /// Pause before each probe
    pub probe_delay: Duration,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage: StorageBackend::JsonFile(PathBuf::from(DEFAULT_STORE_FILE)),
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            probe_delay: Duration::ZERO,
            port: DEFAULT_TLS_PORT,
        }
    }
}

impl Settings {
    /// Settings that never touch the filesystem.
    pub fn in_memory() -> Self {
        Self {
            storage: StorageBackend::Memory,
            ..Self::default()
        }
    }

    pub fn with_storage(mut self, storage: StorageBackend) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub fn inspector(&self) -> CertificateInspector {
        CertificateInspector::new()
            .with_timeout(self.timeout)
            .with_port(self.port)
    }

    pub fn orchestrator(&self) -> RefreshOrchestrator {
        RefreshOrchestrator::with_inspector(self.inspector())
            .with_concurrency(self.concurrency)
            .with_probe_delay(self.probe_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(
            settings.storage,
            StorageBackend::JsonFile(PathBuf::from("domains.json"))
        );
        assert_eq!(settings.timeout, Duration::from_secs(10));
        assert_eq!(settings.concurrency, 5);
        assert_eq!(settings.port, 443);
    }

    #[test]
    fn test_concurrency_floor() {
        let settings = Settings::in_memory().with_concurrency(0);
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.orchestrator().concurrency(), 1);
    }

    #[test]
    fn test_orchestrator_carries_timeout() {
        let settings = Settings::in_memory().with_timeout(Duration::from_secs(3));
        assert_eq!(
            settings.orchestrator().inspector().timeout(),
            Duration::from_secs(3)
        );
    }
}
