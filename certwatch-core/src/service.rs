//! Request-level facade over the registry, refresh and import machinery.

use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{CertwatchError, Result};
use crate::inspector::{CertificateInspector, CertificateResult, Inspect};
use crate::reconcile::{ImportReport, ImportRow, Reconciler};
use crate::refresh::{ProgressCallback, RefreshOrchestrator};
use crate::registry::{DomainRecord, Registry};
use crate::tabular;

/// Add a domain, optionally with notes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddRequest {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Remove one domain, or everything when `clearAll` is set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoveRequest {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default, rename = "clearAll")]
    pub clear_all: bool,
}

/// What a remove request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    NotTracked,
    Cleared(usize),
}

pub struct CertWatch<I = CertificateInspector> {
    registry: Arc<Registry>,
    orchestrator: RefreshOrchestrator<I>,
    reconciler: Reconciler<I>,
}

impl<I> Clone for CertWatch<I> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            orchestrator: self.orchestrator.clone(),
            reconciler: self.reconciler.clone(),
        }
    }
}

impl CertWatch<CertificateInspector> {
    /// Open the configured store and wire up a live inspector.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let storage = settings.storage.open();
        info!(storage = %storage.describe(), "Opening domain store");
        let registry = Registry::open(storage)?;
        Ok(Self::new(Arc::new(registry), settings.orchestrator()))
    }
}

impl<I: Inspect> CertWatch<I> {
    pub fn new(registry: Arc<Registry>, orchestrator: RefreshOrchestrator<I>) -> Self {
        let reconciler = Reconciler::new(orchestrator.clone());
        Self {
            registry,
            orchestrator,
            reconciler,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn list(&self) -> Vec<DomainRecord> {
        self.registry.list()
    }

    /// Returns `true` when a new record was created.
    pub fn add(&self, request: &AddRequest) -> Result<bool> {
        let domain = request
            .domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| CertwatchError::Validation("domain is required".to_string()))?;

        self.registry.add(domain, request.notes.as_deref())
    }

    pub fn remove(&self, request: &RemoveRequest) -> Result<Removal> {
        if request.clear_all {
            return Ok(Removal::Cleared(self.registry.clear()?));
        }

        let domain = request
            .domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                CertwatchError::Validation("either domain or clearAll is required".to_string())
            })?;

        if self.registry.remove(domain)? {
            Ok(Removal::Removed)
        } else {
            Ok(Removal::NotTracked)
        }
    }

    pub fn set_notes(&self, domain: &str, notes: Option<String>) -> Result<bool> {
        self.registry.set_notes(domain, notes)
    }

    pub async fn refresh(&self) -> Result<Vec<CertificateResult>> {
        self.orchestrator.refresh_all(&self.registry).await
    }

    pub async fn refresh_with(
        &self,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CertificateResult>> {
        self.orchestrator
            .refresh_with(&self.registry, progress, cancel)
            .await
    }

    pub async fn import(&self, rows: &[ImportRow]) -> Result<ImportReport> {
        self.reconciler.import_records(&self.registry, rows).await
    }

    pub async fn import_with(
        &self,
        rows: &[ImportRow],
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ImportReport> {
        self.reconciler
            .import_records_with(&self.registry, rows, progress, cancel)
            .await
    }

    /// Parse CSV or plain-list content and import it.
    pub async fn import_csv(&self, content: &str) -> Result<ImportReport> {
        let rows = tabular::parse_import(content)?;
        debug!(rows = rows.len(), "Parsed import content");
        self.import(&rows).await
    }

    pub fn export_csv(&self) -> Result<String> {
        tabular::export_csv(&self.registry.list())
    }
}
