//! Bulk registration of externally supplied `(domain, notes)` rows.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{CertwatchError, Result};
use crate::inspector::{CertificateInspector, CertificateResult, Inspect};
use crate::refresh::{ProgressCallback, RefreshOrchestrator};
use crate::registry::Registry;

/// One imported row. `notes` is `None` when the source had no notes column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub domain: String,
    pub notes: Option<String>,
}

impl ImportRow {
    pub fn new(domain: impl Into<String>, notes: Option<&str>) -> Self {
        Self {
            domain: domain.into(),
            notes: notes.map(str::to_string),
        }
    }
}

/// What an import did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Rows with a non-empty domain, including domains that were already tracked
    pub imported: usize,
    /// Records actually created by this import
    pub created: usize,
    /// `(domain, reason)` for counted rows whose domain is not a hostname
    pub rejected: Vec<(String, String)>,
    /// Outcome of the refresh pass that follows the import
    pub results: Vec<CertificateResult>,
}

/// Registers rows with first-write-wins notes, then refreshes everything once.
pub struct Reconciler<I = CertificateInspector> {
    orchestrator: RefreshOrchestrator<I>,
}

impl<I> Clone for Reconciler<I> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
        }
    }
}

impl<I: Inspect> Reconciler<I> {
    pub fn new(orchestrator: RefreshOrchestrator<I>) -> Self {
        Self { orchestrator }
    }

    pub async fn import_records(
        &self,
        registry: &Registry,
        rows: &[ImportRow],
    ) -> Result<ImportReport> {
        self.import_records_with(registry, rows, None, &CancellationToken::new())
            .await
    }

    /// Add every row, then run one refresh pass over the whole registry.
    ///
    /// Every row with a non-empty domain is counted. Blank domains are skipped
    /// silently. A domain that cannot be a hostname is counted but only listed in
    /// `rejected`. Storage failures abort the import.
    pub async fn import_records_with(
        &self,
        registry: &Registry,
        rows: &[ImportRow],
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ImportReport> {
        let mut imported = 0;
        let mut created = 0;
        let mut rejected = Vec::new();

        for row in rows {
            let domain = row.domain.trim();
            if domain.is_empty() {
                continue;
            }

            imported += 1;
            match registry.add(domain, row.notes.as_deref()) {
                Ok(true) => created += 1,
                Ok(false) => {}
                Err(CertwatchError::InvalidDomain(reason)) => {
                    warn!(domain = %domain, "Skipping import row with invalid domain");
                    rejected.push((domain.to_string(), reason));
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            imported,
            created,
            rejected = rejected.len(),
            "Import rows registered"
        );

        let results = self
            .orchestrator
            .refresh_with(registry, progress, cancel)
            .await?;

        Ok(ImportReport {
            imported,
            created,
            rejected,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::InspectionError;
    use crate::registry::{CertStatus, DomainRecord};
    use crate::storage::Storage;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Every probe fails, and each call is counted.
    #[derive(Default)]
    struct UnreachableInspector {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Inspect for UnreachableInspector {
        async fn inspect(&self, domain: &str) -> CertificateResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            CertificateResult::failure(
                domain.to_string(),
                InspectionError::Resolve(format!("{domain}: no addresses found")),
                Utc::now(),
            )
        }
    }

    fn reconciler() -> Reconciler<UnreachableInspector> {
        Reconciler::new(RefreshOrchestrator::with_inspector(
            UnreachableInspector::default(),
        ))
    }

    #[tokio::test]
    async fn test_first_write_wins_on_notes() {
        let registry = Registry::in_memory();
        let rows = vec![
            ImportRow::new("a.example", Some("first")),
            ImportRow::new("a.example", Some("second")),
        ];

        let report = reconciler().import_records(&registry, &rows).await.unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.created, 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("a.example").unwrap().notes.as_deref(),
            Some("first")
        );
    }

    #[tokio::test]
    async fn test_existing_notes_survive_import() {
        let registry = Registry::in_memory();
        registry.add("a.example", Some("prod")).unwrap();

        let report = reconciler()
            .import_records(&registry, &[ImportRow::new("A.Example", Some("staging"))])
            .await
            .unwrap();

        assert_eq!(report.imported, 1);
        assert_eq!(report.created, 0);
        assert_eq!(
            registry.get("a.example").unwrap().notes.as_deref(),
            Some("prod")
        );
    }

    #[tokio::test]
    async fn test_import_triggers_refresh() {
        let registry = Registry::in_memory();
        let reconciler = reconciler();

        let report = reconciler
            .import_records(&registry, &[ImportRow::new("shop.example", Some(""))])
            .await
            .unwrap();

        assert_eq!(report.imported, 1);
        assert_eq!(report.results.len(), 1);
        assert_eq!(
            reconciler.orchestrator.inspector().calls.load(Ordering::SeqCst),
            1
        );

        let record = registry.get("shop.example").unwrap();
        assert_eq!(record.notes.as_deref(), Some(""));
        assert!(record.last_checked.is_some());
        assert_eq!(record.status, CertStatus::Error);
        assert!(record.error.is_some());
    }

    #[tokio::test]
    async fn test_blank_rows_are_not_counted_but_malformed_rows_are() {
        let registry = Registry::in_memory();
        let rows = vec![
            ImportRow::new("", Some("orphan")),
            ImportRow::new("   ", None),
            ImportRow::new("bad domain!", None),
            ImportRow::new("ok.example", None),
        ];

        let report = reconciler().import_records(&registry, &rows).await.unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.created, 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, "bad domain!");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_single_label_and_fqdn_rows_are_tracked() {
        let registry = Registry::in_memory();
        let rows = vec![
            ImportRow::new("intranet", Some("n")),
            ImportRow::new("a.example", None),
            ImportRow::new("a.example.", None),
        ];

        let report = reconciler().import_records(&registry, &rows).await.unwrap();

        assert_eq!(report.imported, 3);
        assert_eq!(report.created, 2);
        assert!(report.rejected.is_empty());
        assert_eq!(registry.get("intranet").unwrap().notes.as_deref(), Some("n"));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_import_still_refreshes_existing() {
        let registry = Registry::in_memory();
        registry.add("old.example", None).unwrap();

        let report = reconciler().import_records(&registry, &[]).await.unwrap();

        assert_eq!(report.imported, 0);
        assert_eq!(report.results.len(), 1);
        assert!(registry.get("old.example").unwrap().last_checked.is_some());
    }

    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn load(&self) -> Result<Vec<DomainRecord>> {
            Ok(Vec::new())
        }

        fn save(&self, _records: &[DomainRecord]) -> Result<()> {
            Err(CertwatchError::Storage("disk full".to_string()))
        }

        fn describe(&self) -> String {
            "broken".to_string()
        }
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_import() {
        let registry = Registry::open(Box::new(BrokenStorage)).unwrap();
        let reconciler = reconciler();

        let err = reconciler
            .import_records(&registry, &[ImportRow::new("a.example", None)])
            .await
            .unwrap_err();

        assert!(err.is_storage());
        assert_eq!(
            reconciler.orchestrator.inspector().calls.load(Ordering::SeqCst),
            0
        );
    }
}
