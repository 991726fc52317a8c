use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{CertwatchError, Result};
use crate::inspector::{CertificateInspector, CertificateResult, Inspect, InspectionError};
use crate::registry::Registry;

pub const DEFAULT_CONCURRENCY: usize = 5;

/// Called after each merge with `(completed, total, domain)`.
pub type ProgressCallback = Box<dyn Fn(usize, usize, &str) + Send + Sync>;

/// Runs one inspection per tracked domain and merges the results back.
///
/// Probes run on a bounded pool (`concurrency` of 1 is strictly sequential).
/// Merges happen one at a time from the collecting loop, and results are
/// slotted by snapshot index so the returned order never depends on which
/// probe finished first.
pub struct RefreshOrchestrator<I = CertificateInspector> {
    inspector: Arc<I>,
    concurrency: usize,
    probe_delay: Duration,
}

impl<I> Clone for RefreshOrchestrator<I> {
    fn clone(&self) -> Self {
        Self {
            inspector: self.inspector.clone(),
            concurrency: self.concurrency,
            probe_delay: self.probe_delay,
        }
    }
}

impl Default for RefreshOrchestrator<CertificateInspector> {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshOrchestrator<CertificateInspector> {
    pub fn new() -> Self {
        Self::with_inspector(CertificateInspector::new())
    }
}

impl<I: Inspect> RefreshOrchestrator<I> {
    pub fn with_inspector(inspector: I) -> Self {
        Self {
            inspector: Arc::new(inspector),
            concurrency: DEFAULT_CONCURRENCY,
            probe_delay: Duration::ZERO,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Pause before each probe to spread load on remote hosts
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn inspector(&self) -> &I {
        &self.inspector
    }

    /// Inspect every tracked domain once.
    pub async fn refresh_all(&self, registry: &Registry) -> Result<Vec<CertificateResult>> {
        self.refresh_with(registry, None, &CancellationToken::new())
            .await
    }

    /// Inspect every tracked domain once, reporting progress and honoring `cancel`.
    ///
    /// On cancellation the in-flight probes are dropped, results merged so far
    /// stay in the registry and `CertwatchError::Cancelled` is returned. A
    /// storage failure while merging aborts the pass with that error.
    pub async fn refresh_with(
        &self,
        registry: &Registry,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CertificateResult>> {
        let snapshot: Vec<String> = registry.list().into_iter().map(|r| r.domain).collect();
        let total = snapshot.len();

        debug!(
            total = total,
            concurrency = self.concurrency,
            "Starting refresh pass"
        );

        let mut slots: Vec<Option<CertificateResult>> = (0..total).map(|_| None).collect();
        let probe_delay = self.probe_delay;
        let inspector = &self.inspector;

        let mut probes = pin!(stream::iter(snapshot.iter().enumerate())
            .map(|(index, domain)| async move {
                if !probe_delay.is_zero() {
                    sleep(probe_delay).await;
                }

                // A panicking probe becomes an error result for its domain only
                let result = match AssertUnwindSafe(inspector.inspect(domain))
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(domain = %domain, "Probe panicked");
                        CertificateResult::failure(
                            domain.clone(),
                            InspectionError::Aborted("probe panicked".to_string()),
                            Utc::now(),
                        )
                    }
                };
                (index, result)
            })
            .buffer_unordered(self.concurrency));

        let mut completed = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(completed, total, "Refresh pass cancelled");
                    return Err(CertwatchError::Cancelled { completed, total });
                }
                next = probes.next() => next,
            };

            let Some((index, result)) = next else {
                break;
            };

            let domain = &snapshot[index];
            if !result.is_success() {
                debug!(domain = %domain, status = %result.status(), "Probe failed");
            }
            registry.merge(domain, result.to_update())?;

            completed += 1;
            if let Some(progress) = progress.as_ref() {
                progress(completed, total, domain);
            }
            slots[index] = Some(result);
        }

        debug!(total, "Refresh pass complete");
        Ok(slots.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::{CertificateInfo, CertificateReading};
    use crate::registry::CertStatus;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Inspector returning canned outcomes, optionally slowed per domain.
    #[derive(Default)]
    struct StubInspector {
        days: HashMap<String, i64>,
        delays_ms: HashMap<String, u64>,
        panics: Vec<String>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl StubInspector {
        fn with_days(mut self, domain: &str, days: i64) -> Self {
            self.days.insert(domain.to_string(), days);
            self
        }

        fn with_delay(mut self, domain: &str, ms: u64) -> Self {
            self.delays_ms.insert(domain.to_string(), ms);
            self
        }

        fn with_panic(mut self, domain: &str) -> Self {
            self.panics.push(domain.to_string());
            self
        }
    }

    #[async_trait]
    impl Inspect for StubInspector {
        async fn inspect(&self, domain: &str) -> CertificateResult {
            self.calls.lock().unwrap().push(domain.to_string());
            let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

            if let Some(ms) = self.delays_ms.get(domain) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.panics.iter().any(|d| d == domain) {
                panic!("stub probe exploded");
            }

            let now = Utc::now();
            match self.days.get(domain) {
                Some(days) => {
                    let info = CertificateInfo {
                        issuer: "Stub CA".to_string(),
                        subject: Some(domain.to_string()),
                        valid_from: now - ChronoDuration::days(30),
                        valid_to: now + ChronoDuration::days(*days) - ChronoDuration::minutes(1),
                    };
                    CertificateResult::success(
                        domain.to_string(),
                        CertificateReading::new(info, now),
                        now,
                    )
                }
                None => CertificateResult::failure(
                    domain.to_string(),
                    InspectionError::Connect("connection refused".to_string()),
                    now,
                ),
            }
        }
    }

    fn registry_with(domains: &[&str]) -> Registry {
        let registry = Registry::in_memory();
        for d in domains {
            registry.add(d, Some("prod")).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_one_failure_does_not_shorten_or_reorder() {
        let registry = registry_with(&["a.example", "b.example", "c.example"]);
        let stub = StubInspector::default()
            .with_days("a.example", 90)
            .with_days("c.example", 3);
        let orchestrator = RefreshOrchestrator::with_inspector(stub);

        let results = orchestrator.refresh_all(&registry).await.unwrap();

        let domains: Vec<&str> = results.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(domains, vec!["a.example", "b.example", "c.example"]);
        assert_eq!(results[0].status(), CertStatus::Valid);
        assert_eq!(results[1].status(), CertStatus::Error);
        assert!(!results[1].error().unwrap().to_string().is_empty());
        assert_eq!(results[2].status(), CertStatus::Expiring);
    }

    #[tokio::test]
    async fn test_results_are_merged_into_registry() {
        let registry = registry_with(&["a.example", "b.example"]);
        let stub = StubInspector::default().with_days("a.example", 90);
        let orchestrator = RefreshOrchestrator::with_inspector(stub);

        orchestrator.refresh_all(&registry).await.unwrap();

        let a = registry.get("a.example").unwrap();
        assert_eq!(a.status, CertStatus::Valid);
        assert_eq!(a.issuer.as_deref(), Some("Stub CA"));
        assert_eq!(a.days_remaining, Some(90));
        assert!(a.last_checked.is_some());
        assert!(a.error.is_none());
        assert_eq!(a.notes.as_deref(), Some("prod"));

        let b = registry.get("b.example").unwrap();
        assert_eq!(b.status, CertStatus::Error);
        assert!(b.error.is_some());
        assert!(b.last_checked.is_some());
        assert_eq!(b.notes.as_deref(), Some("prod"));
    }

    #[tokio::test]
    async fn test_order_preserved_when_completion_order_differs() {
        let registry = registry_with(&["slow.example", "medium.example", "fast.example"]);
        let stub = StubInspector::default()
            .with_days("slow.example", 10)
            .with_days("medium.example", 20)
            .with_days("fast.example", 30)
            .with_delay("slow.example", 150)
            .with_delay("medium.example", 75);
        let orchestrator = RefreshOrchestrator::with_inspector(stub).with_concurrency(3);

        let results = orchestrator.refresh_all(&registry).await.unwrap();

        let days: Vec<i64> = results
            .iter()
            .map(|r| r.reading().unwrap().days_remaining)
            .collect();
        assert_eq!(days, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let domains: Vec<String> = (0..8).map(|i| format!("host{}.example", i)).collect();
        let refs: Vec<&str> = domains.iter().map(String::as_str).collect();
        let registry = registry_with(&refs);

        let mut stub = StubInspector::default();
        for d in &domains {
            stub = stub.with_days(d, 30).with_delay(d, 20);
        }
        let orchestrator = RefreshOrchestrator::with_inspector(stub).with_concurrency(2);

        let results = orchestrator.refresh_all(&registry).await.unwrap();
        assert_eq!(results.len(), 8);
        assert!(orchestrator.inspector().max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_sequential_pass_probes_in_snapshot_order() {
        let registry = registry_with(&["c.example", "a.example", "b.example"]);
        let orchestrator =
            RefreshOrchestrator::with_inspector(StubInspector::default()).with_concurrency(1);

        orchestrator.refresh_all(&registry).await.unwrap();

        let calls = orchestrator.inspector().calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["c.example", "a.example", "b.example"]);
    }

    #[tokio::test]
    async fn test_panicking_probe_is_isolated() {
        let registry = registry_with(&["a.example", "boom.example", "c.example"]);
        let stub = StubInspector::default()
            .with_days("a.example", 30)
            .with_days("c.example", 30)
            .with_panic("boom.example");
        let orchestrator = RefreshOrchestrator::with_inspector(stub);

        let results = orchestrator.refresh_all(&registry).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[1].status(), CertStatus::Error);
        assert!(matches!(results[1].error(), Some(InspectionError::Aborted(_))));
        assert_eq!(results[2].status(), CertStatus::Valid);
    }

    #[tokio::test]
    async fn test_empty_registry_yields_no_results() {
        let registry = Registry::in_memory();
        let orchestrator = RefreshOrchestrator::with_inspector(StubInspector::default());

        let results = orchestrator.refresh_all(&registry).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_progress_callback_counts_every_domain() {
        let registry = registry_with(&["a.example", "b.example", "c.example"]);
        let orchestrator = RefreshOrchestrator::with_inspector(StubInspector::default());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let callback: ProgressCallback = Box::new(move |done, total, domain| {
            seen_clone.lock().unwrap().push((done, total, domain.to_string()));
        });

        orchestrator
            .refresh_with(&registry, Some(callback), &CancellationToken::new())
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen.last().unwrap().0, 3);
        assert!(seen.iter().all(|(_, total, _)| *total == 3));
    }

    #[tokio::test]
    async fn test_cancellation_keeps_merged_results() {
        let registry = registry_with(&["fast.example", "slow.example"]);
        let stub = StubInspector::default()
            .with_days("fast.example", 30)
            .with_days("slow.example", 30)
            .with_delay("slow.example", 5_000);
        let orchestrator = RefreshOrchestrator::with_inspector(stub).with_concurrency(1);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let callback: ProgressCallback = Box::new(move |done, _, _| {
            if done == 1 {
                trigger.cancel();
            }
        });

        let err = orchestrator
            .refresh_with(&registry, Some(callback), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CertwatchError::Cancelled {
                completed: 1,
                total: 2
            }
        ));
        assert_eq!(registry.get("fast.example").unwrap().status, CertStatus::Valid);
        let slow = registry.get("slow.example").unwrap();
        assert_eq!(slow.status, CertStatus::Unknown);
        assert!(slow.last_checked.is_none());
    }

    #[tokio::test]
    async fn test_domain_removed_mid_pass_is_skipped() {
        let registry = Arc::new(registry_with(&["a.example", "b.example"]));
        let stub = StubInspector::default()
            .with_days("a.example", 30)
            .with_days("b.example", 30);
        let orchestrator = RefreshOrchestrator::with_inspector(stub).with_concurrency(1);

        let reg = registry.clone();
        let callback: ProgressCallback = Box::new(move |done, _, _| {
            if done == 1 {
                reg.remove("b.example").unwrap();
            }
        });

        let results = orchestrator
            .refresh_with(&registry, Some(callback), &CancellationToken::new())
            .await
            .unwrap();

        // The pass still reports both snapshot entries
        assert_eq!(results.len(), 2);
        assert!(registry.get("b.example").is_none());
        assert_eq!(registry.len(), 1);
    }
}
