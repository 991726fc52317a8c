use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use super::types::{DomainRecord, RecordUpdate};
use crate::error::{CertwatchError, Result};
use crate::storage::{MemoryStorage, Storage};
use crate::validation::{normalize_domain, same_domain};

/// Authoritative, insertion-ordered set of tracked domains.
///
/// Every mutation goes through one write lock and is followed by a save to the
/// configured [`Storage`] while the lock is still held, so saves land in the
/// same order as mutations. When a save fails the in-memory change is kept and
/// the storage error is returned to the caller.
pub struct Registry {
    records: RwLock<Vec<DomainRecord>>,
    storage: Box<dyn Storage>,
}

impl Registry {
    /// Build a registry from whatever `storage` currently holds.
    ///
    /// Loaded keys are normalized and duplicates dropped (first one wins).
    pub fn open(storage: Box<dyn Storage>) -> Result<Self> {
        let loaded = storage.load()?;
        let total = loaded.len();

        let mut records: Vec<DomainRecord> = Vec::with_capacity(total);
        for mut record in loaded {
            match normalize_domain(&record.domain) {
                Ok(key) => record.domain = key,
                Err(e) => {
                    warn!(domain = %record.domain, error = %e, "Dropping stored record with invalid domain");
                    continue;
                }
            }
            if records.iter().any(|r| same_domain(&r.domain, &record.domain)) {
                warn!(domain = %record.domain, "Dropping duplicate stored record");
                continue;
            }
            records.push(record);
        }

        debug!(
            storage = %storage.describe(),
            loaded = total,
            kept = records.len(),
            "Registry opened"
        );

        Ok(Self {
            records: RwLock::new(records),
            storage,
        })
    }

    /// Registry backed by an in-process buffer. Never fails to save.
    pub fn in_memory() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            storage: Box::new(MemoryStorage::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<DomainRecord>> {
        match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Registry read lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<DomainRecord>> {
        match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Registry write lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn persist(&self, records: &[DomainRecord]) -> Result<()> {
        self.storage.save(records).map_err(|e| {
            warn!(storage = %self.storage.describe(), error = %e, "Failed to persist registry");
            e
        })
    }

    /// Snapshot of all records in insertion order.
    pub fn list(&self) -> Vec<DomainRecord> {
        self.read().clone()
    }

    /// Look up one record by (unnormalized) domain.
    pub fn get(&self, domain: &str) -> Option<DomainRecord> {
        let key = normalize_domain(domain).ok()?;
        self.read()
            .iter()
            .find(|r| same_domain(&r.domain, &key))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Track `domain` if it is not tracked yet.
    ///
    /// Returns `Ok(true)` when a record was created and `Ok(false)` when the
    /// domain already existed (its notes are left as they were).
    pub fn add(&self, domain: &str, notes: Option<&str>) -> Result<bool> {
        if domain.trim().is_empty() {
            return Err(CertwatchError::Validation("domain is required".to_string()));
        }
        let key = normalize_domain(domain)?;

        let mut records = self.write();
        if records.iter().any(|r| same_domain(&r.domain, &key)) {
            debug!(domain = %key, "Domain already tracked");
            return Ok(false);
        }

        records.push(DomainRecord::new(key.clone(), notes.map(str::to_string)));
        debug!(domain = %key, total = records.len(), "Domain added");
        self.persist(&records)?;
        Ok(true)
    }

    /// Stop tracking `domain`. Unknown domains are a no-op.
    pub fn remove(&self, domain: &str) -> Result<bool> {
        let Ok(key) = normalize_domain(domain) else {
            return Ok(false);
        };

        let mut records = self.write();
        let before = records.len();
        records.retain(|r| !same_domain(&r.domain, &key));
        if records.len() == before {
            return Ok(false);
        }

        debug!(domain = %key, remaining = records.len(), "Domain removed");
        self.persist(&records)?;
        Ok(true)
    }

    /// Drop every record. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut records = self.write();
        let removed = records.len();
        records.clear();
        debug!(removed, "Registry cleared");
        self.persist(&records)?;
        Ok(removed)
    }

    /// Overwrite the supplied inspection fields of `domain`'s record.
    ///
    /// Returns `Ok(false)` without touching storage when the domain is not
    /// tracked (for example because it was removed mid-refresh).
    pub fn merge(&self, domain: &str, update: RecordUpdate) -> Result<bool> {
        let Ok(key) = normalize_domain(domain) else {
            return Ok(false);
        };

        let mut records = self.write();
        let Some(record) = records.iter_mut().find(|r| same_domain(&r.domain, &key)) else {
            debug!(domain = %key, "Merge target no longer tracked");
            return Ok(false);
        };

        record.apply(update);
        self.persist(&records)?;
        Ok(true)
    }

    /// Explicitly edit the notes of a tracked domain.
    pub fn set_notes(&self, domain: &str, notes: Option<String>) -> Result<bool> {
        let Ok(key) = normalize_domain(domain) else {
            return Ok(false);
        };

        let mut records = self.write();
        let Some(record) = records.iter_mut().find(|r| same_domain(&r.domain, &key)) else {
            return Ok(false);
        };

        record.notes = notes;
        self.persist(&records)?;
        Ok(true)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("records", &self.len())
            .field("storage", &self.storage.describe())
            .finish()
    }
}
