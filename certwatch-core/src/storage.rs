//! Persistence backends for the registry.
//!
//! The registry loads once from a [`Storage`] at construction and saves the
//! full record list after every mutation. Two interchangeable backends exist:
//! a JSON file (durable) and an in-process buffer (lost at exit).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CertwatchError, Result};
use crate::registry::DomainRecord;

/// Load/save contract used by the registry.
pub trait Storage: Send + Sync {
    /// Read every persisted record, in stored order.
    fn load(&self) -> Result<Vec<DomainRecord>>;

    /// Replace the persisted records with `records`.
    fn save(&self, records: &[DomainRecord]) -> Result<()>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Ephemeral backend holding records for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    buffer: Mutex<Vec<DomainRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the buffer, as if these records had been saved earlier.
    pub fn with_records(records: Vec<DomainRecord>) -> Self {
        Self {
            buffer: Mutex::new(records),
        }
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Vec<DomainRecord>> {
        let buffer = match self.buffer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(buffer.clone())
    }

    fn save(&self, records: &[DomainRecord]) -> Result<()> {
        let mut buffer = match self.buffer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *buffer = records.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

/// On-disk layout: `{"domains": [...]}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    domains: Vec<DomainRecord>,
}

/// Durable backend writing a pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<Vec<DomainRecord>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Store file missing, starting empty");
            return Ok(Vec::new());
        }

        let json = std::fs::read_to_string(&self.path)?;
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }

        let file: StoreFile = serde_json::from_str(&json).map_err(|e| {
            CertwatchError::Storage(format!("{} is not a valid store: {}", self.path.display(), e))
        })?;
        debug!(path = %self.path.display(), count = file.domains.len(), "Loaded store");
        Ok(file.domains)
    }

    fn save(&self, records: &[DomainRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = StoreFile {
            domains: records.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        // Write-then-rename so a crash never leaves a truncated store
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to replace store file");
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Backend selection made once at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    JsonFile(PathBuf),
}

impl StorageBackend {
    pub fn open(&self) -> Box<dyn Storage> {
        match self {
            StorageBackend::Memory => Box::new(MemoryStorage::new()),
            StorageBackend::JsonFile(path) => Box::new(JsonFileStorage::new(path.clone())),
        }
    }
}
