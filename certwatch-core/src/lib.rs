pub mod colors;
pub mod config;
pub mod error;
pub mod inspector;
pub mod output;
pub mod reconcile;
pub mod refresh;
pub mod registry;
pub mod service;
pub mod storage;
pub mod tabular;
pub mod validation;

pub use config::Settings;
pub use error::{CertwatchError, Result};
pub use validation::normalize_domain;

pub use inspector::{
    CertificateInspector, CertificateReading, CertificateResult, Inspect, InspectionError,
};
pub use reconcile::{ImportReport, ImportRow, Reconciler};
pub use refresh::{ProgressCallback, RefreshOrchestrator};
pub use registry::{CertStatus, DomainRecord, RecordUpdate, Registry};
pub use service::{AddRequest, CertWatch, Removal, RemoveRequest};
pub use storage::{JsonFileStorage, MemoryStorage, Storage, StorageBackend};

pub use output::{OutputFormat, OutputFormatter};
