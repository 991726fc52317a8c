mod orchestrator;

pub use orchestrator::{ProgressCallback, RefreshOrchestrator, DEFAULT_CONCURRENCY};
