//! ledger-sync: ingesta paginada desde la fuente externa y planificación.
pub mod config;
pub mod error;
pub mod fetcher;
pub mod orchestrator;
pub mod scheduler;
pub mod stats;

pub use config::{SchedulerConfig, SourceConfig};
pub use error::{FetchError, SchedulerError, SyncError};
pub use fetcher::{HttpFetcher, PageMeta, RetryPolicy, SourceClient, SourcePage};
pub use orchestrator::{FullSyncRequest, SyncOrchestrator};
pub use scheduler::{FullSyncJob, RecalcJob, ScheduledJob, SyncScheduler};
pub use stats::{FullSyncStats, PageReport, StageReport, StreamStats};
