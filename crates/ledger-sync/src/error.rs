//! Errores de la capa de sincronización.

use ledger_core::{LedgerError, SourceKind};
use thiserror::Error;

use crate::stats::FullSyncStats;

/// Fallo al obtener una página de la fuente externa.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("cannot decode page: {0}")]
    Decode(String),
    #[error("source configuration: {0}")]
    Config(String),
}

impl FetchError {
    /// Errores de transporte y 429/502/503/504 se reintentan; el resto falla de inmediato.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { code, .. } => matches!(code, 429 | 502 | 503 | 504),
            Self::Decode(_) | Self::Config(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("{kind} page {page} failed: {source}")]
    PageFailed {
        kind: SourceKind,
        page: i64,
        /// Totales de las páginas ya confirmadas.
        stats: Box<FullSyncStats>,
        #[source]
        source: Box<SyncError>,
    },
    #[error("full sync cancelled")]
    Cancelled { stats: Box<FullSyncStats> },
}

impl SyncError {
    /// Estadísticas parciales si la sincronización completa se interrumpió.
    pub fn partial_stats(&self) -> Option<&FullSyncStats> {
        match self {
            Self::PageFailed { stats, .. } | Self::Cancelled { stats } => Some(stats.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
    #[error("job '{0}' already registered")]
    DuplicateJob(String),
    #[error(transparent)]
    Job(#[from] SyncError),
    #[error("job task aborted: {0}")]
    Join(String),
}

impl From<LedgerError> for SchedulerError {
    fn from(e: LedgerError) -> Self { Self::Job(SyncError::Ledger(e)) }
}

impl From<tokio::task::JoinError> for SchedulerError {
    fn from(e: tokio::task::JoinError) -> Self { Self::Join(e.to_string()) }
}
