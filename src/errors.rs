use ledger_persistence::PersistenceError;
use ledger_sync::{FetchError, SchedulerError};
use thiserror::Error;

/// Errores de arranque y parada del daemon.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Error de configuración: {0}")]
    Config(String),
    #[error("Error de persistencia: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Error de la fuente externa: {0}")]
    Source(#[from] FetchError),
    #[error("Error del scheduler: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("Error en IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Tarea abortada: {0}")]
    Join(#[from] tokio::task::JoinError),
}
