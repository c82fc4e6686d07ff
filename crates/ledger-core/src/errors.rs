//! Errores del core del ledger.
//!
//! `LedgerError` es el error común que devuelven los stores y los servicios
//! (appliers, lifecycle, recalc). Los backends concretos traducen sus errores
//! nativos a estas variantes (ver `ledger-persistence::error`).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("client {0} has no current version")]
    ClientNotFound(i64),
    #[error("check {0} not found")]
    CheckNotFound(i64),
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("concurrent update conflict (retryable)")]
    Conflict,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("storage: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Conflictos de concurrencia que el llamador puede reintentar.
    pub fn is_retryable(&self) -> bool { matches!(self, Self::Conflict) }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self { Self::Serialization(e.to_string()) }
}

/// Fallo al calcular el trigger hash de un registro.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("record is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("record is not a JSON object")]
    NotAnObject,
}

/// Motivo por el que un registro de una página se descarta sin abortar la página.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("missing id")]
    MissingId,
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("malformed record: {0}")]
    Malformed(String),
}

impl From<HashError> for SkipReason {
    fn from(e: HashError) -> Self { Self::Malformed(e.to_string()) }
}
