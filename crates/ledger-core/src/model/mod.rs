//! Tipos de dominio del ledger: versiones de cliente (SCD2), versiones de la
//! segunda parte, checks de verificación, contratos y registros de staging.

mod actor;
mod check;
mod client;
mod contract;
mod second_part;
mod staging;

pub use actor::ActorId;
pub use check::{CheckStatus, NewCheck, SecondPartCheck};
pub use client::{ChangeStatus, ClientFields, ClientVersion};
pub use contract::{Contract, ContractFields, NewContract};
pub use second_part::{SecondPartStatus, SecondPartVersion};
pub use staging::{SourceKind, StagingRecord};

/// Error al parsear un enum de dominio desde su forma textual.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} value '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}
