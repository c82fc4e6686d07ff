//! Aplicación de páginas de registros sobre el ledger.
//!
//! Cada registro produce un `RecordResult`: un resultado de aplicación o un
//! motivo de descarte. Los descartes no abortan la página y se cuentan como
//! `dropped` en el reporte. Un error del store sí aborta (y revierte) la
//! página completa.

pub mod client;
pub mod contract;

use serde::{Deserialize, Serialize};

use crate::errors::SkipReason;

pub use client::{ClientVersionApplier, PreparedClient};
pub use contract::{ContractApplier, PreparedContract};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    Created,
    Updated,
    Unchanged,
}

pub type RecordResult = Result<ApplyOutcome, SkipReason>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    /// Posición del registro dentro de la página.
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub dropped: u64,
    pub skipped: Vec<SkippedRecord>,
}

impl ApplyReport {
    pub fn record(&mut self, index: usize, result: &RecordResult) {
        match result {
            Ok(ApplyOutcome::Created) => self.created += 1,
            Ok(ApplyOutcome::Updated) => self.updated += 1,
            Ok(ApplyOutcome::Unchanged) => self.unchanged += 1,
            Err(reason) => {
                self.dropped += 1;
                self.skipped.push(SkippedRecord { index, reason: reason.to_string() });
            }
        }
    }

    /// Registros aplicados (creados + actualizados + sin cambios).
    pub fn applied(&self) -> u64 { self.created + self.updated + self.unchanged }

    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a RecordResult>) -> Self {
        let mut report = Self::default();
        for (i, r) in results.into_iter().enumerate() {
            report.record(i, r);
        }
        report
    }
}
