//! Applier SCD2 de clientes.
//!
//! Por registro:
//! - sin versión actual → versión 1 (`needs_second_part = true`).
//! - mismo trigger hash → sin escritura (`Unchanged`).
//! - hash distinto → cierra la actual e inserta `version + 1`, conservando
//!   `second_part_created` y marcando `needs_second_part = true`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use rayon::prelude::*;
use serde_json::Value;

use super::{ApplyOutcome, ApplyReport, RecordResult};
use crate::errors::{LedgerError, SkipReason};
use crate::hashing::{extract_external_risk_level, trigger_hash_of};
use crate::model::{ChangeStatus, ClientFields, ClientVersion};
use crate::record::{extract_external_id, RawRecord};
use crate::store::{LedgerStore, LedgerTx};

/// Registro validado y hasheado, listo para escribirse.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedClient {
    pub client_id: i64,
    pub trigger_hash: String,
    pub external_risk_level: String,
    pub fields: ClientFields,
    pub raw: Value,
}

impl PreparedClient {
    pub fn prepare(raw: &RawRecord) -> Result<Self, SkipReason> {
        let doc = raw.to_object()?;
        let client_id = extract_external_id(&doc)?;
        Ok(Self { client_id,
                  trigger_hash: trigger_hash_of(&doc),
                  external_risk_level: extract_external_risk_level(&doc),
                  fields: ClientFields::extract(&doc),
                  raw: Value::Object(doc) })
    }

    fn to_row(&self, version: i32, second_part_created: bool, now: DateTime<Utc>) -> ClientVersion {
        ClientVersion { client_id: self.client_id,
                        version,
                        fields: self.fields.clone(),
                        raw: self.raw.clone(),
                        trigger_hash: self.trigger_hash.clone(),
                        hash: self.trigger_hash.clone(),
                        status: ChangeStatus::Changed,
                        external_risk_level: self.external_risk_level.clone(),
                        needs_second_part: true,
                        second_part_created,
                        synced_at: now,
                        valid_from: now,
                        valid_to: None,
                        is_current: true }
    }
}

/// Aplica un registro dentro de una transacción abierta.
pub fn apply_client(tx: &mut dyn LedgerTx, rec: &PreparedClient, now: DateTime<Utc>) -> Result<ApplyOutcome, LedgerError> {
    tx.lock_client(rec.client_id)?;
    match tx.current_client(rec.client_id)? {
        None => {
            tx.insert_client_version(&rec.to_row(1, false, now))?;
            debug!("apply_client:created client_id={} version=1", rec.client_id);
            Ok(ApplyOutcome::Created)
        }
        Some(cur) if cur.trigger_hash == rec.trigger_hash => Ok(ApplyOutcome::Unchanged),
        Some(cur) => {
            tx.close_current_client(rec.client_id, now)?;
            tx.insert_client_version(&rec.to_row(cur.version + 1, cur.second_part_created, now))?;
            debug!("apply_client:updated client_id={} version={}", rec.client_id, cur.version + 1);
            Ok(ApplyOutcome::Updated)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClientVersionApplier;

impl ClientVersionApplier {
    /// Aplica una página completa en una sola transacción.
    ///
    /// El parseo y hash de los registros se hace en paralelo antes de abrir
    /// la transacción; las escrituras son secuenciales.
    pub fn apply_page<S: LedgerStore>(&self,
                                      store: &Arc<S>,
                                      records: &[RawRecord],
                                      now: DateTime<Utc>)
                                      -> Result<(ApplyReport, Vec<RecordResult>), LedgerError> {
        let prepared: Vec<Result<PreparedClient, SkipReason>> = records.par_iter().map(PreparedClient::prepare).collect();
        let results = store.transaction(|tx| {
                               prepared.iter()
                                       .map(|p| match p {
                                           Ok(rec) => apply_client(tx, rec, now).map(Ok),
                                           Err(reason) => Ok(Err(reason.clone())),
                                       })
                                       .collect::<Result<Vec<RecordResult>, LedgerError>>()
                           })?;
        let report = ApplyReport::from_results(&results);
        debug!("apply_page:clients records={} created={} updated={} unchanged={} dropped={}",
               records.len(),
               report.created,
               report.updated,
               report.unchanged,
               report.dropped);
        Ok((report, results))
    }
}
