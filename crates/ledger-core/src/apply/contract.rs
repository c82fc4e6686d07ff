//! Upsert de contratos por id externo (last-write-wins).
//!
//! El cambio se detecta con el SHA-256 de los bytes crudos; una actualización
//! sobrescribe la fila manteniendo su id interno.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use rayon::prelude::*;
use serde_json::Value;

use super::{ApplyOutcome, ApplyReport, RecordResult};
use crate::errors::{LedgerError, SkipReason};
use crate::hashing::payload_hash;
use crate::model::{ContractFields, NewContract};
use crate::record::{extract_external_id, RawRecord};
use crate::store::{LedgerStore, LedgerTx};

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedContract {
    pub external_id: i64,
    pub hash: String,
    pub fields: ContractFields,
    pub raw: Value,
}

impl PreparedContract {
    pub fn prepare(raw: &RawRecord) -> Result<Self, SkipReason> {
        let doc = raw.to_object()?;
        let external_id = extract_external_id(&doc)?;
        Ok(Self { external_id,
                  hash: payload_hash(raw.as_bytes()),
                  fields: ContractFields::extract(&doc),
                  raw: Value::Object(doc) })
    }

    fn to_row(&self, now: DateTime<Utc>) -> NewContract {
        NewContract { external_id: self.external_id,
                      fields: self.fields.clone(),
                      raw: self.raw.clone(),
                      hash: self.hash.clone(),
                      synced_at: now }
    }
}

pub fn apply_contract(tx: &mut dyn LedgerTx, rec: &PreparedContract, now: DateTime<Utc>) -> Result<ApplyOutcome, LedgerError> {
    match tx.contract_by_external_id(rec.external_id)? {
        None => {
            let id = tx.insert_contract(&rec.to_row(now))?;
            debug!("apply_contract:created external_id={} id={id}", rec.external_id);
            Ok(ApplyOutcome::Created)
        }
        Some(cur) if cur.hash == rec.hash => Ok(ApplyOutcome::Unchanged),
        Some(cur) => {
            tx.update_contract(cur.id, &rec.to_row(now))?;
            Ok(ApplyOutcome::Updated)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContractApplier;

impl ContractApplier {
    pub fn apply_page<S: LedgerStore>(&self,
                                      store: &Arc<S>,
                                      records: &[RawRecord],
                                      now: DateTime<Utc>)
                                      -> Result<(ApplyReport, Vec<RecordResult>), LedgerError> {
        let prepared: Vec<Result<PreparedContract, SkipReason>> = records.par_iter().map(PreparedContract::prepare).collect();
        let results = store.transaction(|tx| {
                               prepared.iter()
                                       .map(|p| match p {
                                           Ok(rec) => apply_contract(tx, rec, now).map(Ok),
                                           Err(reason) => Ok(Err(reason.clone())),
                                       })
                                       .collect::<Result<Vec<RecordResult>, LedgerError>>()
                           })?;
        let report = ApplyReport::from_results(&results);
        debug!("apply_page:contracts records={} created={} updated={} unchanged={} dropped={}",
               records.len(),
               report.created,
               report.updated,
               report.unchanged,
               report.dropped);
        Ok((report, results))
    }
}
