//! Checks de verificación sobre una versión de la segunda parte.
//!
//! Un check nace `pending` y recibe su resultado una sola vez.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use serde_json::{Map, Value};

use crate::errors::LedgerError;
use crate::model::{ActorId, CheckStatus, NewCheck, SecondPartCheck};
use crate::store::LedgerStore;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckRequest {
    pub client_id: i64,
    pub second_part_version: i32,
    pub kind: String,
    pub payload: Option<Value>,
    pub run_by: Option<ActorId>,
}

pub struct CheckService<S> {
    store: Arc<S>,
}

impl<S: LedgerStore> CheckService<S> {
    pub fn new(store: Arc<S>) -> Self { Self { store } }

    pub fn create_check(&self, req: CheckRequest) -> Result<SecondPartCheck, LedgerError> {
        self.create_check_at(req, Utc::now())
    }

    pub fn create_check_at(&self, req: CheckRequest, now: DateTime<Utc>) -> Result<SecondPartCheck, LedgerError> {
        if req.kind.trim().is_empty() {
            return Err(LedgerError::InvalidInput("check kind must not be empty".into()));
        }
        let new = NewCheck { client_id: req.client_id,
                             second_part_version: req.second_part_version,
                             kind: req.kind,
                             payload: req.payload.unwrap_or_else(|| Value::Object(Map::new())),
                             run_by: req.run_by,
                             run_at: now };
        let check = self.store.transaction(|tx| tx.insert_check(&new))?;
        info!("check:created id={} client_id={} kind={}", check.id, check.client_id, check.kind);
        Ok(check)
    }

    pub fn record_check_result(&self,
                               check_id: i64,
                               status: CheckStatus,
                               result: Option<Value>)
                               -> Result<SecondPartCheck, LedgerError> {
        self.record_check_result_at(check_id, status, result, Utc::now())
    }

    pub fn record_check_result_at(&self,
                                  check_id: i64,
                                  status: CheckStatus,
                                  result: Option<Value>,
                                  now: DateTime<Utc>)
                                  -> Result<SecondPartCheck, LedgerError> {
        if status == CheckStatus::Pending {
            return Err(LedgerError::InvalidInput("a finished check must be passed or failed".into()));
        }
        let check = self.store.transaction(|tx| tx.finish_check(check_id, status, result.as_ref(), now))?;
        info!("check:finished id={check_id} status={}", status.as_str());
        Ok(check)
    }
}
