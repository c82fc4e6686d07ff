//! Motor del workflow de segunda parte.
//!
//! Cada operación escribe una versión nueva (cerrando la vigente) dentro de
//! una transacción, ligada a la versión actual del cliente. Sin cliente
//! actual la operación falla con `ClientNotFound` y no escribe nada.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use log::{debug, info};
use serde_json::{Map, Value};

use crate::constants::{DEFAULT_REVIEW_YEARS, LOW_RISK, LOW_RISK_REVIEW_YEARS};
use crate::errors::LedgerError;
use crate::model::{ActorId, SecondPartStatus, SecondPartVersion};
use crate::store::{LedgerStore, LedgerTx};

/// Parámetros de un borrador nuevo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftRequest {
    pub risk_level: Option<String>,
    pub actor: Option<ActorId>,
    /// Reemplaza los datos heredados de la versión vigente.
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub status: SecondPartStatus,
    pub actor: Option<ActorId>,
    pub reason: Option<String>,
}

/// `now + years` conservando la hora; un 29-feb que cae en año no bisiesto
/// se normaliza al 1-mar.
pub fn add_years(now: DateTime<Utc>, years: u32) -> Result<DateTime<Utc>, LedgerError> {
    let overflow = || LedgerError::InvalidInput(format!("date overflow adding {years} years"));
    let date = now.date_naive();
    let year = i32::try_from(years).ok().and_then(|y| date.year().checked_add(y)).ok_or_else(overflow)?;
    let target = NaiveDate::from_ymd_opt(year, date.month(), date.day()).or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
                                                                        .ok_or_else(overflow)?;
    Ok(target.and_time(now.time()).and_utc())
}

/// Vencimiento de un borrador: riesgo exactamente "low" → 3 años; cualquier
/// otro valor no vacío → 1 año; vacío → sin vencimiento.
fn draft_due_at(risk: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, LedgerError> {
    if risk.is_empty() {
        return Ok(None);
    }
    let years = if risk == LOW_RISK { LOW_RISK_REVIEW_YEARS } else { DEFAULT_REVIEW_YEARS };
    add_years(now, years).map(Some)
}

/// Vencimiento al aprobar (comparación sin mayúsculas).
fn approval_due_at(risk: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, LedgerError> {
    let years = if risk.to_lowercase() == LOW_RISK { LOW_RISK_REVIEW_YEARS } else { DEFAULT_REVIEW_YEARS };
    add_years(now, years)
}

pub fn create_draft_in(tx: &mut dyn LedgerTx,
                       client_id: i64,
                       req: &DraftRequest,
                       now: DateTime<Utc>)
                       -> Result<SecondPartVersion, LedgerError> {
    tx.lock_client(client_id)?;
    let client = tx.current_client(client_id)?.ok_or(LedgerError::ClientNotFound(client_id))?;

    let (version, inherited) = match tx.current_second_part(client_id)? {
        Some(cur) => {
            tx.close_current_second_part(client_id, now)?;
            (cur.version + 1, cur.data)
        }
        None => (1, Value::Object(Map::new())),
    };

    let risk = req.risk_level.clone().unwrap_or_default();
    let row = SecondPartVersion { client_id,
                                  client_version: client.version,
                                  version,
                                  is_current: true,
                                  valid_from: now,
                                  valid_to: None,
                                  status: SecondPartStatus::Draft,
                                  data: req.data.clone().unwrap_or(inherited),
                                  due_at: draft_due_at(&risk, now)?,
                                  risk_level: risk,
                                  created_by: req.actor,
                                  updated_by: None,
                                  approved_by: None,
                                  reason: String::new() };
    tx.insert_second_part(&row)?;
    tx.mark_second_part_created(client_id)?;
    debug!("second_part:draft client_id={client_id} version={version} client_version={}", client.version);
    Ok(row)
}

pub fn transition_in(tx: &mut dyn LedgerTx,
                     client_id: i64,
                     req: &TransitionRequest,
                     now: DateTime<Utc>)
                     -> Result<SecondPartVersion, LedgerError> {
    if req.status == SecondPartStatus::Draft {
        return Err(LedgerError::InvalidInput("draft is created with create_draft, not as a transition".into()));
    }
    tx.lock_client(client_id)?;
    let client = tx.current_client(client_id)?.ok_or(LedgerError::ClientNotFound(client_id))?;

    let cur = match tx.current_second_part(client_id)? {
        Some(cur) => cur,
        None => {
            let auto = DraftRequest { actor: req.actor, ..DraftRequest::default() };
            create_draft_in(tx, client_id, &auto, now)?
        }
    };
    tx.close_current_second_part(client_id, now)?;

    let approved = req.status == SecondPartStatus::Approved;
    let due_at = if approved { Some(approval_due_at(&cur.risk_level, now)?) } else { cur.due_at };
    let row = SecondPartVersion { client_id,
                                  client_version: client.version,
                                  version: cur.version + 1,
                                  is_current: true,
                                  valid_from: now,
                                  valid_to: None,
                                  status: req.status,
                                  data: cur.data,
                                  risk_level: cur.risk_level,
                                  due_at,
                                  created_by: None,
                                  updated_by: if approved { None } else { req.actor },
                                  approved_by: if approved { req.actor } else { None },
                                  reason: req.reason.clone().unwrap_or_default() };
    if approved {
        tx.clear_needs_second_part(client_id)?;
    }
    tx.insert_second_part(&row)?;
    debug!("second_part:transition client_id={client_id} status={} version={}", row.status, row.version);
    Ok(row)
}

/// Fachada del workflow sobre un store.
pub struct SecondPartEngine<S> {
    store: Arc<S>,
}

impl<S: LedgerStore> SecondPartEngine<S> {
    pub fn new(store: Arc<S>) -> Self { Self { store } }

    pub fn create_draft(&self, client_id: i64, req: DraftRequest) -> Result<SecondPartVersion, LedgerError> {
        self.create_draft_at(client_id, req, Utc::now())
    }

    pub fn create_draft_at(&self,
                           client_id: i64,
                           req: DraftRequest,
                           now: DateTime<Utc>)
                           -> Result<SecondPartVersion, LedgerError> {
        let row = self.store.transaction(|tx| create_draft_in(tx, client_id, &req, now))?;
        info!("second_part:draft_created client_id={client_id} version={}", row.version);
        Ok(row)
    }

    pub fn transition(&self, client_id: i64, req: TransitionRequest) -> Result<SecondPartVersion, LedgerError> {
        self.transition_at(client_id, req, Utc::now())
    }

    pub fn transition_at(&self,
                         client_id: i64,
                         req: TransitionRequest,
                         now: DateTime<Utc>)
                         -> Result<SecondPartVersion, LedgerError> {
        let row = self.store.transaction(|tx| transition_in(tx, client_id, &req, now))?;
        info!("second_part:{} client_id={client_id} version={}", row.status, row.version);
        Ok(row)
    }

    pub fn submit(&self, client_id: i64, actor: Option<ActorId>) -> Result<SecondPartVersion, LedgerError> {
        self.transition(client_id, TransitionRequest { status: SecondPartStatus::Submitted, actor, reason: None })
    }

    pub fn approve(&self, client_id: i64, actor: Option<ActorId>) -> Result<SecondPartVersion, LedgerError> {
        self.transition(client_id, TransitionRequest { status: SecondPartStatus::Approved, actor, reason: None })
    }

    pub fn reject(&self, client_id: i64, actor: Option<ActorId>, reason: &str) -> Result<SecondPartVersion, LedgerError> {
        self.transition(client_id,
                        TransitionRequest { status: SecondPartStatus::Rejected, actor, reason: Some(reason.to_string()) })
    }

    pub fn request_docs(&self,
                        client_id: i64,
                        actor: Option<ActorId>,
                        reason: &str)
                        -> Result<SecondPartVersion, LedgerError> {
        self.transition(client_id,
                        TransitionRequest { status: SecondPartStatus::DocRequested,
                                            actor,
                                            reason: Some(reason.to_string()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> { Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap() }

    #[test]
    fn draft_due_dates() {
        let now = at(2024, 5, 10);
        assert_eq!(draft_due_at("low", now).unwrap(), Some(at(2027, 5, 10)));
        assert_eq!(draft_due_at("high", now).unwrap(), Some(at(2025, 5, 10)));
        // sólo "low" exacto da 3 años en el borrador
        assert_eq!(draft_due_at("LOW", now).unwrap(), Some(at(2025, 5, 10)));
        assert_eq!(draft_due_at("", now).unwrap(), None);
    }

    #[test]
    fn approval_due_dates_ignore_case() {
        let now = at(2024, 5, 10);
        assert_eq!(approval_due_at("Low", now).unwrap(), at(2027, 5, 10));
        assert_eq!(approval_due_at("", now).unwrap(), at(2025, 5, 10));
    }

    #[test]
    fn leap_day_rolls_to_march_first() {
        assert_eq!(add_years(at(2024, 2, 29), 1).unwrap(), at(2025, 3, 1));
        assert_eq!(add_years(at(2024, 2, 29), 4).unwrap(), at(2028, 2, 29));
    }
}
