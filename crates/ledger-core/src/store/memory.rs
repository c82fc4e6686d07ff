//! Backend en memoria con la misma semántica que Postgres.
//!
//! Las transacciones trabajan sobre una copia del estado y sólo la publican
//! si el closure termina en `Ok`, así un error a mitad de página no deja
//! escrituras parciales. El índice único parcial `(client_id) WHERE
//! is_current` se comprueba en cada inserción.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::query::{ClientFilter, ClientListItem, ContractFilter, PageRequest, Paged};
use super::{LedgerQueries, LedgerStore, LedgerTx};
use crate::errors::LedgerError;
use crate::model::{CheckStatus, ClientVersion, Contract, NewCheck, NewContract, SecondPartCheck, SecondPartVersion,
                   SourceKind, StagingRecord};
use crate::recalc::{birth_date_from_raw, crossed_age_threshold};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    clients: Vec<ClientVersion>,
    second_parts: Vec<SecondPartVersion>,
    checks: Vec<SecondPartCheck>,
    contracts: BTreeMap<i64, Contract>,
    staged_persons: BTreeMap<i64, StagingRecord>,
    staged_contracts: BTreeMap<i64, StagingRecord>,
    next_check_id: i64,
    next_contract_id: i64,
}

#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: Mutex<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self { Self::default() }

    fn read<T>(&self, f: impl FnOnce(&LedgerState) -> T) -> Result<T, LedgerError> {
        let guard = self.inner.lock().map_err(|_| LedgerError::Storage("in-memory store poisoned".into()))?;
        Ok(f(&guard))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn transaction<T, F>(&self, mut f: F) -> Result<T, LedgerError>
        where F: FnMut(&mut dyn LedgerTx) -> Result<T, LedgerError>
    {
        let mut guard = self.inner.lock().map_err(|_| LedgerError::Storage("in-memory store poisoned".into()))?;
        let mut work = guard.clone();
        let out = f(&mut MemoryTx { state: &mut work })?;
        *guard = work;
        Ok(out)
    }
}

struct MemoryTx<'a> {
    state: &'a mut LedgerState,
}

impl LedgerState {
    fn current_client_mut(&mut self, client_id: i64) -> Option<&mut ClientVersion> {
        self.clients.iter_mut().find(|c| c.client_id == client_id && c.is_current)
    }

    fn current_client(&self, client_id: i64) -> Option<&ClientVersion> {
        self.clients.iter().find(|c| c.client_id == client_id && c.is_current)
    }

    fn current_second_part(&self, client_id: i64) -> Option<&SecondPartVersion> {
        self.second_parts.iter().find(|s| s.client_id == client_id && s.is_current)
    }

    fn staging(&mut self, kind: SourceKind) -> &mut BTreeMap<i64, StagingRecord> {
        match kind {
            SourceKind::Persons => &mut self.staged_persons,
            SourceKind::Contracts => &mut self.staged_contracts,
        }
    }
}

impl LedgerTx for MemoryTx<'_> {
    fn lock_client(&mut self, _client_id: i64) -> Result<(), LedgerError> {
        // el mutex del store ya serializa todas las transacciones
        Ok(())
    }

    fn current_client(&mut self, client_id: i64) -> Result<Option<ClientVersion>, LedgerError> {
        Ok(self.state.current_client(client_id).cloned())
    }

    fn close_current_client(&mut self, client_id: i64, at: DateTime<Utc>) -> Result<(), LedgerError> {
        if let Some(row) = self.state.current_client_mut(client_id) {
            row.is_current = false;
            row.valid_to = Some(at);
        }
        Ok(())
    }

    fn insert_client_version(&mut self, row: &ClientVersion) -> Result<(), LedgerError> {
        if row.is_current && self.state.current_client(row.client_id).is_some() {
            return Err(LedgerError::UniqueViolation(format!("client {} already has a current version", row.client_id)));
        }
        if self.state.clients.iter().any(|c| c.client_id == row.client_id && c.version == row.version) {
            return Err(LedgerError::UniqueViolation(format!("client {} version {} exists", row.client_id, row.version)));
        }
        self.state.clients.push(row.clone());
        Ok(())
    }

    fn mark_second_part_created(&mut self, client_id: i64) -> Result<(), LedgerError> {
        if let Some(row) = self.state.current_client_mut(client_id) {
            row.second_part_created = true;
        }
        Ok(())
    }

    fn clear_needs_second_part(&mut self, client_id: i64) -> Result<(), LedgerError> {
        if let Some(row) = self.state.current_client_mut(client_id) {
            row.needs_second_part = false;
        }
        Ok(())
    }

    fn current_second_part(&mut self, client_id: i64) -> Result<Option<SecondPartVersion>, LedgerError> {
        Ok(self.state.current_second_part(client_id).cloned())
    }

    fn close_current_second_part(&mut self, client_id: i64, at: DateTime<Utc>) -> Result<(), LedgerError> {
        if let Some(row) = self.state.second_parts.iter_mut().find(|s| s.client_id == client_id && s.is_current) {
            row.is_current = false;
            row.valid_to = Some(at);
        }
        Ok(())
    }

    fn insert_second_part(&mut self, row: &SecondPartVersion) -> Result<(), LedgerError> {
        if row.is_current && self.state.current_second_part(row.client_id).is_some() {
            return Err(LedgerError::UniqueViolation(format!("client {} already has a current second part", row.client_id)));
        }
        self.state.second_parts.push(row.clone());
        Ok(())
    }

    fn upsert_staging(&mut self, kind: SourceKind, records: &[StagingRecord]) -> Result<usize, LedgerError> {
        let table = self.state.staging(kind);
        let mut ids = std::collections::BTreeSet::new();
        for rec in records {
            table.insert(rec.id, rec.clone());
            ids.insert(rec.id);
        }
        Ok(ids.len())
    }

    fn contract_by_external_id(&mut self, external_id: i64) -> Result<Option<Contract>, LedgerError> {
        Ok(self.state.contracts.get(&external_id).cloned())
    }

    fn insert_contract(&mut self, row: &NewContract) -> Result<i64, LedgerError> {
        if self.state.contracts.contains_key(&row.external_id) {
            return Err(LedgerError::UniqueViolation(format!("contract external_id {}", row.external_id)));
        }
        self.state.next_contract_id += 1;
        let id = self.state.next_contract_id;
        self.state.contracts.insert(row.external_id,
                                    Contract { id,
                                               external_id: row.external_id,
                                               fields: row.fields.clone(),
                                               raw: row.raw.clone(),
                                               hash: row.hash.clone(),
                                               synced_at: row.synced_at });
        Ok(id)
    }

    fn update_contract(&mut self, id: i64, row: &NewContract) -> Result<(), LedgerError> {
        let existing = self.state
                           .contracts
                           .values_mut()
                           .find(|c| c.id == id)
                           .ok_or_else(|| LedgerError::Storage(format!("contract id {id} not found")))?;
        existing.fields = row.fields.clone();
        existing.raw = row.raw.clone();
        existing.hash = row.hash.clone();
        existing.synced_at = row.synced_at;
        Ok(())
    }

    fn insert_check(&mut self, check: &NewCheck) -> Result<SecondPartCheck, LedgerError> {
        self.state.next_check_id += 1;
        let row = SecondPartCheck { id: self.state.next_check_id,
                                    client_id: check.client_id,
                                    second_part_version: check.second_part_version,
                                    kind: check.kind.clone(),
                                    status: CheckStatus::Pending,
                                    payload: check.payload.clone(),
                                    result: None,
                                    run_at: check.run_at,
                                    finished_at: None,
                                    run_by: check.run_by,
                                    created_at: check.run_at };
        self.state.checks.push(row.clone());
        Ok(row)
    }

    fn finish_check(&mut self,
                    check_id: i64,
                    status: CheckStatus,
                    result: Option<&Value>,
                    at: DateTime<Utc>)
                    -> Result<SecondPartCheck, LedgerError> {
        let row = self.state
                      .checks
                      .iter_mut()
                      .find(|c| c.id == check_id)
                      .ok_or(LedgerError::CheckNotFound(check_id))?;
        row.status = status;
        row.result = result.cloned();
        row.finished_at = Some(at);
        Ok(row.clone())
    }

    fn flag_stale_second_parts(&mut self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        let stale: Vec<i64> = self.state
                                  .clients
                                  .iter()
                                  .filter(|c| c.is_current && !c.needs_second_part)
                                  .filter(|c| {
                                      self.state.current_second_part(c.client_id).is_some_and(|sp| {
                                          sp.due_at.is_some_and(|due| due <= now) || sp.client_version != c.version
                                      })
                                  })
                                  .map(|c| c.client_id)
                                  .collect();
        for id in &stale {
            if let Some(row) = self.state.current_client_mut(*id) {
                row.needs_second_part = true;
            }
        }
        Ok(stale.len() as u64)
    }

    fn flag_age_thresholds(&mut self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        let today = now.date_naive();
        let mut affected = 0;
        for row in self.state.clients.iter_mut().filter(|c| c.is_current && !c.needs_second_part) {
            if birth_date_from_raw(&row.raw).is_some_and(|b| crossed_age_threshold(b, today)) {
                row.needs_second_part = true;
                affected += 1;
            }
        }
        Ok(affected)
    }
}

fn paginate<T: Clone>(rows: Vec<T>, page: PageRequest) -> Paged<T> {
    let total = rows.len() as i64;
    let items = rows.into_iter()
                    .skip(page.offset() as usize)
                    .take(page.per_page as usize)
                    .collect();
    Paged { items, total, page: page.page, per_page: page.per_page }
}

impl LedgerQueries for InMemoryLedgerStore {
    fn current_client(&self, client_id: i64) -> Result<Option<ClientVersion>, LedgerError> {
        self.read(|s| s.current_client(client_id).cloned())
    }

    fn client_history(&self, client_id: i64) -> Result<Vec<ClientVersion>, LedgerError> {
        self.read(|s| {
            let mut rows: Vec<_> = s.clients.iter().filter(|c| c.client_id == client_id).cloned().collect();
            rows.sort_by_key(|c| c.version);
            rows
        })
    }

    fn client_version(&self, client_id: i64, version: i32) -> Result<Option<ClientVersion>, LedgerError> {
        self.read(|s| s.clients.iter().find(|c| c.client_id == client_id && c.version == version).cloned())
    }

    fn list_clients(&self, filter: &ClientFilter, page: PageRequest) -> Result<Paged<ClientListItem>, LedgerError> {
        self.read(|s| {
            let mut rows: Vec<ClientListItem> =
                s.clients
                 .iter()
                 .filter(|c| c.is_current)
                 .map(|c| ClientListItem { client: c.clone(), second_part: s.current_second_part(c.client_id).cloned() })
                 .filter(|item| filter.matches(&item.client, item.second_part.as_ref()))
                 .collect();
            rows.sort_by_key(|item| item.client.client_id);
            paginate(rows, page)
        })
    }

    fn current_second_part(&self, client_id: i64) -> Result<Option<SecondPartVersion>, LedgerError> {
        self.read(|s| s.current_second_part(client_id).cloned())
    }

    fn second_part_history(&self, client_id: i64) -> Result<Vec<SecondPartVersion>, LedgerError> {
        self.read(|s| {
            let mut rows: Vec<_> = s.second_parts.iter().filter(|r| r.client_id == client_id).cloned().collect();
            rows.sort_by_key(|r| r.version);
            rows
        })
    }

    fn list_checks(&self, client_id: i64, second_part_version: Option<i32>) -> Result<Vec<SecondPartCheck>, LedgerError> {
        self.read(|s| {
            let mut rows: Vec<_> = s.checks
                                    .iter()
                                    .filter(|c| c.client_id == client_id)
                                    .filter(|c| second_part_version.map_or(true, |v| c.second_part_version == v))
                                    .cloned()
                                    .collect();
            rows.sort_by(|a, b| b.id.cmp(&a.id));
            rows
        })
    }

    fn get_contract(&self, external_id: i64) -> Result<Option<Contract>, LedgerError> {
        self.read(|s| s.contracts.get(&external_id).cloned())
    }

    fn list_contracts(&self, filter: &ContractFilter, page: PageRequest) -> Result<Paged<Contract>, LedgerError> {
        self.read(|s| {
            let rows: Vec<Contract> = s.contracts
                                       .values()
                                       .filter(|c| filter.user_id.is_none() || c.fields.user_id == filter.user_id)
                                       .filter(|c| filter.status.as_ref().map_or(true, |st| &c.fields.status == st))
                                       .cloned()
                                       .collect();
            paginate(rows, page)
        })
    }

    fn staged_record(&self, kind: SourceKind, id: i64) -> Result<Option<StagingRecord>, LedgerError> {
        self.read(|s| match kind {
                SourceKind::Persons => s.staged_persons.get(&id).cloned(),
                SourceKind::Contracts => s.staged_contracts.get(&id).cloned(),
            })
    }
}
