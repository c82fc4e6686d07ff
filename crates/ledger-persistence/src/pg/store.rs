use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Timestamptz};
use diesel::upsert::excluded;
use ledger_core::model::{CheckStatus, ClientVersion, Contract, NewCheck, NewContract, SecondPartCheck, SecondPartVersion,
                         SourceKind, StagingRecord};
use ledger_core::{LedgerError, LedgerStore, LedgerTx};
use log::debug;
use serde_json::Value;

use super::rows::{CheckRow, ClientRow, ContractRow, NewCheckRow, NewClientRow, NewContractRow, NewSecondPartRow,
                  SecondPartRow};
use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::{clients_versions as cv, contracts as ct, external_contracts, external_users, second_part_checks as chk,
                    second_part_versions as sp};

/// Primer argumento de `pg_advisory_xact_lock(int4, int4)` para locks por cliente.
pub const ADVISORY_LOCK_NAMESPACE: i32 = 0x4c45_4447; // "LEDG"

const FLAG_STALE_SQL: &str = r#"
UPDATE core.clients_versions AS c
SET needs_second_part = true
FROM core.second_part_versions AS sp
WHERE c.is_current = true
  AND sp.is_current = true
  AND sp.client_id = c.client_id
  AND c.needs_second_part = false
  AND ((sp.due_at IS NOT NULL AND sp.due_at <= $1) OR sp.client_version <> c.version)
"#;

const FLAG_AGE_SQL: &str = r#"
WITH birthdays AS (
  SELECT c.id,
         core.parse_birth_date(COALESCE(NULLIF(btrim(c.raw->>'birthday'), ''),
                                        NULLIF(btrim(c.raw->'person_info'->>'birthday'), ''))) AS bday
  FROM core.clients_versions c
  WHERE c.is_current = true AND c.needs_second_part = false
)
UPDATE core.clients_versions AS c
SET needs_second_part = true
FROM birthdays b
WHERE c.id = b.id
  AND b.bday IS NOT NULL
  AND (($1 AT TIME ZONE 'UTC')::date >= (b.bday + INTERVAL '20 years')::date
       OR ($1 AT TIME ZONE 'UTC')::date >= (b.bday + INTERVAL '45 years')::date)
"#;

/// Store Postgres del ledger.
pub struct PgLedgerStore<P: ConnectionProvider> {
    pub(super) provider: P,
}

impl<P: ConnectionProvider> PgLedgerStore<P> {
    pub fn new(provider: P) -> Self { Self { provider } }

    pub(super) fn conn(&self) -> Result<super::PgPooledConnection, LedgerError> {
        self.provider.connection().map_err(LedgerError::from)
    }
}

/// Error interno del closure de `build_transaction().run`.
enum TxError {
    Diesel(diesel::result::Error),
    Ledger(LedgerError),
}

impl From<diesel::result::Error> for TxError {
    fn from(e: diesel::result::Error) -> Self { Self::Diesel(e) }
}

impl From<TxError> for LedgerError {
    fn from(e: TxError) -> Self {
        match e {
            TxError::Ledger(l) => l,
            TxError::Diesel(d) => PersistenceError::from(d).into(),
        }
    }
}

impl<P: ConnectionProvider> LedgerStore for PgLedgerStore<P> {
    fn transaction<T, F>(&self, mut f: F) -> Result<T, LedgerError>
        where F: FnMut(&mut dyn LedgerTx) -> Result<T, LedgerError>
    {
        with_retry(|| {
            let mut conn = self.conn()?;
            conn.build_transaction()
                .read_write()
                .run(|tx_conn| {
                    let mut tx = PgTx { conn: tx_conn };
                    f(&mut tx).map_err(TxError::Ledger)
                })
                .map_err(LedgerError::from)
        })
    }
}

struct PgTx<'c> {
    conn: &'c mut PgConnection,
}

fn db<E: Into<PersistenceError>>(e: E) -> LedgerError { LedgerError::from(e.into()) }

fn dedup_by_id(records: &[StagingRecord]) -> Vec<&StagingRecord> {
    // ON CONFLICT no admite tocar la misma fila dos veces en un INSERT; gana el último
    let by_id: BTreeMap<i64, &StagingRecord> = records.iter().map(|r| (r.id, r)).collect();
    by_id.into_values().collect()
}

impl LedgerTx for PgTx<'_> {
    fn lock_client(&mut self, client_id: i64) -> Result<(), LedgerError> {
        diesel::sql_query("SELECT pg_advisory_xact_lock($1, hashint8($2))").bind::<Integer, _>(ADVISORY_LOCK_NAMESPACE)
                                                                           .bind::<BigInt, _>(client_id)
                                                                           .execute(self.conn)
                                                                           .map_err(db)?;
        Ok(())
    }

    fn current_client(&mut self, client_id: i64) -> Result<Option<ClientVersion>, LedgerError> {
        cv::table.filter(cv::client_id.eq(client_id))
                 .filter(cv::is_current.eq(true))
                 .select(ClientRow::as_select())
                 .first(self.conn)
                 .optional()
                 .map_err(db)?
                 .map(ClientVersion::try_from)
                 .transpose()
    }

    fn close_current_client(&mut self, client_id: i64, at: DateTime<Utc>) -> Result<(), LedgerError> {
        diesel::update(cv::table.filter(cv::client_id.eq(client_id)).filter(cv::is_current.eq(true)))
            .set((cv::is_current.eq(false), cv::valid_to.eq(Some(at))))
            .execute(self.conn)
            .map_err(db)?;
        Ok(())
    }

    fn insert_client_version(&mut self, row: &ClientVersion) -> Result<(), LedgerError> {
        diesel::insert_into(cv::table).values(NewClientRow::from(row)).execute(self.conn).map_err(db)?;
        debug!("pg:insert_client_version client_id={} version={}", row.client_id, row.version);
        Ok(())
    }

    fn mark_second_part_created(&mut self, client_id: i64) -> Result<(), LedgerError> {
        diesel::update(cv::table.filter(cv::client_id.eq(client_id)).filter(cv::is_current.eq(true)))
            .set(cv::second_part_created.eq(true))
            .execute(self.conn)
            .map_err(db)?;
        Ok(())
    }

    fn clear_needs_second_part(&mut self, client_id: i64) -> Result<(), LedgerError> {
        diesel::update(cv::table.filter(cv::client_id.eq(client_id)).filter(cv::is_current.eq(true)))
            .set(cv::needs_second_part.eq(false))
            .execute(self.conn)
            .map_err(db)?;
        Ok(())
    }

    fn current_second_part(&mut self, client_id: i64) -> Result<Option<SecondPartVersion>, LedgerError> {
        sp::table.filter(sp::client_id.eq(client_id))
                 .filter(sp::is_current.eq(true))
                 .select(SecondPartRow::as_select())
                 .first(self.conn)
                 .optional()
                 .map_err(db)?
                 .map(SecondPartVersion::try_from)
                 .transpose()
    }

    fn close_current_second_part(&mut self, client_id: i64, at: DateTime<Utc>) -> Result<(), LedgerError> {
        diesel::update(sp::table.filter(sp::client_id.eq(client_id)).filter(sp::is_current.eq(true)))
            .set((sp::is_current.eq(false), sp::valid_to.eq(Some(at))))
            .execute(self.conn)
            .map_err(db)?;
        Ok(())
    }

    fn insert_second_part(&mut self, row: &SecondPartVersion) -> Result<(), LedgerError> {
        diesel::insert_into(sp::table).values(NewSecondPartRow::from(row)).execute(self.conn).map_err(db)?;
        Ok(())
    }

    fn upsert_staging(&mut self, kind: SourceKind, records: &[StagingRecord]) -> Result<usize, LedgerError> {
        let unique = dedup_by_id(records);
        if unique.is_empty() {
            return Ok(0);
        }
        let n = match kind {
            SourceKind::Persons => {
                let values: Vec<_> = unique.iter()
                                           .map(|r| {
                                               (external_users::id.eq(r.id),
                                                external_users::raw.eq(&r.raw),
                                                external_users::synced_at.eq(r.synced_at))
                                           })
                                           .collect();
                diesel::insert_into(external_users::table).values(&values)
                                                          .on_conflict(external_users::id)
                                                          .do_update()
                                                          .set((external_users::raw.eq(excluded(external_users::raw)),
                                                                external_users::synced_at
                                                                    .eq(excluded(external_users::synced_at))))
                                                          .execute(self.conn)
            }
            SourceKind::Contracts => {
                let values: Vec<_> = unique.iter()
                                           .map(|r| {
                                               (external_contracts::id.eq(r.id),
                                                external_contracts::raw.eq(&r.raw),
                                                external_contracts::synced_at.eq(r.synced_at))
                                           })
                                           .collect();
                diesel::insert_into(external_contracts::table).values(&values)
                                                              .on_conflict(external_contracts::id)
                                                              .do_update()
                                                              .set((external_contracts::raw
                                                                        .eq(excluded(external_contracts::raw)),
                                                                    external_contracts::synced_at
                                                                        .eq(excluded(external_contracts::synced_at))))
                                                              .execute(self.conn)
            }
        }.map_err(db)?;
        debug!("pg:upsert_staging kind={kind} rows={n}");
        Ok(n)
    }

    fn contract_by_external_id(&mut self, external_id: i64) -> Result<Option<Contract>, LedgerError> {
        let row = ct::table.filter(ct::external_id.eq(external_id))
                           .select(ContractRow::as_select())
                           .first(self.conn)
                           .optional()
                           .map_err(db)?;
        Ok(row.map(Contract::from))
    }

    fn insert_contract(&mut self, row: &NewContract) -> Result<i64, LedgerError> {
        diesel::insert_into(ct::table).values(NewContractRow::from(row))
                                      .returning(ct::id)
                                      .get_result(self.conn)
                                      .map_err(db)
    }

    fn update_contract(&mut self, id: i64, row: &NewContract) -> Result<(), LedgerError> {
        diesel::update(ct::table.find(id)).set(NewContractRow::from(row)).execute(self.conn).map_err(db)?;
        Ok(())
    }

    fn insert_check(&mut self, check: &NewCheck) -> Result<SecondPartCheck, LedgerError> {
        let row: CheckRow = diesel::insert_into(chk::table).values(NewCheckRow::from(check))
                                                           .returning(CheckRow::as_returning())
                                                           .get_result(self.conn)
                                                           .map_err(db)?;
        SecondPartCheck::try_from(row)
    }

    fn finish_check(&mut self,
                    check_id: i64,
                    status: CheckStatus,
                    result: Option<&Value>,
                    at: DateTime<Utc>)
                    -> Result<SecondPartCheck, LedgerError> {
        let row: Option<CheckRow> = diesel::update(chk::table.find(check_id))
            .set((chk::status.eq(status.as_str()), chk::result.eq(result.cloned()), chk::finished_at.eq(Some(at))))
            .returning(CheckRow::as_returning())
            .get_result(self.conn)
            .optional()
            .map_err(db)?;
        row.ok_or(LedgerError::CheckNotFound(check_id)).and_then(SecondPartCheck::try_from)
    }

    fn flag_stale_second_parts(&mut self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        let n = diesel::sql_query(FLAG_STALE_SQL).bind::<Timestamptz, _>(now).execute(self.conn).map_err(db)?;
        Ok(n as u64)
    }

    fn flag_age_thresholds(&mut self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        let n = diesel::sql_query(FLAG_AGE_SQL).bind::<Timestamptz, _>(now).execute(self.conn).map_err(db)?;
        Ok(n as u64)
    }
}
