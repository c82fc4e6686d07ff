//! Superficie de consulta (lecturas sin transacción explícita).

use std::collections::HashMap;

use diesel::prelude::*;
use ledger_core::model::{ClientVersion, Contract, SecondPartCheck, SecondPartVersion, SourceKind, StagingRecord};
use ledger_core::store::{ClientFilter, ClientListItem, ContractFilter, PageRequest, Paged};
use ledger_core::{LedgerError, LedgerQueries};

use super::rows::{CheckRow, ClientRow, ContractRow, SecondPartRow};
use super::{ConnectionProvider, PgLedgerStore};
use crate::error::PersistenceError;
use crate::schema::{clients_versions as cv, contracts as ct, external_contracts, external_users, second_part_checks as chk,
                    second_part_versions as sp};

fn db(e: diesel::result::Error) -> LedgerError { PersistenceError::from(e).into() }

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, LedgerError>
    where T: TryFrom<R, Error = LedgerError>
{
    rows.into_iter().map(T::try_from).collect()
}

// Clientes actuales + segunda parte vigente (left join) con filtros opcionales.
macro_rules! client_list_query {
    ($filter:expr) => {{
        let mut q = cv::table.left_join(sp::table.on(sp::client_id.eq(cv::client_id).and(sp::is_current.eq(true))))
                             .filter(cv::is_current.eq(true))
                             .into_boxed();
        if let Some(flag) = $filter.needs_second_part {
            q = q.filter(cv::needs_second_part.eq(flag));
        }
        if let Some(status) = $filter.sp_status {
            q = q.filter(sp::status.eq(status.as_str()));
        }
        if let Some(limit) = $filter.due_before {
            q = q.filter(sp::due_at.le(limit));
        }
        q
    }};
}

macro_rules! contract_list_query {
    ($filter:expr) => {{
        let mut q = ct::table.into_boxed();
        if let Some(user) = $filter.user_id {
            q = q.filter(ct::user_id.eq(user));
        }
        if let Some(status) = $filter.status.as_deref() {
            q = q.filter(ct::status.eq(status));
        }
        q
    }};
}

impl<P: ConnectionProvider> LedgerQueries for PgLedgerStore<P> {
    fn current_client(&self, client_id: i64) -> Result<Option<ClientVersion>, LedgerError> {
        let mut conn = self.conn()?;
        cv::table.filter(cv::client_id.eq(client_id))
                 .filter(cv::is_current.eq(true))
                 .select(ClientRow::as_select())
                 .first(&mut conn)
                 .optional()
                 .map_err(db)?
                 .map(ClientVersion::try_from)
                 .transpose()
    }

    fn client_history(&self, client_id: i64) -> Result<Vec<ClientVersion>, LedgerError> {
        let mut conn = self.conn()?;
        let rows = cv::table.filter(cv::client_id.eq(client_id))
                            .order(cv::version.asc())
                            .select(ClientRow::as_select())
                            .load(&mut conn)
                            .map_err(db)?;
        convert_all(rows)
    }

    fn client_version(&self, client_id: i64, version: i32) -> Result<Option<ClientVersion>, LedgerError> {
        let mut conn = self.conn()?;
        cv::table.filter(cv::client_id.eq(client_id))
                 .filter(cv::version.eq(version))
                 .select(ClientRow::as_select())
                 .first(&mut conn)
                 .optional()
                 .map_err(db)?
                 .map(ClientVersion::try_from)
                 .transpose()
    }

    fn list_clients(&self, filter: &ClientFilter, page: PageRequest) -> Result<Paged<ClientListItem>, LedgerError> {
        let mut conn = self.conn()?;
        let total: i64 = client_list_query!(filter).count().get_result(&mut conn).map_err(db)?;
        let clients: Vec<ClientRow> = client_list_query!(filter).order(cv::client_id.asc())
                                                               .limit(page.per_page)
                                                               .offset(page.offset())
                                                               .select(ClientRow::as_select())
                                                               .load(&mut conn)
                                                               .map_err(db)?;
        // segundas partes vigentes de la página, en una sola consulta
        let ids: Vec<i64> = clients.iter().map(|c| c.client_id).collect();
        let mut current: HashMap<i64, SecondPartRow> = sp::table.filter(sp::client_id.eq_any(&ids))
                                                                .filter(sp::is_current.eq(true))
                                                                .select(SecondPartRow::as_select())
                                                                .load(&mut conn)
                                                                .map_err(db)?
                                                                .into_iter()
                                                                .map(|row| (row.client_id, row))
                                                                .collect();
        let items = clients.into_iter()
                           .map(|c| {
                               let second_part = current.remove(&c.client_id).map(SecondPartVersion::try_from).transpose()?;
                               Ok(ClientListItem { client: ClientVersion::try_from(c)?, second_part })
                           })
                           .collect::<Result<Vec<_>, LedgerError>>()?;
        Ok(Paged { items, total, page: page.page, per_page: page.per_page })
    }

    fn current_second_part(&self, client_id: i64) -> Result<Option<SecondPartVersion>, LedgerError> {
        let mut conn = self.conn()?;
        sp::table.filter(sp::client_id.eq(client_id))
                 .filter(sp::is_current.eq(true))
                 .select(SecondPartRow::as_select())
                 .first(&mut conn)
                 .optional()
                 .map_err(db)?
                 .map(SecondPartVersion::try_from)
                 .transpose()
    }

    fn second_part_history(&self, client_id: i64) -> Result<Vec<SecondPartVersion>, LedgerError> {
        let mut conn = self.conn()?;
        let rows = sp::table.filter(sp::client_id.eq(client_id))
                            .order(sp::version.asc())
                            .select(SecondPartRow::as_select())
                            .load(&mut conn)
                            .map_err(db)?;
        convert_all(rows)
    }

    fn list_checks(&self, client_id: i64, second_part_version: Option<i32>) -> Result<Vec<SecondPartCheck>, LedgerError> {
        let mut conn = self.conn()?;
        let mut q = chk::table.filter(chk::client_id.eq(client_id)).into_boxed();
        if let Some(v) = second_part_version {
            q = q.filter(chk::second_part_version.eq(v));
        }
        let rows = q.order(chk::id.desc()).select(CheckRow::as_select()).load(&mut conn).map_err(db)?;
        convert_all(rows)
    }

    fn get_contract(&self, external_id: i64) -> Result<Option<Contract>, LedgerError> {
        let mut conn = self.conn()?;
        let row = ct::table.filter(ct::external_id.eq(external_id))
                           .select(ContractRow::as_select())
                           .first(&mut conn)
                           .optional()
                           .map_err(db)?;
        Ok(row.map(Contract::from))
    }

    fn list_contracts(&self, filter: &ContractFilter, page: PageRequest) -> Result<Paged<Contract>, LedgerError> {
        let mut conn = self.conn()?;
        let total: i64 = contract_list_query!(filter).count().get_result(&mut conn).map_err(db)?;
        let rows = contract_list_query!(filter).order(ct::external_id.asc())
                                               .limit(page.per_page)
                                               .offset(page.offset())
                                               .select(ContractRow::as_select())
                                               .load(&mut conn)
                                               .map_err(db)?;
        Ok(Paged { items: rows.into_iter().map(Contract::from).collect(), total, page: page.page, per_page: page.per_page })
    }

    fn staged_record(&self, kind: SourceKind, id: i64) -> Result<Option<StagingRecord>, LedgerError> {
        let mut conn = self.conn()?;
        let row: Option<(i64, serde_json::Value, chrono::DateTime<chrono::Utc>)> = match kind {
            SourceKind::Persons => external_users::table.find(id).first(&mut conn).optional(),
            SourceKind::Contracts => external_contracts::table.find(id).first(&mut conn).optional(),
        }.map_err(db)?;
        Ok(row.map(|(id, raw, synced_at)| StagingRecord { id, raw, synced_at }))
    }
}
