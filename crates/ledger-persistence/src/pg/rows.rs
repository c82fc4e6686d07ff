//! Filas Diesel y su conversión a tipos de dominio.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use ledger_core::model::{ActorId, ChangeStatus, CheckStatus, ClientFields, ClientVersion, Contract, ContractFields,
                         NewCheck, NewContract, SecondPartCheck, SecondPartStatus, SecondPartVersion};
use ledger_core::LedgerError;
use serde_json::Value;

use crate::schema::{clients_versions, contracts, second_part_checks, second_part_versions};

fn parse<T>(s: &str) -> Result<T, LedgerError>
    where T: std::str::FromStr,
          T::Err: std::fmt::Display
{
    s.parse::<T>().map_err(|e| LedgerError::Serialization(e.to_string()))
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = clients_versions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ClientRow {
    pub id: i64,
    pub client_id: i64,
    pub version: i32,
    pub surname: String,
    pub name: String,
    pub patronymic: String,
    pub birthday: String,
    pub birth_place: String,
    pub contact_email: String,
    pub inn: String,
    pub snils: String,
    pub pass_series: String,
    pub pass_number: String,
    pub pass_issue_date: String,
    pub pass_issuer: String,
    pub pass_issuer_code: String,
    pub main_phone: String,
    pub created_lk_at: String,
    pub updated_lk_at: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub street: String,
    pub house: String,
    pub district: String,
    pub raw: Value,
    pub trigger_hash: String,
    pub hash: String,
    pub status: String,
    pub external_risk_level: String,
    pub needs_second_part: bool,
    pub second_part_created: bool,
    pub synced_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub is_current: bool,
}

impl TryFrom<ClientRow> for ClientVersion {
    type Error = LedgerError;
    fn try_from(r: ClientRow) -> Result<Self, Self::Error> {
        Ok(ClientVersion { client_id: r.client_id,
                           version: r.version,
                           fields: ClientFields { surname: r.surname,
                                                  name: r.name,
                                                  patronymic: r.patronymic,
                                                  birthday: r.birthday,
                                                  birth_place: r.birth_place,
                                                  contact_email: r.contact_email,
                                                  inn: r.inn,
                                                  snils: r.snils,
                                                  pass_series: r.pass_series,
                                                  pass_number: r.pass_number,
                                                  pass_issue_date: r.pass_issue_date,
                                                  pass_issuer: r.pass_issuer,
                                                  pass_issuer_code: r.pass_issuer_code,
                                                  main_phone: r.main_phone,
                                                  created_lk_at: r.created_lk_at,
                                                  updated_lk_at: r.updated_lk_at,
                                                  country: r.country,
                                                  region: r.region,
                                                  city: r.city,
                                                  street: r.street,
                                                  house: r.house,
                                                  district: r.district },
                           raw: r.raw,
                           trigger_hash: r.trigger_hash,
                           hash: r.hash,
                           status: parse::<ChangeStatus>(&r.status)?,
                           external_risk_level: r.external_risk_level,
                           needs_second_part: r.needs_second_part,
                           second_part_created: r.second_part_created,
                           synced_at: r.synced_at,
                           valid_from: r.valid_from,
                           valid_to: r.valid_to,
                           is_current: r.is_current })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = clients_versions)]
pub struct NewClientRow<'a> {
    pub client_id: i64,
    pub version: i32,
    pub surname: &'a str,
    pub name: &'a str,
    pub patronymic: &'a str,
    pub birthday: &'a str,
    pub birth_place: &'a str,
    pub contact_email: &'a str,
    pub inn: &'a str,
    pub snils: &'a str,
    pub pass_series: &'a str,
    pub pass_number: &'a str,
    pub pass_issue_date: &'a str,
    pub pass_issuer: &'a str,
    pub pass_issuer_code: &'a str,
    pub main_phone: &'a str,
    pub created_lk_at: &'a str,
    pub updated_lk_at: &'a str,
    pub country: &'a str,
    pub region: &'a str,
    pub city: &'a str,
    pub street: &'a str,
    pub house: &'a str,
    pub district: &'a str,
    pub raw: &'a Value,
    pub trigger_hash: &'a str,
    pub hash: &'a str,
    pub status: &'a str,
    pub external_risk_level: &'a str,
    pub needs_second_part: bool,
    pub second_part_created: bool,
    pub synced_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub is_current: bool,
}

impl<'a> From<&'a ClientVersion> for NewClientRow<'a> {
    fn from(c: &'a ClientVersion) -> Self {
        let f = &c.fields;
        Self { client_id: c.client_id,
               version: c.version,
               surname: &f.surname,
               name: &f.name,
               patronymic: &f.patronymic,
               birthday: &f.birthday,
               birth_place: &f.birth_place,
               contact_email: &f.contact_email,
               inn: &f.inn,
               snils: &f.snils,
               pass_series: &f.pass_series,
               pass_number: &f.pass_number,
               pass_issue_date: &f.pass_issue_date,
               pass_issuer: &f.pass_issuer,
               pass_issuer_code: &f.pass_issuer_code,
               main_phone: &f.main_phone,
               created_lk_at: &f.created_lk_at,
               updated_lk_at: &f.updated_lk_at,
               country: &f.country,
               region: &f.region,
               city: &f.city,
               street: &f.street,
               house: &f.house,
               district: &f.district,
               raw: &c.raw,
               trigger_hash: &c.trigger_hash,
               hash: &c.hash,
               status: c.status.as_str(),
               external_risk_level: &c.external_risk_level,
               needs_second_part: c.needs_second_part,
               second_part_created: c.second_part_created,
               synced_at: c.synced_at,
               valid_from: c.valid_from,
               valid_to: c.valid_to,
               is_current: c.is_current }
    }
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = second_part_versions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SecondPartRow {
    pub id: i64,
    pub client_id: i64,
    pub client_version: i32,
    pub version: i32,
    pub is_current: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub status: String,
    pub data: Value,
    pub risk_level: String,
    pub due_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    pub approved_by: Option<i64>,
    pub reason: String,
}

impl TryFrom<SecondPartRow> for SecondPartVersion {
    type Error = LedgerError;
    fn try_from(r: SecondPartRow) -> Result<Self, Self::Error> {
        Ok(SecondPartVersion { client_id: r.client_id,
                               client_version: r.client_version,
                               version: r.version,
                               is_current: r.is_current,
                               valid_from: r.valid_from,
                               valid_to: r.valid_to,
                               status: parse::<SecondPartStatus>(&r.status)?,
                               data: r.data,
                               risk_level: r.risk_level,
                               due_at: r.due_at,
                               created_by: r.created_by.map(ActorId),
                               updated_by: r.updated_by.map(ActorId),
                               approved_by: r.approved_by.map(ActorId),
                               reason: r.reason })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = second_part_versions)]
pub struct NewSecondPartRow<'a> {
    pub client_id: i64,
    pub client_version: i32,
    pub version: i32,
    pub is_current: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub status: &'a str,
    pub data: &'a Value,
    pub risk_level: &'a str,
    pub due_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    pub approved_by: Option<i64>,
    pub reason: &'a str,
}

impl<'a> From<&'a SecondPartVersion> for NewSecondPartRow<'a> {
    fn from(s: &'a SecondPartVersion) -> Self {
        Self { client_id: s.client_id,
               client_version: s.client_version,
               version: s.version,
               is_current: s.is_current,
               valid_from: s.valid_from,
               valid_to: s.valid_to,
               status: s.status.as_str(),
               data: &s.data,
               risk_level: &s.risk_level,
               due_at: s.due_at,
               created_by: s.created_by.map(ActorId::get),
               updated_by: s.updated_by.map(ActorId::get),
               approved_by: s.approved_by.map(ActorId::get),
               reason: &s.reason }
    }
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = second_part_checks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CheckRow {
    pub id: i64,
    pub client_id: i64,
    pub second_part_version: i32,
    pub kind: String,
    pub status: String,
    pub payload: Value,
    pub result: Option<Value>,
    pub run_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub run_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CheckRow> for SecondPartCheck {
    type Error = LedgerError;
    fn try_from(r: CheckRow) -> Result<Self, Self::Error> {
        Ok(SecondPartCheck { id: r.id,
                             client_id: r.client_id,
                             second_part_version: r.second_part_version,
                             kind: r.kind,
                             status: parse::<CheckStatus>(&r.status)?,
                             payload: r.payload,
                             result: r.result,
                             run_at: r.run_at,
                             finished_at: r.finished_at,
                             run_by: r.run_by.map(ActorId),
                             created_at: r.created_at })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = second_part_checks)]
pub struct NewCheckRow<'a> {
    pub client_id: i64,
    pub second_part_version: i32,
    pub kind: &'a str,
    pub status: &'a str,
    pub payload: &'a Value,
    pub run_at: DateTime<Utc>,
    pub run_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a NewCheck> for NewCheckRow<'a> {
    fn from(c: &'a NewCheck) -> Self {
        Self { client_id: c.client_id,
               second_part_version: c.second_part_version,
               kind: &c.kind,
               status: CheckStatus::Pending.as_str(),
               payload: &c.payload,
               run_at: c.run_at,
               run_by: c.run_by.map(ActorId::get),
               created_at: c.run_at }
    }
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = contracts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContractRow {
    pub id: i64,
    pub external_id: i64,
    pub user_id: Option<i64>,
    pub status: String,
    pub kind: String,
    pub inner_code: String,
    pub raw: Value,
    pub hash: String,
    pub synced_at: DateTime<Utc>,
}

impl From<ContractRow> for Contract {
    fn from(r: ContractRow) -> Self {
        Contract { id: r.id,
                   external_id: r.external_id,
                   fields: ContractFields { user_id: r.user_id, status: r.status, kind: r.kind, inner_code: r.inner_code },
                   raw: r.raw,
                   hash: r.hash,
                   synced_at: r.synced_at }
    }
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = contracts)]
#[diesel(treat_none_as_null = true)]
pub struct NewContractRow<'a> {
    pub external_id: i64,
    pub user_id: Option<i64>,
    pub status: &'a str,
    pub kind: &'a str,
    pub inner_code: &'a str,
    pub raw: &'a Value,
    pub hash: &'a str,
    pub synced_at: DateTime<Utc>,
}

impl<'a> From<&'a NewContract> for NewContractRow<'a> {
    fn from(c: &'a NewContract) -> Self {
        Self { external_id: c.external_id,
               user_id: c.fields.user_id,
               status: &c.fields.status,
               kind: &c.fields.kind,
               inner_code: &c.fields.inner_code,
               raw: &c.raw,
               hash: &c.hash,
               synced_at: c.synced_at }
    }
}
