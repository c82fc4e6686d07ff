//! Contratos de almacenamiento del ledger.
//!
//! - `LedgerTx`: operaciones de lectura/escritura dentro de UNA transacción.
//! - `LedgerStore`: abre transacciones; todo lo que ocurre dentro del closure
//!   se confirma o se descarta completo.
//! - `LedgerQueries`: lecturas fuera de transacción para la superficie de consulta.
//!
//! Hay dos implementaciones con paridad de comportamiento:
//! `InMemoryLedgerStore` (tests y herramientas) y `PgLedgerStore`
//! (crate `ledger-persistence`).

mod memory;
mod query;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::LedgerError;
use crate::model::{CheckStatus, ClientVersion, Contract, NewCheck, NewContract, SecondPartCheck, SecondPartVersion,
                   SourceKind, StagingRecord};

pub use memory::InMemoryLedgerStore;
pub use query::{ClientFilter, ClientListItem, ContractFilter, PageRequest, Paged};

/// Operaciones disponibles dentro de una transacción.
///
/// Las escrituras SCD2 (cerrar fila actual + insertar siguiente) deben ir
/// precedidas de `lock_client` para serializar escritores concurrentes de la
/// misma entidad.
pub trait LedgerTx {
    /// Bloqueo exclusivo por cliente hasta el fin de la transacción.
    fn lock_client(&mut self, client_id: i64) -> Result<(), LedgerError>;

    fn current_client(&mut self, client_id: i64) -> Result<Option<ClientVersion>, LedgerError>;
    /// Cierra la fila actual (`valid_to = at`, `is_current = false`).
    fn close_current_client(&mut self, client_id: i64, at: DateTime<Utc>) -> Result<(), LedgerError>;
    fn insert_client_version(&mut self, row: &ClientVersion) -> Result<(), LedgerError>;
    fn mark_second_part_created(&mut self, client_id: i64) -> Result<(), LedgerError>;
    fn clear_needs_second_part(&mut self, client_id: i64) -> Result<(), LedgerError>;

    fn current_second_part(&mut self, client_id: i64) -> Result<Option<SecondPartVersion>, LedgerError>;
    fn close_current_second_part(&mut self, client_id: i64, at: DateTime<Utc>) -> Result<(), LedgerError>;
    fn insert_second_part(&mut self, row: &SecondPartVersion) -> Result<(), LedgerError>;

    /// Sobrescribe los registros de staging por id (el último gana si se repite).
    /// Devuelve cuántos ids distintos se guardaron.
    fn upsert_staging(&mut self, kind: SourceKind, records: &[StagingRecord]) -> Result<usize, LedgerError>;

    fn contract_by_external_id(&mut self, external_id: i64) -> Result<Option<Contract>, LedgerError>;
    /// Inserta y devuelve el id interno asignado.
    fn insert_contract(&mut self, row: &NewContract) -> Result<i64, LedgerError>;
    fn update_contract(&mut self, id: i64, row: &NewContract) -> Result<(), LedgerError>;

    fn insert_check(&mut self, check: &NewCheck) -> Result<SecondPartCheck, LedgerError>;
    /// Adjunta el resultado a un check existente; `CheckNotFound` si no existe.
    fn finish_check(&mut self,
                    check_id: i64,
                    status: CheckStatus,
                    result: Option<&Value>,
                    at: DateTime<Utc>)
                    -> Result<SecondPartCheck, LedgerError>;

    /// Marca `needs_second_part` en clientes cuya segunda parte vigente venció
    /// o quedó ligada a una versión anterior del cliente.
    fn flag_stale_second_parts(&mut self, now: DateTime<Utc>) -> Result<u64, LedgerError>;
    /// Marca `needs_second_part` en clientes que cruzaron un umbral de edad.
    fn flag_age_thresholds(&mut self, now: DateTime<Utc>) -> Result<u64, LedgerError>;
}

/// Proveedor de transacciones.
///
/// El closure puede ejecutarse más de una vez si el backend reintenta un
/// conflicto de serialización, por eso es `FnMut` y no debe tener efectos
/// fuera de la transacción.
pub trait LedgerStore: Send + Sync {
    fn transaction<T, F>(&self, f: F) -> Result<T, LedgerError>
        where F: FnMut(&mut dyn LedgerTx) -> Result<T, LedgerError>;
}

impl<S: LedgerStore + ?Sized> LedgerStore for std::sync::Arc<S> {
    fn transaction<T, F>(&self, f: F) -> Result<T, LedgerError>
        where F: FnMut(&mut dyn LedgerTx) -> Result<T, LedgerError>
    {
        (**self).transaction(f)
    }
}

/// Lecturas de la superficie de consulta.
pub trait LedgerQueries: Send + Sync {
    fn current_client(&self, client_id: i64) -> Result<Option<ClientVersion>, LedgerError>;
    /// Todas las versiones, `version` ascendente.
    fn client_history(&self, client_id: i64) -> Result<Vec<ClientVersion>, LedgerError>;
    fn client_version(&self, client_id: i64, version: i32) -> Result<Option<ClientVersion>, LedgerError>;
    /// Clientes actuales con su segunda parte vigente, `client_id` ascendente.
    fn list_clients(&self, filter: &ClientFilter, page: PageRequest) -> Result<Paged<ClientListItem>, LedgerError>;

    fn current_second_part(&self, client_id: i64) -> Result<Option<SecondPartVersion>, LedgerError>;
    fn second_part_history(&self, client_id: i64) -> Result<Vec<SecondPartVersion>, LedgerError>;
    /// Checks del cliente (opcionalmente de una versión), `id` descendente.
    fn list_checks(&self, client_id: i64, second_part_version: Option<i32>) -> Result<Vec<SecondPartCheck>, LedgerError>;

    fn get_contract(&self, external_id: i64) -> Result<Option<Contract>, LedgerError>;
    fn list_contracts(&self, filter: &ContractFilter, page: PageRequest) -> Result<Paged<Contract>, LedgerError>;

    fn staged_record(&self, kind: SourceKind, id: i64) -> Result<Option<StagingRecord>, LedgerError>;
}
