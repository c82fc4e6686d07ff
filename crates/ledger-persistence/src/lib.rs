//! ledger-persistence
//!
//! Implementación Postgres (Diesel) de los contratos de `ledger-core`:
//! - `pg`: `PgLedgerStore` (transacciones, advisory locks, barridos de recálculo
//!   y superficie de consulta) más pool y proveedor de conexiones.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: configuración de conexión desde .env.
//! - `schema`: tablas Diesel de los esquemas `staging` y `core`.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_pool, build_pool_from_config, ConnectionProvider, PgLedgerStore, PgPool, PoolProvider};
