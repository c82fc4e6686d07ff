//! ledger-core: ledger SCD2 de clientes y workflow de segunda parte.
//!
//! Contiene la lógica pura del dominio y los contratos de almacenamiento:
//! - `hashing`: trigger hash de clientes y hash de payload de contratos.
//! - `apply`: appliers por página (clientes SCD2, contratos upsert).
//! - `lifecycle`: transiciones de la segunda parte.
//! - `checks` / `recalc`: checks de verificación y barridos periódicos.
//! - `store`: traits `LedgerStore`/`LedgerTx`/`LedgerQueries` y backend en memoria.
pub mod apply;
pub mod checks;
pub mod constants;
pub mod errors;
pub mod hashing;
pub mod lifecycle;
pub mod model;
pub mod recalc;
pub mod record;
pub mod store;

pub use apply::{ApplyOutcome, ApplyReport, ClientVersionApplier, ContractApplier, RecordResult};
pub use checks::{CheckRequest, CheckService};
pub use errors::{HashError, LedgerError, SkipReason};
pub use lifecycle::{DraftRequest, SecondPartEngine, TransitionRequest};
pub use model::{ActorId, CheckStatus, ClientVersion, Contract, SecondPartStatus, SecondPartVersion, SourceKind,
                StagingRecord};
pub use recalc::{RecalcJobs, RecalcReport};
pub use record::RawRecord;
pub use store::{InMemoryLedgerStore, LedgerQueries, LedgerStore, LedgerTx};
