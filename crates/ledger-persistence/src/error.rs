//! Errores de persistencia.
//! Mapea errores de Diesel / pool a variantes semánticas y de ahí a `LedgerError`.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use ledger_core::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("not found")]
    NotFound,
    #[error("serialization conflict (retryable)")]
    SerializationConflict,
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    #[error("configuration: {0}")]
    Config(String),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl PersistenceError {
    /// Conflictos que desaparecen al repetir la transacción completa.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::SerializationConflict => true,
            // deadlocks llegan como Unknown; match por texto sin acoplar a SQLSTATE
            Self::Unknown(msg) => {
                let m = msg.to_lowercase();
                m.contains("deadlock detected") || m.contains("could not serialize access")
            }
            _ => false,
        }
    }
}

impl From<DieselError> for PersistenceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation => Self::UniqueViolation(info.message().to_string()),
                DatabaseErrorKind::CheckViolation => Self::CheckViolation(info.message().to_string()),
                DatabaseErrorKind::ForeignKeyViolation => Self::ForeignKeyViolation(info.message().to_string()),
                DatabaseErrorKind::SerializationFailure => Self::SerializationConflict,
                DatabaseErrorKind::ClosedConnection => Self::TransientIo(info.message().to_string()),
                other => Self::Unknown(format!("db error kind {:?}: {}", other, info.message())),
            },
            DieselError::DeserializationError(e) => Self::Unknown(format!("deser: {e}")),
            DieselError::SerializationError(e) => Self::Unknown(format!("ser: {e}")),
            DieselError::BrokenTransactionManager => Self::TransientIo("broken transaction manager".into()),
            DieselError::RollbackErrorOnCommit { rollback_error, commit_error } => {
                Self::Unknown(format!("rollback={rollback_error}; commit={commit_error}"))
            }
            other => Self::Unknown(format!("unhandled diesel error: {other:?}")),
        }
    }
}

impl From<PersistenceError> for LedgerError {
    fn from(err: PersistenceError) -> Self {
        if err.is_conflict() {
            return LedgerError::Conflict;
        }
        match err {
            PersistenceError::UniqueViolation(msg) => LedgerError::UniqueViolation(msg),
            other => LedgerError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlocks_become_retryable_conflicts() {
        let e: LedgerError = PersistenceError::Unknown("db error kind Unknown: deadlock detected".into()).into();
        assert_eq!(e, LedgerError::Conflict);
        assert!(e.is_retryable());
    }

    #[test]
    fn unique_violation_is_preserved() {
        let e: LedgerError = PersistenceError::UniqueViolation("clients_versions_one_current".into()).into();
        assert!(matches!(e, LedgerError::UniqueViolation(_)));
        let e: LedgerError = PersistenceError::NotFound.into();
        assert!(matches!(e, LedgerError::Storage(_)));
    }
}
