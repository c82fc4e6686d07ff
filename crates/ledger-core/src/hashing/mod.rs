//! Hashing de registros: trigger hash (clientes) y hash de payload (contratos).

pub mod payload;
pub mod trigger;

pub use payload::payload_hash;
pub use trigger::{compute_trigger_hash, extract_external_risk_level, resolve_trigger_fields, stringify, trigger_hash_of,
                  FieldSource, TriggerField, TRIGGER_FIELDS};
