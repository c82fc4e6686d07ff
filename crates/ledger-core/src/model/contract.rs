use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::client::extract_string;

/// Contrato sincronizado (last-write-wins, sin historial).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Id interno, estable entre actualizaciones.
    pub id: i64,
    pub external_id: i64,
    pub fields: ContractFields,
    pub raw: Value,
    pub hash: String,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFields {
    pub user_id: Option<i64>,
    pub status: String,
    pub kind: String,
    pub inner_code: String,
}

impl ContractFields {
    pub fn extract(doc: &Map<String, Value>) -> Self {
        Self { user_id: doc.get("user_id").and_then(crate::record::integral_id),
               status: extract_string(doc, "status"),
               kind: extract_string(doc, "kind"),
               inner_code: extract_string(doc, "inner_code") }
    }
}

/// Fila a insertar o a sobrescribir.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContract {
    pub external_id: i64,
    pub fields: ContractFields,
    pub raw: Value,
    pub hash: String,
    pub synced_at: DateTime<Utc>,
}
