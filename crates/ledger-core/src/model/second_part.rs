use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ActorId, ParseEnumError};

/// Estados del workflow de la segunda parte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondPartStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    DocRequested,
}

impl SecondPartStatus {
    pub const ALL: [SecondPartStatus; 5] = [Self::Draft, Self::Submitted, Self::Approved, Self::Rejected, Self::DocRequested];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::DocRequested => "doc_requested",
        }
    }
}

impl std::fmt::Display for SecondPartStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl std::str::FromStr for SecondPartStatus {
    type Err = ParseEnumError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter()
                 .copied()
                 .find(|st| st.as_str() == s)
                 .ok_or_else(|| ParseEnumError { kind: "second part status", value: s.to_string() })
    }
}

/// Una versión inmutable del formulario de segunda parte de un cliente.
///
/// `client_version` liga la fila a la versión del cliente vigente cuando se
/// escribió; el recálculo compara ambos números para detectar obsolescencia.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondPartVersion {
    pub client_id: i64,
    pub client_version: i32,
    pub version: i32,
    pub is_current: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub status: SecondPartStatus,
    pub data: Value,
    pub risk_level: String,
    pub due_at: Option<DateTime<Utc>>,
    pub created_by: Option<ActorId>,
    pub updated_by: Option<ActorId>,
    pub approved_by: Option<ActorId>,
    pub reason: String,
}
