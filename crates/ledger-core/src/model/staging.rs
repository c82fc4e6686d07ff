use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ParseEnumError;

/// Los dos tipos de registro que entrega la fuente externa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Persons,
    Contracts,
}

impl SourceKind {
    /// Segmento de ruta del endpoint y clave del array en el sobre JSON.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Persons => "users",
            Self::Contracts => "contracts",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persons => "persons",
            Self::Contracts => "contracts",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl std::str::FromStr for SourceKind {
    type Err = ParseEnumError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "persons" | "users" => Ok(Self::Persons),
            "contracts" => Ok(Self::Contracts),
            other => Err(ParseEnumError { kind: "source kind", value: other.to_string() }),
        }
    }
}

/// Copia cruda del último fetch de un registro, indexada por id externo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingRecord {
    pub id: i64,
    pub raw: Value,
    pub synced_at: DateTime<Utc>,
}
