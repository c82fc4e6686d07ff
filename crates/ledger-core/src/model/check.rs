use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ActorId, ParseEnumError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pending,
    Passed,
    Failed,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for CheckStatus {
    type Err = ParseEnumError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            other => Err(ParseEnumError { kind: "check status", value: other.to_string() }),
        }
    }
}

/// Check de verificación ligado a una versión concreta de la segunda parte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondPartCheck {
    pub id: i64,
    pub client_id: i64,
    pub second_part_version: i32,
    pub kind: String,
    pub status: CheckStatus,
    pub payload: Value,
    pub result: Option<Value>,
    pub run_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub run_by: Option<ActorId>,
    pub created_at: DateTime<Utc>,
}

/// Datos para registrar un check nuevo (siempre en estado `pending`).
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheck {
    pub client_id: i64,
    pub second_part_version: i32,
    pub kind: String,
    pub payload: Value,
    pub run_by: Option<ActorId>,
    pub run_at: DateTime<Utc>,
}
