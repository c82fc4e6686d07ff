//! Registro crudo tal como llega de la fuente.
//!
//! Se conserva el texto JSON original: el hash de contratos se calcula sobre
//! esos bytes y el trigger hash sobre el objeto parseado.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{HashError, SkipReason};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(String);

impl RawRecord {
    pub fn new(text: impl Into<String>) -> Self { Self(text.into()) }

    pub fn from_value(value: &Value) -> Self { Self(value.to_string()) }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn as_bytes(&self) -> &[u8] { self.0.as_bytes() }

    pub fn to_value(&self) -> Result<Value, HashError> {
        serde_json::from_str(&self.0).map_err(|e| HashError::InvalidJson(e.to_string()))
    }

    /// Parsea el registro exigiendo un objeto JSON.
    pub fn to_object(&self) -> Result<Map<String, Value>, HashError> {
        match self.to_value()? {
            Value::Object(map) => Ok(map),
            _ => Err(HashError::NotAnObject),
        }
    }
}

impl From<&str> for RawRecord {
    fn from(s: &str) -> Self { Self::new(s) }
}

/// Entero no nulo a partir de un número JSON; acepta flotantes sin parte
/// fraccionaria (`42.0`).
pub(crate) fn integral_id(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else { return None };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        return Some(f as i64);
    }
    None
}

/// Id externo del registro (`id` en el nivel superior).
///
/// Ausente → `MissingId`; no entero o cero → `InvalidId`.
pub fn extract_external_id(doc: &Map<String, Value>) -> Result<i64, SkipReason> {
    let value = doc.get("id").ok_or(SkipReason::MissingId)?;
    match integral_id(value) {
        Some(0) => Err(SkipReason::InvalidId("0".into())),
        Some(id) => Ok(id),
        None => Err(SkipReason::InvalidId(value.to_string())),
    }
}
