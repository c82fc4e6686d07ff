use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ParseEnumError;
use crate::constants::PERSON_INFO_KEY;

/// Resultado de la detección de cambios registrado en cada fila.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Changed,
    Unchanged,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Changed => "changed",
            Self::Unchanged => "unchanged",
        }
    }
}

impl std::str::FromStr for ChangeStatus {
    type Err = ParseEnumError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "changed" => Ok(Self::Changed),
            "unchanged" => Ok(Self::Unchanged),
            other => Err(ParseEnumError { kind: "change status", value: other.to_string() }),
        }
    }
}

/// Escalares extraídos del payload crudo en cada escritura.
///
/// Regla: string en el nivel superior, si no string bajo `person_info`,
/// recortado; en otro caso vacío.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFields {
    pub surname: String,
    pub name: String,
    pub patronymic: String,
    pub birthday: String,
    pub birth_place: String,
    pub contact_email: String,
    pub inn: String,
    pub snils: String,
    pub pass_series: String,
    pub pass_number: String,
    pub pass_issue_date: String,
    pub pass_issuer: String,
    pub pass_issuer_code: String,
    pub main_phone: String,
    pub created_lk_at: String,
    pub updated_lk_at: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub street: String,
    pub house: String,
    pub district: String,
}

impl ClientFields {
    pub fn extract(doc: &Map<String, Value>) -> Self {
        let s = |key: &str| extract_string(doc, key);
        Self { surname: s("surname"),
               name: s("name"),
               patronymic: s("patronymic"),
               birthday: s("birthday"),
               birth_place: s("birth_place"),
               contact_email: s("contact_email"),
               inn: s("inn"),
               snils: s("snils"),
               pass_series: s("pass_series"),
               pass_number: s("pass_number"),
               pass_issue_date: s("pass_issue_date"),
               pass_issuer: s("pass_issuer"),
               pass_issuer_code: s("pass_issuer_code"),
               main_phone: s("main_phone"),
               created_lk_at: s("created_at"),
               updated_lk_at: s("updated_at"),
               country: s("country"),
               region: s("region"),
               city: s("city"),
               street: s("street"),
               house: s("house"),
               district: s("district") }
    }
}

/// Valor string de `key` (nivel superior, luego `person_info`), recortado.
/// Valores presentes que no son string se ignoran.
pub(crate) fn extract_string(doc: &Map<String, Value>, key: &str) -> String {
    if let Some(Value::String(s)) = doc.get(key) {
        return s.trim().to_string();
    }
    doc.get(PERSON_INFO_KEY)
       .and_then(Value::as_object)
       .and_then(|pi| pi.get(key))
       .and_then(Value::as_str)
       .map(|s| s.trim().to_string())
       .unwrap_or_default()
}

/// Una versión inmutable de un cliente.
///
/// Las filas sólo cambian al ser reemplazadas: se les asigna `valid_to` y
/// `is_current = false`. Las banderas `needs_second_part` y
/// `second_part_created` viven en la fila actual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientVersion {
    pub client_id: i64,
    pub version: i32,
    pub fields: ClientFields,
    pub raw: Value,
    pub trigger_hash: String,
    pub hash: String,
    pub status: ChangeStatus,
    pub external_risk_level: String,
    pub needs_second_part: bool,
    pub second_part_created: bool,
    pub synced_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub is_current: bool,
}
