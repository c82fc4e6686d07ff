//! Trigger hash: huella de los campos que obligan a renovar la segunda parte.
//!
//! Cada campo de la lista se resuelve con una tabla de estrategias en orden
//! de prioridad; gana la primera clave *presente* (un `null` presente gana y
//! vale ""). El valor se convierte a texto, se concatena como `key=value|`
//! respetando el orden de la lista y se hashea con SHA-256.
//!
//! Cambios en campos fuera de la lista no alteran el hash.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::constants::PERSON_INFO_KEY;
use crate::errors::HashError;
use crate::record::RawRecord;

/// Estrategia para localizar el valor de un campo dentro del documento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Ruta explícita desde la raíz (todos los tramos intermedios deben ser objetos).
    NestedPath(&'static [&'static str]),
    /// La propia clave del campo en el nivel superior.
    DirectKey,
    /// La clave del campo bajo un objeto hijo.
    DuplicateUnder(&'static str),
}

impl FieldSource {
    fn resolve<'d>(&self, key: &str, doc: &'d Map<String, Value>) -> Option<&'d Value> {
        match self {
            Self::NestedPath(path) => lookup_path(doc, path),
            Self::DirectKey => doc.get(key),
            Self::DuplicateUnder(parent) => doc.get(*parent)?.as_object()?.get(key),
        }
    }
}

fn lookup_path<'d>(doc: &'d Map<String, Value>, path: &[&str]) -> Option<&'d Value> {
    let (first, rest) = path.split_first()?;
    let mut cur = doc.get(*first)?;
    for seg in rest {
        cur = cur.as_object()?.get(*seg)?;
    }
    Some(cur)
}

#[derive(Debug, Clone, Copy)]
pub struct TriggerField {
    pub key: &'static str,
    pub sources: &'static [FieldSource],
}

const PERSON: &[FieldSource] = &[FieldSource::DirectKey, FieldSource::DuplicateUnder(PERSON_INFO_KEY)];

macro_rules! person {
    ($key:literal) => {
        TriggerField { key: $key, sources: PERSON }
    };
}

macro_rules! address {
    ($role:literal, $field:literal) => {
        TriggerField { key: concat!($role, "_", $field),
                       sources: &[FieldSource::NestedPath(&["addresses", $role, $field]),
                                  FieldSource::DirectKey,
                                  FieldSource::DuplicateUnder(PERSON_INFO_KEY)] }
    };
}

/// Lista ordenada de campos disparadores. El orden forma parte del hash.
pub const TRIGGER_FIELDS: &[TriggerField] = &[
    person!("main_phone"),
    person!("name"),
    person!("surname"),
    person!("qualified_investor"),
    person!("birthday"),
    person!("contact_email"),
    person!("patronymic"),
    person!("male"),
    person!("birth_place"),
    person!("inn"),
    person!("snils"),
    person!("legal_capacity"),
    person!("pass_series"),
    person!("pass_number"),
    person!("pass_issue_date"),
    person!("pass_issuer"),
    person!("pass_issuer_code"),
    person!("is_rf_taxpayer"),
    person!("pifs_portfolio_code"),
    person!("actuality_updated_at"),
    person!("tax_status"),
    person!("is_american_national"),
    person!("country"),
    person!("city"),
    person!("street"),
    person!("house"),
    person!("corps"),
    person!("flat"),
    person!("region"),
    person!("district"),
    address!("residential", "country"),
    address!("residential", "index"),
    address!("residential", "city"),
    address!("residential", "street"),
    address!("residential", "house"),
    address!("residential", "corps"),
    address!("residential", "flat"),
    address!("residential", "region"),
    address!("residential", "district"),
    address!("for_corresp", "country"),
    address!("for_corresp", "index"),
    address!("for_corresp", "city"),
    address!("for_corresp", "street"),
    address!("for_corresp", "house"),
    address!("for_corresp", "corps"),
    address!("for_corresp", "flat"),
    address!("for_corresp", "region"),
    address!("for_corresp", "district"),
];

/// Texto canónico de un valor JSON para el hash.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                let f = n.as_f64().unwrap_or_default();
                if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    (f as i64).to_string()
                } else {
                    // Display de f64 produce la representación decimal más corta que re-parsea igual
                    f.to_string()
                }
            }
        }
        Value::Array(_) | Value::Object(_) => value.to_string().trim().to_string(),
    }
}

/// Valores ya convertidos a texto de cada campo disparador, en orden.
pub fn resolve_trigger_fields(doc: &Map<String, Value>) -> IndexMap<&'static str, String> {
    TRIGGER_FIELDS.iter()
                  .map(|f| {
                      let value = f.sources.iter().find_map(|src| src.resolve(f.key, doc));
                      (f.key, value.map(stringify).unwrap_or_default())
                  })
                  .collect()
}

/// Trigger hash de un documento ya parseado.
pub fn trigger_hash_of(doc: &Map<String, Value>) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in resolve_trigger_fields(doc) {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"|");
    }
    format!("{:x}", hasher.finalize())
}

/// Trigger hash de un registro crudo. Falla si no es un objeto JSON.
pub fn compute_trigger_hash(raw: &RawRecord) -> Result<String, HashError> {
    Ok(trigger_hash_of(&raw.to_object()?))
}

/// Nivel de riesgo informado por la fuente (`risk_level`, luego
/// `person_info.risk_level`). No participa del hash; "" si falta.
pub fn extract_external_risk_level(doc: &Map<String, Value>) -> String {
    const KEY: &str = "risk_level";
    PERSON.iter()
          .find_map(|src| src.resolve(KEY, doc))
          .map(stringify)
          .unwrap_or_default()
}
