//! Recálculo periódico de `needs_second_part`.
//!
//! Dos barridos independientes, cada uno en su propia transacción:
//! - obsolescencia: segunda parte vencida o ligada a otra versión del cliente.
//! - umbrales de edad: el cliente cumplió 20 o 45 años.
//!
//! Ambos sólo pasan la bandera de `false` a `true`; nunca la limpian.

use std::sync::Arc;

use chrono::{DateTime, Months, NaiveDate, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{AGE_THRESHOLDS_YEARS, BIRTH_DATE_FORMAT, PERSON_INFO_KEY};
use crate::errors::LedgerError;
use crate::store::LedgerStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalcReport {
    pub stale: u64,
    pub age: u64,
}

impl RecalcReport {
    pub fn total(&self) -> u64 { self.stale + self.age }
}

pub struct RecalcJobs<S> {
    store: Arc<S>,
}

impl<S: LedgerStore> RecalcJobs<S> {
    pub fn new(store: Arc<S>) -> Self { Self { store } }

    pub fn recalc_needs_second_part(&self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        let n = self.store.transaction(|tx| tx.flag_stale_second_parts(now))?;
        info!("recalc:stale affected={n}");
        Ok(n)
    }

    pub fn recalc_age_thresholds(&self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        let n = self.store.transaction(|tx| tx.flag_age_thresholds(now))?;
        info!("recalc:age affected={n}");
        Ok(n)
    }

    /// Ejecuta ambos barridos. Si el primero falla el segundo no se ejecuta.
    pub fn recalc_all(&self, now: DateTime<Utc>) -> Result<RecalcReport, LedgerError> {
        let report = RecalcReport { stale: self.recalc_needs_second_part(now)?,
                                    age: self.recalc_age_thresholds(now)? };
        info!("recalc:done stale={} age={} total={}", report.stale, report.age, report.total());
        Ok(report)
    }
}

/// Fecha `DD.MM.YYYY`; cualquier otro formato es `None`.
pub fn parse_birth_date(s: &str) -> Option<NaiveDate> { NaiveDate::parse_from_str(s.trim(), BIRTH_DATE_FORMAT).ok() }

/// Fecha de nacimiento del payload: `birthday` no vacío, si no
/// `person_info.birthday`.
pub fn birth_date_from_raw(raw: &Value) -> Option<NaiveDate> {
    let text = non_empty(raw.get("birthday")).or_else(|| non_empty(raw.get(PERSON_INFO_KEY).and_then(|pi| pi.get("birthday"))))?;
    parse_birth_date(text)
}

fn non_empty(v: Option<&Value>) -> Option<&str> { v.and_then(Value::as_str).filter(|s| !s.trim().is_empty()) }

/// `true` si a la fecha `today` ya se cumplió alguno de los umbrales de edad.
pub fn crossed_age_threshold(birth: NaiveDate, today: NaiveDate) -> bool {
    AGE_THRESHOLDS_YEARS.iter()
                        .filter_map(|years| birth.checked_add_months(Months::new(years * 12)))
                        .any(|limit| today >= limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, day).unwrap() }

    #[test]
    fn parses_dotted_dates_only() {
        assert_eq!(parse_birth_date("05.03.1990"), Some(d(1990, 3, 5)));
        assert_eq!(parse_birth_date("1990-03-05"), None);
        assert_eq!(parse_birth_date("31.02.1990"), None);
        assert_eq!(parse_birth_date(""), None);
    }

    #[test]
    fn birth_date_fallback_to_person_info() {
        assert_eq!(birth_date_from_raw(&json!({"birthday": "", "person_info": {"birthday": "01.01.2000"}})),
                   Some(d(2000, 1, 1)));
        assert_eq!(birth_date_from_raw(&json!({"birthday": "02.01.2000", "person_info": {"birthday": "01.01.2000"}})),
                   Some(d(2000, 1, 2)));
        assert_eq!(birth_date_from_raw(&json!({"name": "x"})), None);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let birth = d(2005, 6, 15);
        assert!(!crossed_age_threshold(birth, d(2025, 6, 14)));
        assert!(crossed_age_threshold(birth, d(2025, 6, 15)));
    }
}
