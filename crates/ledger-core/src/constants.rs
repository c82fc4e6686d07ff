//! Constantes de negocio compartidas.

/// Años hasta la siguiente revisión cuando el riesgo es bajo.
pub const LOW_RISK_REVIEW_YEARS: u32 = 3;
/// Años hasta la siguiente revisión para cualquier otro nivel de riesgo.
pub const DEFAULT_REVIEW_YEARS: u32 = 1;

/// Umbrales de edad (años) que obligan a renovar la segunda parte.
pub const AGE_THRESHOLDS_YEARS: [u32; 2] = [20, 45];

/// Formato de fecha de nacimiento que entrega el sistema externo.
pub const BIRTH_DATE_FORMAT: &str = "%d.%m.%Y";

pub const LOW_RISK: &str = "low";
pub const PERSON_INFO_KEY: &str = "person_info";

pub const DEFAULT_PER_PAGE: i64 = 100;
pub const MAX_PER_PAGE: i64 = 500;
