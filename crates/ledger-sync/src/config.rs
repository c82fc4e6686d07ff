//! Configuración de la fuente externa y del scheduler desde variables de entorno.

use std::env;
use std::time::Duration;

use ledger_core::constants::DEFAULT_PER_PAGE;

use crate::error::FetchError;
use crate::orchestrator::FullSyncRequest;

pub const DEFAULT_SYNC_CRON: &str = "0 0 3 * * *";
pub const DEFAULT_RECALC_CRON: &str = "0 0 4 * * *";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl SourceConfig {
    /// `EXTERNAL_API_BASE_URL` (obligatoria), `EXTERNAL_API_TOKEN`,
    /// `EXTERNAL_API_TIMEOUT_SECS` (15).
    pub fn from_env() -> Result<Self, FetchError> {
        let base_url = env::var("EXTERNAL_API_BASE_URL").unwrap_or_default();
        if base_url.trim().is_empty() {
            return Err(FetchError::Config("EXTERNAL_API_BASE_URL is empty".into()));
        }
        Ok(Self { base_url: base_url.trim().trim_end_matches('/').to_string(),
                  token: env::var("EXTERNAL_API_TOKEN").ok().filter(|t| !t.is_empty()),
                  timeout: Duration::from_secs(parse_or("EXTERNAL_API_TIMEOUT_SECS", 15)) })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub sync_cron: String,
    pub recalc_cron: String,
    pub per_page: i64,
    pub sync_contracts: bool,
    pub sync_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { sync_cron: DEFAULT_SYNC_CRON.into(),
               recalc_cron: DEFAULT_RECALC_CRON.into(),
               per_page: DEFAULT_PER_PAGE,
               sync_contracts: true,
               sync_timeout: Duration::from_secs(3600) }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let per_page = env::var("SYNC_PER_PAGE").ok()
                                                .and_then(|v| v.parse::<i64>().ok())
                                                .filter(|n| *n > 0)
                                                .unwrap_or(d.per_page);
        Self { sync_cron: non_empty("SYNC_CRON").unwrap_or(d.sync_cron),
               recalc_cron: non_empty("RECALC_CRON").unwrap_or(d.recalc_cron),
               per_page,
               sync_contracts: env::var("SYNC_CONTRACTS").ok().and_then(|v| parse_bool(&v)).unwrap_or(d.sync_contracts),
               sync_timeout: Duration::from_secs(parse_or("SYNC_TIMEOUT_SECS", d.sync_timeout.as_secs())) }
    }

    pub fn full_sync_request(&self) -> FullSyncRequest {
        FullSyncRequest { per_page: self.per_page, sync_contracts: self.sync_contracts, timeout: Some(self.sync_timeout) }
    }
}

fn non_empty(key: &str) -> Option<String> { env::var(key).ok().filter(|v| !v.trim().is_empty()) }

fn parse_or(key: &str, default: u64) -> u64 { env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default) }

pub(crate) fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn scheduler_defaults() {
        let d = SchedulerConfig::default();
        assert_eq!(d.sync_cron, "0 0 3 * * *");
        assert_eq!(d.per_page, 100);
        assert!(d.sync_contracts);
    }
}
