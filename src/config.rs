//! Configuración central del daemon.
//! Se lee una sola vez al arrancar (tras cargar `.env`) y se pasa explícitamente.

use std::str::FromStr;

use cron::Schedule;
use ledger_persistence::DbConfig;
use ledger_sync::{SchedulerConfig, SourceConfig};

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DbConfig,
    pub source: SourceConfig,
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        ledger_persistence::init_dotenv();
        let cfg = Self { database: DbConfig::from_env()?, source: SourceConfig::from_env()?, scheduler: SchedulerConfig::from_env() };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Falla pronto si alguna expresión cron no es válida.
    pub fn validate(&self) -> Result<(), AppError> {
        for (key, expr) in [("SYNC_CRON", &self.scheduler.sync_cron), ("RECALC_CRON", &self.scheduler.recalc_cron)] {
            Schedule::from_str(expr).map_err(|e| AppError::Config(format!("{key}='{expr}': {e}")))?;
        }
        Ok(())
    }
}
