//! Daemon `ledgersyncd`: sincronización completa y recálculos según cron.
//!
//! Carga la configuración, construye el pool (corre migraciones), registra los
//! trabajos en el scheduler y se detiene con Ctrl-C esperando los trabajos en curso.

use std::sync::Arc;

use ledger_core::RecalcJobs;
use ledger_persistence::{build_pool_from_config, PgLedgerStore, PoolProvider};
use ledger_sync::{FullSyncJob, HttpFetcher, RecalcJob, SyncOrchestrator, SyncScheduler};
use ledgersync::{AppConfig, AppError};
use log::{error, info};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run().await {
        error!("daemon:fatal error={e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let cfg = AppConfig::from_env()?;
    let db = cfg.database.clone();
    let pool = tokio::task::spawn_blocking(move || build_pool_from_config(&db)).await??;
    let store = Arc::new(PgLedgerStore::new(PoolProvider { pool }));
    let fetcher = Arc::new(HttpFetcher::new(&cfg.source)?);
    let orchestrator = Arc::new(SyncOrchestrator::new(store.clone(), fetcher));

    let mut scheduler = SyncScheduler::new();
    scheduler.register(&cfg.scheduler.sync_cron,
                       Arc::new(FullSyncJob::new(orchestrator, cfg.scheduler.full_sync_request())))?;
    scheduler.register(&cfg.scheduler.recalc_cron, Arc::new(RecalcJob::new(Arc::new(RecalcJobs::new(store)))))?;

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(Arc::new(scheduler).run(shutdown.clone()));
    info!("daemon:ready sync_cron='{}' recalc_cron='{}'", cfg.scheduler.sync_cron, cfg.scheduler.recalc_cron);

    tokio::signal::ctrl_c().await?;
    info!("daemon:shutdown requested");
    shutdown.cancel();
    handle.await?;
    info!("daemon:stopped");
    Ok(())
}
