use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ledger_core::store::{ClientFilter, PageRequest};
use ledger_core::{ActorId, DraftRequest, LedgerError, LedgerQueries, RecalcJobs, SecondPartEngine};
use ledger_persistence::{build_pool_from_config, DbConfig, PersistenceError, PgLedgerStore, PoolProvider};
use ledger_sync::{FetchError, HttpFetcher, SchedulerConfig, SourceConfig, SyncError, SyncOrchestrator};
use log::info;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{Command, RecalcOnly, SyncCommand};

type Store = PgLedgerStore<PoolProvider>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid argument: {0}")]
    Usage(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("cannot render output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) | Self::Fetch(FetchError::Config(_)) | Self::Persistence(PersistenceError::Config(_)) => 2,
            Self::Ledger(LedgerError::ClientNotFound(_) | LedgerError::CheckNotFound(_) | LedgerError::InvalidInput(_)) => 4,
            _ => 5,
        }
    }
}

fn open_store() -> Result<Arc<Store>, CliError> {
    let cfg = DbConfig::from_env()?;
    let pool = build_pool_from_config(&cfg)?;
    Ok(Arc::new(PgLedgerStore::new(PoolProvider { pool })))
}

fn orchestrator(store: Arc<Store>) -> Result<SyncOrchestrator<Store, HttpFetcher>, CliError> {
    let fetcher = HttpFetcher::new(&SourceConfig::from_env()?)?;
    Ok(SyncOrchestrator::new(store, Arc::new(fetcher)))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Migrate => {
            // construir el pool corre las migraciones pendientes
            open_store()?;
            println!("migraciones aplicadas");
            Ok(())
        }
        Command::Sync { command } => run_sync(command),
        Command::Recalc { only } => {
            let jobs = RecalcJobs::new(open_store()?);
            let now = Utc::now();
            match only {
                Some(RecalcOnly::Stale) => println!("stale={}", jobs.recalc_needs_second_part(now)?),
                Some(RecalcOnly::Age) => println!("age={}", jobs.recalc_age_thresholds(now)?),
                None => print_json(&jobs.recalc_all(now)?)?,
            }
            Ok(())
        }
        Command::Draft { client_id, risk_level, data, actor } => {
            let data = data.map(|d| serde_json::from_str(&d))
                           .transpose()
                           .map_err(|e| CliError::Usage(format!("--data is not valid JSON: {e}")))?;
            let req = DraftRequest { risk_level, actor: actor.map(ActorId), data };
            print_json(&SecondPartEngine::new(open_store()?).create_draft(client_id, req)?)
        }
        Command::Submit { client_id, actor } => {
            print_json(&SecondPartEngine::new(open_store()?).submit(client_id, actor.map(ActorId))?)
        }
        Command::Approve { client_id, actor } => {
            print_json(&SecondPartEngine::new(open_store()?).approve(client_id, actor.map(ActorId))?)
        }
        Command::Reject { client_id, reason, actor } => {
            print_json(&SecondPartEngine::new(open_store()?).reject(client_id, actor.map(ActorId), &reason)?)
        }
        Command::RequestDocs { client_id, reason, actor } => {
            print_json(&SecondPartEngine::new(open_store()?).request_docs(client_id, actor.map(ActorId), &reason)?)
        }
        Command::History { client_id, second_part } => {
            let store = open_store()?;
            if second_part {
                print_json(&store.second_part_history(client_id)?)
            } else {
                let history = store.client_history(client_id)?;
                if history.is_empty() {
                    return Err(LedgerError::ClientNotFound(client_id).into());
                }
                print_json(&history)
            }
        }
        Command::Clients { needs_second_part, status, due_before, page, per_page } => {
            let filter = ClientFilter { needs_second_part, sp_status: status, due_before };
            print_json(&open_store()?.list_clients(&filter, PageRequest::new(page, per_page))?)
        }
    }
}

fn run_sync(command: SyncCommand) -> Result<(), CliError> {
    let orch = orchestrator(open_store()?)?;
    match command {
        SyncCommand::Page { kind, page, per_page, stage_only } => {
            if stage_only {
                print_json(&orch.stage_page(kind, page, per_page)?)
            } else {
                print_json(&orch.sync_page(kind, page, per_page)?)
            }
        }
        SyncCommand::Full { per_page, no_contracts, timeout_secs } => {
            let mut req = SchedulerConfig::from_env().full_sync_request();
            if let Some(n) = per_page {
                req.per_page = n;
            }
            if no_contracts {
                req.sync_contracts = false;
            }
            if let Some(secs) = timeout_secs {
                req.timeout = Some(Duration::from_secs(secs));
            }
            match orch.full_sync(&req, &CancellationToken::new()) {
                Ok(stats) => print_json(&stats),
                Err(e) => {
                    if let Some(partial) = e.partial_stats() {
                        info!("sync_full:partial pages={} applied={}", partial.totals.pages, partial.totals.applied);
                        print_json(partial)?;
                    }
                    Err(e.into())
                }
            }
        }
    }
}
