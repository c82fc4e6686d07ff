//! Planificador cron de trabajos periódicos (sync completo y recálculos).
//!
//! Un bucle tokio evalúa cada 30 s las expresiones cron registradas; los
//! trabajos vencidos se lanzan en su propia tarea y el trabajo bloqueante se
//! ejecuta con `spawn_blocking`. Un trabajo en curso no se relanza.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cron::Schedule;
use dashmap::DashMap;
use ledger_core::{LedgerStore, RecalcJobs};
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::SchedulerError;
use crate::fetcher::SourceClient;
use crate::orchestrator::{FullSyncRequest, SyncOrchestrator};

pub const TICK_INTERVAL: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &str;

    /// Ejecuta el trabajo hasta el final o hasta que `cancel` se dispare.
    async fn run(&self, cancel: CancellationToken) -> Result<(), SchedulerError>;
}

pub struct FullSyncJob<S, C> {
    orchestrator: Arc<SyncOrchestrator<S, C>>,
    request: FullSyncRequest,
}

impl<S, C> FullSyncJob<S, C> {
    pub fn new(orchestrator: Arc<SyncOrchestrator<S, C>>, request: FullSyncRequest) -> Self { Self { orchestrator, request } }
}

#[async_trait]
impl<S, C> ScheduledJob for FullSyncJob<S, C>
    where S: LedgerStore + 'static,
          C: SourceClient + 'static
{
    fn name(&self) -> &str { "full_sync" }

    async fn run(&self, cancel: CancellationToken) -> Result<(), SchedulerError> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let request = self.request.clone();
        tokio::task::spawn_blocking(move || orchestrator.full_sync(&request, &cancel)).await??;
        Ok(())
    }
}

pub struct RecalcJob<S> {
    jobs: Arc<RecalcJobs<S>>,
}

impl<S> RecalcJob<S> {
    pub fn new(jobs: Arc<RecalcJobs<S>>) -> Self { Self { jobs } }
}

#[async_trait]
impl<S: LedgerStore + 'static> ScheduledJob for RecalcJob<S> {
    fn name(&self) -> &str { "recalc" }

    async fn run(&self, _cancel: CancellationToken) -> Result<(), SchedulerError> {
        let jobs = Arc::clone(&self.jobs);
        tokio::task::spawn_blocking(move || jobs.recalc_all(Utc::now())).await??;
        Ok(())
    }
}

struct Registered {
    schedule: Schedule,
    job: Arc<dyn ScheduledJob>,
}

pub struct SyncScheduler {
    jobs: Vec<Registered>,
    started_at: DateTime<Utc>,
    last_triggered: DashMap<String, DateTime<Utc>>,
    in_flight: DashMap<String, Instant>,
}

impl Default for SyncScheduler {
    fn default() -> Self { Self::new() }
}

impl SyncScheduler {
    pub fn new() -> Self { Self::starting_at(Utc::now()) }

    /// Sin disparo previo, un trabajo solo vence en ocurrencias posteriores a `started_at`.
    pub fn starting_at(started_at: DateTime<Utc>) -> Self {
        Self { jobs: Vec::new(), started_at, last_triggered: DashMap::new(), in_flight: DashMap::new() }
    }

    pub fn register(&mut self, cron_expr: &str, job: Arc<dyn ScheduledJob>) -> Result<(), SchedulerError> {
        let schedule = Schedule::from_str(cron_expr).map_err(|e| SchedulerError::InvalidCron { expr: cron_expr.to_string(),
                                                                                                reason: e.to_string() })?;
        if self.jobs.iter().any(|r| r.job.name() == job.name()) {
            return Err(SchedulerError::DuplicateJob(job.name().to_string()));
        }
        info!("scheduler:register job={} cron='{cron_expr}'", job.name());
        self.jobs.push(Registered { schedule, job });
        Ok(())
    }

    pub fn job_names(&self) -> Vec<&str> { self.jobs.iter().map(|r| r.job.name()).collect() }

    pub fn is_in_flight(&self, name: &str) -> bool { self.in_flight.contains_key(name) }

    fn is_due(&self, name: &str, schedule: &Schedule, now: DateTime<Utc>) -> bool {
        let since = self.last_triggered.get(name).map(|t| *t).unwrap_or(self.started_at);
        schedule.after(&since).take(1).any(|next| next <= now)
    }

    /// Evalúa los trabajos registrados y lanza los vencidos.
    pub fn tick(self: &Arc<Self>, now: DateTime<Utc>, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for reg in &self.jobs {
            let name = reg.job.name().to_string();
            if !self.is_due(&name, &reg.schedule, now) {
                continue;
            }
            if let Some(started) = self.in_flight.get(&name) {
                warn!("scheduler:skip job={name} in_flight_s={}", started.elapsed().as_secs());
                continue;
            }
            self.in_flight.insert(name.clone(), Instant::now());
            self.last_triggered.insert(name.clone(), now);
            info!("scheduler:fire job={name}");

            let this = Arc::clone(self);
            let job = Arc::clone(&reg.job);
            let token = cancel.child_token();
            handles.push(tokio::spawn(async move {
                         let started = Instant::now();
                         match job.run(token).await {
                             Ok(()) => info!("scheduler:done job={name} elapsed_ms={}", started.elapsed().as_millis()),
                             Err(e) => error!("scheduler:failed job={name} error={e}"),
                         }
                         this.in_flight.remove(&name);
                     }));
        }
        handles
    }

    /// Bucle principal; termina cuando `shutdown` se cancela y los trabajos
    /// en curso han terminado.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!("scheduler:start jobs={:?}", self.job_names());
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        let mut running: Vec<JoinHandle<()>> = Vec::new();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    running.retain(|h| !h.is_finished());
                    running.extend(self.tick(Utc::now(), &shutdown));
                }
            }
        }
        info!("scheduler:stopping waiting={}", running.len());
        for handle in running {
            if let Err(e) = handle.await {
                error!("scheduler:join error={e}");
            }
        }
        info!("scheduler:stopped");
    }
}
