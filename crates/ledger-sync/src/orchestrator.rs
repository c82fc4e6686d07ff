//! Orquestación de la ingesta: staging, aplicación por página y
//! sincronización completa paginada.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use ledger_core::constants::DEFAULT_PER_PAGE;
use ledger_core::record::extract_external_id;
use ledger_core::{ClientVersionApplier, ContractApplier, LedgerError, LedgerStore, SkipReason, SourceKind, StagingRecord};
use log::{debug, info, warn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;
use crate::fetcher::{SourceClient, SourcePage};
use crate::stats::{FullSyncStats, PageReport, StageReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullSyncRequest {
    pub per_page: i64,
    pub sync_contracts: bool,
    /// Presupuesto total; se comprueba antes de cada página.
    pub timeout: Option<Duration>,
}

impl Default for FullSyncRequest {
    fn default() -> Self {
        Self { per_page: DEFAULT_PER_PAGE, sync_contracts: true, timeout: Some(Duration::from_secs(3600)) }
    }
}

pub struct SyncOrchestrator<S, C> {
    store: Arc<S>,
    source: Arc<C>,
}

impl<S, C> SyncOrchestrator<S, C>
    where S: LedgerStore,
          C: SourceClient
{
    pub fn new(store: Arc<S>, source: Arc<C>) -> Self { Self { store, source } }

    fn normalize_per_page(per_page: i64) -> i64 { if per_page > 0 { per_page } else { DEFAULT_PER_PAGE } }

    fn stage_records(&self, page: &SourcePage, now: DateTime<Utc>) -> Result<(u64, u64), LedgerError> {
        let mut dropped = 0u64;
        let mut rows = Vec::with_capacity(page.records.len());
        for rec in &page.records {
            let parsed = rec.to_object().map_err(SkipReason::from).and_then(|doc| extract_external_id(&doc).map(|id| (id, doc)));
            match parsed {
                Ok((id, doc)) => rows.push(StagingRecord { id, raw: Value::Object(doc), synced_at: now }),
                Err(reason) => {
                    debug!("stage:drop kind={} page={} reason={}", page.kind, page.meta.page, reason);
                    dropped += 1;
                }
            }
        }
        let saved = self.store.transaction(|tx| tx.upsert_staging(page.kind, &rows))?;
        Ok((saved as u64, dropped))
    }

    /// Descarga una página y la guarda en staging sin aplicarla.
    pub fn stage_page(&self, kind: SourceKind, page: i64, per_page: i64) -> Result<StageReport, SyncError> {
        let fetched = self.source.fetch_page(kind, page, Self::normalize_per_page(per_page))?;
        let (saved, dropped) = self.stage_records(&fetched, Utc::now())?;
        info!("stage_page:done kind={kind} page={page} saved={saved} dropped={dropped}");
        Ok(StageReport { kind, saved, dropped, meta: fetched.meta })
    }

    /// Descarga una página, la guarda en staging y la aplica al ledger.
    pub fn sync_page(&self, kind: SourceKind, page: i64, per_page: i64) -> Result<PageReport, SyncError> {
        let per_page = Self::normalize_per_page(per_page);
        let fetched = self.source.fetch_page(kind, page, per_page)?;
        let now = Utc::now();
        let (saved, _) = self.stage_records(&fetched, now)?;
        let (apply, _) = match kind {
            SourceKind::Persons => ClientVersionApplier.apply_page(&self.store, &fetched.records, now)?,
            SourceKind::Contracts => ContractApplier.apply_page(&self.store, &fetched.records, now)?,
        };
        let report = PageReport { kind,
                                  saved,
                                  applied: apply.applied(),
                                  created: apply.created,
                                  updated: apply.updated,
                                  unchanged: apply.unchanged,
                                  dropped: apply.dropped,
                                  page,
                                  total_pages: fetched.meta.total_pages,
                                  total_count: fetched.meta.total_count,
                                  per_page,
                                  apply };
        info!("sync_page:done kind={kind} page={page}/{} saved={} applied={} created={} updated={} dropped={}",
              report.total_pages,
              report.saved,
              report.applied,
              report.created,
              report.updated,
              report.dropped);
        Ok(report)
    }

    fn sync_stream(&self,
                   kind: SourceKind,
                   per_page: i64,
                   deadline: Option<Instant>,
                   cancel: &CancellationToken,
                   stats: &mut FullSyncStats)
                   -> Result<(), SyncError> {
        stats.open_stream(kind);
        let mut page = 1;
        let mut total_pages = 1;
        while page <= total_pages {
            let expired = deadline.is_some_and(|d| Instant::now() >= d);
            if cancel.is_cancelled() || expired {
                warn!("sync_full:cancelled run_id={} kind={kind} page={page} expired={expired}", stats.run_id);
                stats.finished_at = Some(Utc::now());
                return Err(SyncError::Cancelled { stats: Box::new(stats.clone()) });
            }
            match self.sync_page(kind, page, per_page) {
                Ok(report) => {
                    if page == 1 {
                        total_pages = report.total_pages.max(1);
                    }
                    stats.absorb(&report);
                }
                Err(source) => {
                    warn!("sync_full:page_failed run_id={} kind={kind} page={page} error={source}", stats.run_id);
                    stats.finished_at = Some(Utc::now());
                    return Err(SyncError::PageFailed { kind,
                                                       page,
                                                       stats: Box::new(stats.clone()),
                                                       source: Box::new(source) });
                }
            }
            page += 1;
        }
        Ok(())
    }

    /// Recorre todas las páginas de personas y, opcionalmente, de contratos.
    ///
    /// Las páginas ya aplicadas quedan confirmadas aunque una posterior falle
    /// o se cancele la ejecución.
    pub fn full_sync(&self, req: &FullSyncRequest, cancel: &CancellationToken) -> Result<FullSyncStats, SyncError> {
        let per_page = Self::normalize_per_page(req.per_page);
        let deadline = req.timeout.map(|t| Instant::now() + t);
        let mut stats = FullSyncStats::start(Utc::now());
        info!("sync_full:start run_id={} per_page={per_page} contracts={}", stats.run_id, req.sync_contracts);
        self.sync_stream(SourceKind::Persons, per_page, deadline, cancel, &mut stats)?;
        if req.sync_contracts {
            self.sync_stream(SourceKind::Contracts, per_page, deadline, cancel, &mut stats)?;
        }
        stats.finished_at = Some(Utc::now());
        info!("sync_full:done run_id={} pages={} applied={} created={} updated={} dropped={}",
              stats.run_id,
              stats.totals.pages,
              stats.totals.applied,
              stats.totals.created,
              stats.totals.updated,
              stats.totals.dropped);
        Ok(stats)
    }
}
