//! Reportes por página y acumulados de una sincronización completa.

use chrono::{DateTime, Utc};
use ledger_core::{ApplyReport, SourceKind};
use serde::Serialize;
use uuid::Uuid;

use crate::fetcher::PageMeta;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub kind: SourceKind,
    /// Filas distintas escritas en staging.
    pub saved: u64,
    /// Registros sin id válido, no guardados.
    pub dropped: u64,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageReport {
    pub kind: SourceKind,
    pub saved: u64,
    pub applied: u64,
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub dropped: u64,
    pub page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub per_page: i64,
    #[serde(skip)]
    pub apply: ApplyReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub pages: u64,
    pub saved: u64,
    pub applied: u64,
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub dropped: u64,
    pub total_pages: i64,
    pub total_count: i64,
}

impl StreamStats {
    pub fn absorb(&mut self, page: &PageReport) {
        self.pages += 1;
        self.saved += page.saved;
        self.applied += page.applied;
        self.created += page.created;
        self.updated += page.updated;
        self.unchanged += page.unchanged;
        self.dropped += page.dropped;
        self.total_pages = page.total_pages.max(self.total_pages);
        self.total_count = page.total_count.max(self.total_count);
    }

    /// Suma campo a campo (incluidos `total_pages` y `total_count`).
    fn add(&mut self, other: &StreamStats) {
        self.pages += other.pages;
        self.saved += other.saved;
        self.applied += other.applied;
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.dropped += other.dropped;
        self.total_pages += other.total_pages;
        self.total_count += other.total_count;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullSyncStats {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub persons: StreamStats,
    /// `None` si los contratos no se sincronizaron.
    pub contracts: Option<StreamStats>,
    /// Personas + contratos.
    pub totals: StreamStats,
}

impl FullSyncStats {
    pub fn start(started_at: DateTime<Utc>) -> Self {
        Self { run_id: Uuid::new_v4(), started_at, finished_at: None, persons: StreamStats::default(),
               contracts: None,
               totals: StreamStats::default() }
    }

    /// Garantiza que el stream exista en el reporte aunque no tenga páginas.
    pub fn open_stream(&mut self, kind: SourceKind) {
        if kind == SourceKind::Contracts {
            self.contracts.get_or_insert_with(StreamStats::default);
        }
    }

    /// Acumula una página en su stream y recalcula los totales.
    pub fn absorb(&mut self, page: &PageReport) {
        match page.kind {
            SourceKind::Persons => self.persons.absorb(page),
            SourceKind::Contracts => self.contracts.get_or_insert_with(StreamStats::default).absorb(page),
        }
        let mut totals = self.persons.clone();
        if let Some(c) = &self.contracts {
            totals.add(c);
        }
        self.totals = totals;
    }
}
