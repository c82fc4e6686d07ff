use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ledger_core::{InMemoryLedgerStore, LedgerQueries, SourceKind};
use ledger_sync::fetcher::decode_page;
use ledger_sync::{FetchError, FullSyncRequest, SourceClient, SourcePage, SyncError, SyncOrchestrator};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Fuente en memoria: respuestas por (kind, page) y cancelación opcional
/// tras un número de llamadas.
#[derive(Default)]
struct FakeSource {
    pages: HashMap<(SourceKind, i64), Result<String, FetchError>>,
    calls: Mutex<Vec<(SourceKind, i64)>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl FakeSource {
    fn page(mut self, kind: SourceKind, page: i64, total_pages: i64, records: Vec<Value>) -> Self {
        let key = match kind {
            SourceKind::Persons => "users",
            SourceKind::Contracts => "contracts",
        };
        let body = json!({"success": true, "total_count": records.len(), "per_page": 100,
                          "current_page": page, "total_pages": total_pages, key: records});
        self.pages.insert((kind, page), Ok(body.to_string()));
        self
    }

    fn failing(mut self, kind: SourceKind, page: i64, err: FetchError) -> Self {
        self.pages.insert((kind, page), Err(err));
        self
    }

    fn calls(&self) -> Vec<(SourceKind, i64)> { self.calls.lock().unwrap().clone() }
}

impl SourceClient for FakeSource {
    fn fetch_page(&self, kind: SourceKind, page: i64, _per_page: i64) -> Result<SourcePage, FetchError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((kind, page));
            calls.len()
        };
        if let Some((after, token)) = &self.cancel_after {
            if n >= *after {
                token.cancel();
            }
        }
        match self.pages.get(&(kind, page)) {
            Some(Ok(body)) => decode_page(kind, body),
            Some(Err(e)) => Err(e.clone()),
            None => Err(FetchError::Status { code: 404, body: format!("no page {page}") }),
        }
    }
}

fn orchestrator(source: FakeSource) -> (Arc<InMemoryLedgerStore>, Arc<FakeSource>, SyncOrchestrator<InMemoryLedgerStore, FakeSource>) {
    let store = Arc::new(InMemoryLedgerStore::new());
    let source = Arc::new(source);
    let orch = SyncOrchestrator::new(store.clone(), source.clone());
    (store, source, orch)
}

fn no_deadline(sync_contracts: bool) -> FullSyncRequest { FullSyncRequest { per_page: 100, sync_contracts, timeout: None } }

#[test]
fn full_sync_walks_every_page_of_both_streams() {
    let source = FakeSource::default().page(SourceKind::Persons, 1, 2, vec![json!({"id": 1, "name": "A"}), json!({"name": "no id"})])
                                      .page(SourceKind::Persons, 2, 2, vec![json!({"id": 2, "name": "B"})])
                                      .page(SourceKind::Contracts, 1, 1, vec![json!({"id": 900, "user_id": 1, "status": "active"})]);
    let (store, source, orch) = orchestrator(source);

    let stats = orch.full_sync(&no_deadline(true), &CancellationToken::new()).unwrap();

    assert_eq!(source.calls(), vec![(SourceKind::Persons, 1), (SourceKind::Persons, 2), (SourceKind::Contracts, 1)]);
    assert_eq!(stats.persons.pages, 2);
    assert_eq!(stats.persons.created, 2);
    assert_eq!(stats.persons.dropped, 1);
    assert_eq!(stats.persons.saved, 2);
    let contracts = stats.contracts.as_ref().expect("contracts stream");
    assert_eq!(contracts.created, 1);
    assert!(stats.finished_at.is_some());
    assert_eq!((stats.totals.pages, stats.totals.saved, stats.totals.created, stats.totals.dropped), (3, 3, 3, 1));
    assert_eq!(stats.totals.applied, stats.persons.applied + contracts.applied);
    let rendered = serde_json::to_value(&stats).unwrap();
    assert_eq!(rendered["totals"]["created"], 3);
    assert_eq!(rendered["totals"]["unchanged"], 0);

    assert!(store.current_client(1).unwrap().is_some());
    assert!(store.current_client(2).unwrap().is_some());
    assert!(store.staged_record(SourceKind::Persons, 2).unwrap().is_some());
    assert_eq!(store.get_contract(900).unwrap().unwrap().fields.user_id, Some(1));
}

#[test]
fn contracts_are_skipped_when_disabled() {
    let source = FakeSource::default().page(SourceKind::Persons, 1, 1, vec![json!({"id": 1})]);
    let (_, source, orch) = orchestrator(source);
    let stats = orch.full_sync(&no_deadline(false), &CancellationToken::new()).unwrap();
    assert!(stats.contracts.is_none());
    assert_eq!(source.calls(), vec![(SourceKind::Persons, 1)]);
}

#[test]
fn zero_total_pages_means_a_single_page() {
    let source = FakeSource::default().page(SourceKind::Persons, 1, 0, vec![json!({"id": 7})]);
    let (store, source, orch) = orchestrator(source);
    let stats = orch.full_sync(&no_deadline(false), &CancellationToken::new()).unwrap();
    assert_eq!(stats.persons.pages, 1);
    assert_eq!(source.calls().len(), 1);
    assert!(store.current_client(7).unwrap().is_some());
}

#[test]
fn cancellation_keeps_committed_pages() {
    let token = CancellationToken::new();
    let mut source = FakeSource::default().page(SourceKind::Persons, 1, 3, vec![json!({"id": 1})])
                                          .page(SourceKind::Persons, 2, 3, vec![json!({"id": 2})])
                                          .page(SourceKind::Persons, 3, 3, vec![json!({"id": 3})]);
    source.cancel_after = Some((1, token.clone()));
    let (store, source, orch) = orchestrator(source);

    let err = orch.full_sync(&no_deadline(true), &token).unwrap_err();
    let SyncError::Cancelled { stats } = &err else { panic!("expected cancellation, got {err:?}") };
    assert_eq!(stats.persons.pages, 1);
    assert_eq!(err.partial_stats().unwrap().persons.created, 1);
    assert_eq!(source.calls(), vec![(SourceKind::Persons, 1)]);
    assert!(store.current_client(1).unwrap().is_some());
    assert!(store.current_client(2).unwrap().is_none());
}

#[test]
fn expired_budget_stops_before_first_page() {
    let source = FakeSource::default().page(SourceKind::Persons, 1, 1, vec![json!({"id": 1})]);
    let (_, source, orch) = orchestrator(source);
    let req = FullSyncRequest { per_page: 100, sync_contracts: true, timeout: Some(Duration::ZERO) };
    let err = orch.full_sync(&req, &CancellationToken::new()).unwrap_err();
    assert!(matches!(err, SyncError::Cancelled { .. }));
    assert!(source.calls().is_empty());
}

#[test]
fn page_failure_reports_page_and_partial_stats() {
    let source = FakeSource::default().page(SourceKind::Persons, 1, 3, vec![json!({"id": 1})])
                                      .failing(SourceKind::Persons, 2, FetchError::Status { code: 400, body: "bad".into() });
    let (store, _, orch) = orchestrator(source);

    let err = orch.full_sync(&no_deadline(true), &CancellationToken::new()).unwrap_err();
    match &err {
        SyncError::PageFailed { kind, page, stats, source } => {
            assert_eq!(*kind, SourceKind::Persons);
            assert_eq!(*page, 2);
            assert_eq!(stats.persons.pages, 1);
            assert!(matches!(source.as_ref(), SyncError::Fetch(FetchError::Status { code: 400, .. })));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(store.current_client(1).unwrap().is_some());
}

#[test]
fn stage_page_only_writes_staging() {
    let source = FakeSource::default().page(SourceKind::Persons,
                                            1,
                                            1,
                                            vec![json!({"id": 5, "name": "old"}), json!({"id": 5, "name": "new"}), json!({"id": "x"})]);
    let (store, _, orch) = orchestrator(source);

    let report = orch.stage_page(SourceKind::Persons, 1, 0).unwrap();
    assert_eq!(report.saved, 1);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.meta.total_pages, 1);
    let staged = store.staged_record(SourceKind::Persons, 5).unwrap().unwrap();
    assert_eq!(staged.raw["name"], "new");
    assert!(store.current_client(5).unwrap().is_none());
}

#[test]
fn sync_page_reports_apply_outcomes() {
    let source = FakeSource::default().page(SourceKind::Persons, 1, 4, vec![json!({"id": 1}), json!({"id": 0})]);
    let (_, _, orch) = orchestrator(source);

    let first = orch.sync_page(SourceKind::Persons, 1, 50).unwrap();
    assert_eq!((first.created, first.dropped, first.applied), (1, 1, 1));
    assert_eq!((first.page, first.total_pages, first.per_page), (1, 4, 50));

    let again = orch.sync_page(SourceKind::Persons, 1, 50).unwrap();
    assert_eq!(again.unchanged, 1);
    assert_eq!(again.created, 0);
}
