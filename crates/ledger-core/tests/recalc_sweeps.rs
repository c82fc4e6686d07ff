use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ledger_core::{ActorId, ClientVersionApplier, InMemoryLedgerStore, LedgerQueries, LedgerStore, RawRecord, RecalcJobs,
                  RecalcReport, SecondPartEngine};
use serde_json::json;

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() }

fn store_with(records: &[serde_json::Value]) -> Arc<InMemoryLedgerStore> {
    let store = Arc::new(InMemoryLedgerStore::new());
    let page: Vec<RawRecord> = records.iter().map(RawRecord::from_value).collect();
    ClientVersionApplier.apply_page(&store, &page, t0()).unwrap();
    store
}

fn approve_all(store: &Arc<InMemoryLedgerStore>, ids: &[i64], at: DateTime<Utc>) {
    let engine = SecondPartEngine::new(store.clone());
    for id in ids {
        engine.transition_at(*id,
                             ledger_core::TransitionRequest { status: ledger_core::SecondPartStatus::Approved,
                                                              actor: Some(ActorId(1)),
                                                              reason: None },
                             at)
              .unwrap();
    }
}

#[test]
fn expired_due_date_reflags_client() {
    let store = store_with(&[json!({"id": 1})]);
    approve_all(&store, &[1], t0());
    let recalc = RecalcJobs::new(store.clone());

    assert_eq!(recalc.recalc_needs_second_part(t0() + Duration::days(30)).unwrap(), 0);
    // sin riesgo → vence al año
    assert_eq!(recalc.recalc_needs_second_part(t0() + Duration::days(366)).unwrap(), 1);
    assert!(store.current_client(1).unwrap().unwrap().needs_second_part);
    // idempotente
    assert_eq!(recalc.recalc_needs_second_part(t0() + Duration::days(400)).unwrap(), 0);
}

#[test]
fn age_sweep_flags_only_crossed_thresholds() {
    let store = store_with(&[json!({"id": 1, "birthday": "01.06.2004"}),
                             json!({"id": 2, "person_info": {"birthday": "02.06.2004"}}),
                             json!({"id": 3, "birthday": "not a date"}),
                             json!({"id": 4})]);
    approve_all(&store, &[1, 2, 3, 4], t0());
    let recalc = RecalcJobs::new(store.clone());

    // 2024-06-01: cliente 1 cumple 20 hoy; cliente 2 mañana
    assert_eq!(recalc.recalc_age_thresholds(t0()).unwrap(), 1);
    assert!(store.current_client(1).unwrap().unwrap().needs_second_part);
    assert!(!store.current_client(2).unwrap().unwrap().needs_second_part);
    assert_eq!(recalc.recalc_age_thresholds(t0() + Duration::days(1)).unwrap(), 1);
    assert!(!store.current_client(3).unwrap().unwrap().needs_second_part);
    assert!(!store.current_client(4).unwrap().unwrap().needs_second_part);
}

#[test]
fn recalc_all_reports_both_sweeps() {
    let store = store_with(&[json!({"id": 1}), json!({"id": 2, "birthday": "01.01.1970"})]);
    approve_all(&store, &[1, 2], t0());
    let report = RecalcJobs::new(store).recalc_all(t0() + Duration::days(400)).unwrap();
    // cliente 2 vence por fecha primero; el barrido de edad ya no lo cuenta
    assert_eq!(report, RecalcReport { stale: 2, age: 0 });
}

#[test]
fn version_drift_reflags_cleared_client() {
    let store = store_with(&[json!({"id": 1, "name": "Ana"})]);
    approve_all(&store, &[1], t0());
    ClientVersionApplier.apply_page(&store, &[RawRecord::from_value(&json!({"id": 1, "name": "Anna"}))], t0())
                        .unwrap();
    store.transaction(|tx| tx.clear_needs_second_part(1)).unwrap();
    let cur = store.current_client(1).unwrap().unwrap();
    assert_eq!(cur.version, 2);
    assert!(!cur.needs_second_part);
    assert_eq!(store.current_second_part(1).unwrap().unwrap().client_version, 1);

    let recalc = RecalcJobs::new(store.clone());
    // due_at aún lejano: solo la versión distinta dispara
    assert_eq!(recalc.recalc_needs_second_part(t0() + Duration::days(1)).unwrap(), 1);
    assert!(store.current_client(1).unwrap().unwrap().needs_second_part);
    assert_eq!(recalc.recalc_needs_second_part(t0() + Duration::days(1)).unwrap(), 0);
}

#[test]
fn blank_birthday_falls_back_to_person_info() {
    let store = store_with(&[json!({"id": 5, "birthday": "   ", "person_info": {"birthday": "01.06.2004"}})]);
    approve_all(&store, &[5], t0());
    assert_eq!(RecalcJobs::new(store.clone()).recalc_age_thresholds(t0()).unwrap(), 1);
    assert!(store.current_client(5).unwrap().unwrap().needs_second_part);
}
