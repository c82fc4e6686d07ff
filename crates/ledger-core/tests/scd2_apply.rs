use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ledger_core::{ApplyOutcome, ClientVersionApplier, InMemoryLedgerStore, LedgerQueries, RawRecord, SkipReason};
use serde_json::json;

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap() }

fn rec(v: serde_json::Value) -> RawRecord { RawRecord::from_value(&v) }

#[test]
fn new_client_is_created_as_version_one() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let (report, results) = ClientVersionApplier.apply_page(&store,
                                                            &[rec(json!({"id": 42, "name": " Ivan ", "risk_level": "low"}))],
                                                            t0())
                                                .unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(results, vec![Ok(ApplyOutcome::Created)]);

    let cur = store.current_client(42).unwrap().expect("current row");
    assert_eq!(cur.version, 1);
    assert!(cur.needs_second_part);
    assert!(!cur.second_part_created);
    assert_eq!(cur.fields.name, "Ivan");
    assert_eq!(cur.external_risk_level, "low");
    assert_eq!(cur.hash, cur.trigger_hash);
    assert_eq!(cur.valid_to, None);
}

#[test]
fn irrelevant_change_is_unchanged_and_writes_nothing() {
    let store = Arc::new(InMemoryLedgerStore::new());
    ClientVersionApplier.apply_page(&store, &[rec(json!({"id": 42, "name": "Ivan", "updated_lk_at": "a"}))], t0())
                        .unwrap();
    let (report, _) = ClientVersionApplier.apply_page(&store,
                                                      &[rec(json!({"id": 42, "name": "Ivan", "updated_lk_at": "b"}))],
                                                      t0() + Duration::hours(1))
                                          .unwrap();
    assert_eq!(report.unchanged, 1);
    let history = store.client_history(42).unwrap();
    assert_eq!(history.len(), 1);
    // el payload almacenado sigue siendo el primero
    assert_eq!(history[0].raw["updated_lk_at"], "a");
}

#[test]
fn trigger_change_closes_current_and_inserts_next() {
    let store = Arc::new(InMemoryLedgerStore::new());
    ClientVersionApplier.apply_page(&store, &[rec(json!({"id": 42, "name": "Ivan"}))], t0()).unwrap();
    let later = t0() + Duration::days(1);
    let (report, _) = ClientVersionApplier.apply_page(&store, &[rec(json!({"id": 42, "name": "Ivan", "inn": "7701"}))], later)
                                          .unwrap();
    assert_eq!(report.updated, 1);

    let history = store.client_history(42).unwrap();
    assert_eq!(history.iter().map(|c| c.version).collect::<Vec<_>>(), vec![1, 2]);
    assert!(!history[0].is_current);
    assert_eq!(history[0].valid_to, Some(later));
    assert!(history[1].is_current);
    assert_eq!(history[1].fields.inn, "7701");
    assert_eq!(history.iter().filter(|c| c.is_current).count(), 1);
}

#[test]
fn repeated_changes_keep_versions_gapless() {
    let store = Arc::new(InMemoryLedgerStore::new());
    for (i, surname) in ["A", "B", "C", "C", "D"].iter().enumerate() {
        ClientVersionApplier.apply_page(&store, &[rec(json!({"id": 5, "surname": surname}))], t0() + Duration::minutes(i as i64))
                            .unwrap();
    }
    let versions: Vec<i32> = store.client_history(5).unwrap().iter().map(|c| c.version).collect();
    assert_eq!(versions, vec![1, 2, 3, 4]);
    for row in store.client_history(5).unwrap().iter().filter(|c| !c.is_current) {
        assert!(row.valid_to.is_some());
    }
}

#[test]
fn bad_records_are_dropped_without_aborting_the_page() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let page = vec![rec(json!({"name": "no id"})),
                    rec(json!({"id": 0})),
                    RawRecord::new("[1,2,3]"),
                    rec(json!({"id": 7, "name": "ok"}))];
    let (report, results) = ClientVersionApplier.apply_page(&store, &page, t0()).unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.dropped, 3);
    assert_eq!(report.skipped.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(results[0], Err(SkipReason::MissingId));
    assert!(matches!(results[1], Err(SkipReason::InvalidId(_))));
    assert!(matches!(results[2], Err(SkipReason::Malformed(_))));
    assert!(store.current_client(7).unwrap().is_some());
}

#[test]
fn same_client_twice_in_one_page_creates_then_updates() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let page = vec![rec(json!({"id": 9, "name": "A"})), rec(json!({"id": 9, "name": "B"}))];
    let (report, _) = ClientVersionApplier.apply_page(&store, &page, t0()).unwrap();
    assert_eq!((report.created, report.updated), (1, 1));
    assert_eq!(store.current_client(9).unwrap().unwrap().version, 2);
}

#[test]
fn extracts_timestamps_and_address_scalars() {
    let store = Arc::new(InMemoryLedgerStore::new());
    ClientVersionApplier.apply_page(&store,
                                    &[rec(json!({"id": 1,
                                                 "created_at": "2023-05-01T10:00:00Z",
                                                 "updated_at": "2024-01-01T00:00:00Z",
                                                 "city": " Kazan ",
                                                 "street": "Lenina",
                                                 "person_info": {"country": "RU", "house": "5"}}))],
                                    t0())
                        .unwrap();
    let f = store.current_client(1).unwrap().unwrap().fields;
    assert_eq!(f.created_lk_at, "2023-05-01T10:00:00Z");
    assert_eq!(f.updated_lk_at, "2024-01-01T00:00:00Z");
    assert_eq!(f.city, "Kazan");
    assert_eq!(f.street, "Lenina");
    assert_eq!(f.country, "RU");
    assert_eq!(f.house, "5");
    assert_eq!(f.region, "");
}
