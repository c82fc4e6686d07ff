use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ledger_core::{ActorId, ClientVersionApplier, DraftRequest, InMemoryLedgerStore, LedgerError, LedgerQueries, RawRecord,
                  RecalcJobs, SecondPartEngine, SecondPartStatus, TransitionRequest};
use serde_json::json;

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() }

fn seeded(client: serde_json::Value) -> Arc<InMemoryLedgerStore> {
    let store = Arc::new(InMemoryLedgerStore::new());
    ClientVersionApplier.apply_page(&store, &[RawRecord::from_value(&client)], t0()).unwrap();
    store
}

fn transition(status: SecondPartStatus, actor: i64) -> TransitionRequest {
    TransitionRequest { status, actor: Some(ActorId(actor)), reason: None }
}

#[test]
fn first_contact_draft_submit_approve() {
    let store = seeded(json!({"id": 42, "name": "Ivan", "risk_level": "low"}));
    let engine = SecondPartEngine::new(store.clone());

    let draft = engine.create_draft_at(42,
                                       DraftRequest { risk_level: Some("low".into()), actor: Some(ActorId(7)), data: None },
                                       t0())
                      .unwrap();
    assert_eq!(draft.version, 1);
    assert_eq!(draft.status, SecondPartStatus::Draft);
    assert_eq!(draft.created_by, Some(ActorId(7)));
    assert_eq!(draft.due_at, Some(Utc.with_ymd_and_hms(2027, 3, 1, 10, 0, 0).unwrap()));
    assert_eq!(draft.data, json!({}));
    assert!(store.current_client(42).unwrap().unwrap().second_part_created);

    let t1 = t0() + Duration::days(2);
    let submitted = engine.transition_at(42, transition(SecondPartStatus::Submitted, 7), t1).unwrap();
    assert_eq!(submitted.version, 2);
    assert_eq!(submitted.updated_by, Some(ActorId(7)));

    let t2 = t0() + Duration::days(3);
    let approved = engine.transition_at(42, transition(SecondPartStatus::Approved, 9), t2).unwrap();
    assert_eq!(approved.version, 3);
    assert_eq!(approved.approved_by, Some(ActorId(9)));
    assert_eq!(approved.updated_by, None);
    assert_eq!(approved.due_at, Some(Utc.with_ymd_and_hms(2027, 3, 4, 10, 0, 0).unwrap()));
    assert!(!store.current_client(42).unwrap().unwrap().needs_second_part);

    let history = store.second_part_history(42).unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history.iter().filter(|r| r.is_current).count(), 1);
    assert!(history[..2].iter().all(|r| r.valid_to.is_some()));
}

#[test]
fn client_change_after_approval_reflags_client() {
    let store = seeded(json!({"id": 42, "name": "Ivan"}));
    let engine = SecondPartEngine::new(store.clone());
    engine.transition_at(42, transition(SecondPartStatus::Approved, 1), t0()).unwrap();
    assert!(!store.current_client(42).unwrap().unwrap().needs_second_part);

    let t1 = t0() + Duration::days(10);
    ClientVersionApplier.apply_page(&store, &[RawRecord::from_value(&json!({"id": 42, "name": "Ivan", "snils": "123"}))], t1)
                        .unwrap();
    let cur = store.current_client(42).unwrap().unwrap();
    assert_eq!(cur.version, 2);
    assert!(cur.needs_second_part);
    assert!(cur.second_part_created);

    // ya marcado por el applier: el barrido no vuelve a contarlo
    let recalc = RecalcJobs::new(store.clone());
    assert_eq!(recalc.recalc_needs_second_part(t1).unwrap(), 0);
}

#[test]
fn transition_without_workflow_row_auto_drafts_first() {
    let store = seeded(json!({"id": 3}));
    let engine = SecondPartEngine::new(store.clone());
    let row = engine.request_docs(3, Some(ActorId(5)), "need passport scan").unwrap();
    assert_eq!(row.version, 2);
    assert_eq!(row.status, SecondPartStatus::DocRequested);
    assert_eq!(row.reason, "need passport scan");

    let history = store.second_part_history(3).unwrap();
    assert_eq!(history[0].status, SecondPartStatus::Draft);
    assert_eq!(history[0].created_by, Some(ActorId(5)));
    assert_eq!(history[0].risk_level, "");
    assert_eq!(history[0].due_at, None);
}

#[test]
fn approve_with_high_risk_gives_one_year() {
    let store = seeded(json!({"id": 4}));
    let engine = SecondPartEngine::new(store.clone());
    engine.create_draft_at(4, DraftRequest { risk_level: Some("high".into()), ..Default::default() }, t0()).unwrap();
    let approved = engine.transition_at(4, transition(SecondPartStatus::Approved, 1), t0()).unwrap();
    assert_eq!(approved.due_at, Some(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()));
    assert_eq!(approved.risk_level, "high");
}

#[test]
fn redraft_inherits_data_unless_overridden() {
    let store = seeded(json!({"id": 8}));
    let engine = SecondPartEngine::new(store.clone());
    engine.create_draft_at(8, DraftRequest { data: Some(json!({"income": "A"})), ..Default::default() }, t0()).unwrap();
    let second = engine.create_draft_at(8, DraftRequest::default(), t0()).unwrap();
    assert_eq!(second.version, 2);
    assert_eq!(second.data, json!({"income": "A"}));
    let third = engine.create_draft_at(8, DraftRequest { data: Some(json!({"income": "B"})), ..Default::default() }, t0())
                      .unwrap();
    assert_eq!(third.data, json!({"income": "B"}));
}

#[test]
fn unknown_client_writes_nothing() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let engine = SecondPartEngine::new(store.clone());
    assert_eq!(engine.submit(404, None).unwrap_err(), LedgerError::ClientNotFound(404));
    assert_eq!(engine.create_draft(404, DraftRequest::default()).unwrap_err(), LedgerError::ClientNotFound(404));
    assert!(store.second_part_history(404).unwrap().is_empty());
}

#[test]
fn draft_is_not_a_transition_target() {
    let store = seeded(json!({"id": 1}));
    let engine = SecondPartEngine::new(store);
    let err = engine.transition(1, TransitionRequest { status: SecondPartStatus::Draft, actor: None, reason: None })
                    .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));
}

#[test]
fn leap_day_draft_is_due_on_march_first() {
    let store = seeded(json!({"id": 29, "name": "Leap"}));
    let engine = SecondPartEngine::new(store);
    let leap = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
    let draft = engine.create_draft_at(29, DraftRequest { risk_level: Some("high".into()), ..Default::default() }, leap)
                      .unwrap();
    assert_eq!(draft.due_at, Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()));
}
