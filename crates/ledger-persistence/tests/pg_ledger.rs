use chrono::{Duration, TimeZone, Utc};
use ledger_core::store::{ClientFilter, PageRequest};
use ledger_core::{ActorId, ApplyOutcome, CheckRequest, CheckService, CheckStatus, ClientVersionApplier, ContractApplier,
                  DraftRequest, LedgerError, LedgerQueries, LedgerStore, RawRecord, RecalcJobs, SecondPartEngine,
                  SecondPartStatus, SourceKind, StagingRecord};
use serde_json::json;

use test_support::{unique_id, with_store};

fn skip() -> bool {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("skip (no DATABASE_URL)");
        return true;
    }
    false
}

#[test]
fn scd2_apply_roundtrip_on_postgres() {
    if skip() {
        return;
    }
    with_store(|store| {
        let id = unique_id();
        let t0 = Utc::now();
        let (r, _) = ClientVersionApplier.apply_page(&store, &[RawRecord::from_value(&json!({"id": id, "name": "Ivan"}))], t0)
                                         .unwrap();
        assert_eq!(r.created, 1);
        let (r, _) = ClientVersionApplier.apply_page(&store,
                                                     &[RawRecord::from_value(&json!({"id": id, "name": "Ivan", "x": 1}))],
                                                     t0 + Duration::seconds(1))
                                         .unwrap();
        assert_eq!(r.unchanged, 1);
        let (r, _) = ClientVersionApplier.apply_page(&store,
                                                     &[RawRecord::from_value(&json!({"id": id, "name": "Petr"}))],
                                                     t0 + Duration::seconds(2))
                                         .unwrap();
        assert_eq!(r.updated, 1);

        let history = store.client_history(id).unwrap();
        assert_eq!(history.iter().map(|c| c.version).collect::<Vec<_>>(), vec![1, 2]);
        assert!(history[0].valid_to.is_some() && !history[0].is_current);
        assert_eq!(store.current_client(id).unwrap().unwrap().fields.name, "Petr");
    });
}

#[test]
fn partial_unique_index_rejects_second_current_row() {
    if skip() {
        return;
    }
    with_store(|store| {
        let id = unique_id();
        ClientVersionApplier.apply_page(&store, &[RawRecord::from_value(&json!({"id": id}))], Utc::now()).unwrap();
        let err = store.transaction(|tx| {
                           let mut dup = tx.current_client(id)?.expect("current");
                           dup.version = 2;
                           tx.insert_client_version(&dup)
                       })
                       .unwrap_err();
        assert!(matches!(err, LedgerError::UniqueViolation(_)), "unexpected: {err:?}");
        assert_eq!(store.client_history(id).unwrap().len(), 1);
    });
}

#[test]
fn workflow_checks_and_recalc_on_postgres() {
    if skip() {
        return;
    }
    with_store(|store| {
        let id = unique_id();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        ClientVersionApplier.apply_page(&store, &[RawRecord::from_value(&json!({"id": id, "birthday": "01.01.1990"}))], t0)
                            .unwrap();
        let engine = SecondPartEngine::new(store.clone());
        engine.create_draft_at(id, DraftRequest { risk_level: Some("low".into()), ..Default::default() }, t0).unwrap();
        let approved = engine.transition_at(id,
                                            ledger_core::TransitionRequest { status: SecondPartStatus::Approved,
                                                                             actor: Some(ActorId(3)),
                                                                             reason: None },
                                            t0)
                             .unwrap();
        assert_eq!(approved.version, 2);
        assert_eq!(approved.due_at, Some(Utc.with_ymd_and_hms(2027, 1, 15, 12, 0, 0).unwrap()));
        assert!(!store.current_client(id).unwrap().unwrap().needs_second_part);

        let checks = CheckService::new(store.clone());
        let c = checks.create_check(CheckRequest { client_id: id,
                                                   second_part_version: 2,
                                                   kind: "sanctions".into(),
                                                   payload: None,
                                                   run_by: Some(ActorId(3)) })
                      .unwrap();
        let done = checks.record_check_result(c.id, CheckStatus::Failed, Some(json!({"hit": "list-a"}))).unwrap();
        assert!(done.finished_at.is_some());
        assert_eq!(store.list_checks(id, Some(2)).unwrap()[0].status, CheckStatus::Failed);

        // born 1990 → umbral de 20 años ya cumplido
        let recalc = RecalcJobs::new(store.clone());
        recalc.recalc_age_thresholds(t0).unwrap();
        assert!(store.current_client(id).unwrap().unwrap().needs_second_part);

        let listed = store.list_clients(&ClientFilter { sp_status: Some(SecondPartStatus::Approved), ..Default::default() },
                                        PageRequest::new(1, 500))
                          .unwrap();
        assert!(listed.total >= 1);
        assert!(listed.items
                      .iter()
                      .all(|i| i.second_part.as_ref().map(|s| s.status) == Some(SecondPartStatus::Approved)));
    });
}

#[test]
fn contract_and_staging_upserts() {
    if skip() {
        return;
    }
    with_store(|store| {
        let ext = unique_id();
        let now = Utc::now();
        let v1 = RawRecord::new(format!(r#"{{"id":{ext},"user_id":1,"status":"active"}}"#));
        let v2 = RawRecord::new(format!(r#"{{"id":{ext},"user_id":1,"status":"closed"}}"#));
        let (_, r) = ContractApplier.apply_page(&store, &[v1], now).unwrap();
        assert_eq!(r, vec![Ok(ApplyOutcome::Created)]);
        let internal = store.get_contract(ext).unwrap().unwrap().id;
        let (_, r) = ContractApplier.apply_page(&store, &[v2], now).unwrap();
        assert_eq!(r, vec![Ok(ApplyOutcome::Updated)]);
        let stored = store.get_contract(ext).unwrap().unwrap();
        assert_eq!((stored.id, stored.fields.status.as_str()), (internal, "closed"));

        let staged = vec![StagingRecord { id: ext, raw: json!({"id": ext, "v": 1}), synced_at: now },
                          StagingRecord { id: ext, raw: json!({"id": ext, "v": 2}), synced_at: now }];
        let saved = store.transaction(|tx| tx.upsert_staging(SourceKind::Contracts, &staged)).unwrap();
        assert_eq!(saved, 1);
        assert_eq!(store.staged_record(SourceKind::Contracts, ext).unwrap().unwrap().raw["v"], 2);
    });
}

#[test]
fn list_clients_joins_current_second_part_when_present() {
    if skip() {
        return;
    }
    with_store(|store| {
        let with_sp = unique_id();
        let without_sp = unique_id();
        let now = Utc::now();
        let page = [RawRecord::from_value(&json!({"id": with_sp, "city": "Kazan", "created_at": "2023-05-01"})),
                    RawRecord::from_value(&json!({"id": without_sp}))];
        ClientVersionApplier.apply_page(&store, &page, now).unwrap();
        SecondPartEngine::new(store.clone()).create_draft_at(with_sp, DraftRequest::default(), now).unwrap();

        let filter = ClientFilter { needs_second_part: Some(true), ..Default::default() };
        let mut found = Vec::new();
        for n in 1.. {
            let listed = store.list_clients(&filter, PageRequest::new(n, 500)).unwrap();
            if listed.items.is_empty() {
                break;
            }
            found.extend(listed.items.into_iter().filter(|i| i.client.client_id == with_sp || i.client.client_id == without_sp));
        }
        found.sort_by_key(|i| i.client.client_id);
        assert_eq!(found.len(), 2);
        let sp = found[0].second_part.as_ref().expect("draft joined");
        assert_eq!((sp.client_id, sp.status), (with_sp, SecondPartStatus::Draft));
        assert_eq!(found[0].client.fields.city, "Kazan");
        assert_eq!(found[0].client.fields.created_lk_at, "2023-05-01");
        assert!(found[1].second_part.is_none());
    });
}
