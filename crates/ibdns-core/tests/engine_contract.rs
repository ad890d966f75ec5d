//! Contract Test: Plan/Apply Engine
//!
//! Verifies how the engine turns desired records and stored state into
//! reconciler calls.
//!
//! Constraints verified:
//! - A second apply of the same records makes no remote calls
//! - Immutable changes replace, mutable changes update in place
//! - One failing resource does not stop the others
//! - State is written after every resource and flushed once per run
//! - State store failures abort the run
//! - A desired type that does not parse never reaches the store

mod common;

use common::*;
use ibdns_core::engine::{Action, DEFAULT_EVENT_CAPACITY, Engine, EngineEvent, PlannedAction};
use ibdns_core::record::RecordDescriptor;
use ibdns_core::Error;
use std::collections::BTreeMap;
use tokio_test::{assert_err, assert_ok};

fn engine(store: &MockRecordStore, state: &RecordingStateStore) -> Engine {
    let (engine, _event_rx) = Engine::new(
        reconciler(store),
        Box::new(state.clone()),
        DEFAULT_EVENT_CAPACITY,
    );
    engine
}

fn desired(records: &[(&str, RecordDescriptor)]) -> BTreeMap<String, RecordDescriptor> {
    records
        .iter()
        .map(|(name, desc)| (name.to_string(), desc.clone()))
        .collect()
}

fn pool() -> RecordDescriptor {
    RecordDescriptor::new("HOST", "db", "example.com", "10.0.0.0/24").with_next_available_ip(true)
}

#[tokio::test]
async fn first_apply_creates_and_second_apply_is_a_no_op() {
    let store = MockRecordStore::new();
    let state = RecordingStateStore::new();
    let engine = engine(&store, &state);
    let want = desired(&[("web", a_record()), ("db", pool())]);

    let report = assert_ok!(engine.apply(&want).await);
    assert!(report.is_success());
    assert_eq!(report.changed(), 2);
    assert_eq!(report.outcome("web").map(|o| o.action), Some(Action::Create));

    let db = state.descriptor("db").await.unwrap();
    assert!(db.is_created());
    assert_eq!(db.value, "10.0.0.0/24");
    assert_eq!(db.ipv4addr.as_deref(), Some("10.0.0.10"));

    let calls_after_create = store.call_count();
    let report = assert_ok!(engine.apply(&want).await);
    assert!(report.outcomes.iter().all(|o| o.action == Action::NoOp));
    assert_eq!(store.call_count(), calls_after_create);
    assert_eq!(store.created_bodies().len(), 2);
}

#[tokio::test]
async fn plan_all_covers_desired_and_stored_names() {
    let store = MockRecordStore::new();
    let state = RecordingStateStore::new();
    let engine = engine(&store, &state);
    assert_ok!(engine.apply(&desired(&[("old", a_record())])).await);

    let planned = assert_ok!(engine.plan_all(&desired(&[("new", pool())])).await);

    assert_eq!(
        planned,
        vec![
            PlannedAction {
                resource: "new".to_string(),
                action: Action::Create,
            },
            PlannedAction {
                resource: "old".to_string(),
                action: Action::Delete,
            },
        ]
    );
}

#[tokio::test]
async fn value_change_updates_in_place() {
    let store = MockRecordStore::new();
    let state = RecordingStateStore::new();
    let engine = engine(&store, &state);
    assert_ok!(engine.apply(&desired(&[("web", a_record())])).await);
    let id = state.descriptor("web").await.unwrap().id;

    let moved = RecordDescriptor::new("A", "www", "example.com", "10.0.0.6");
    let report = assert_ok!(engine.apply(&desired(&[("web", moved)])).await);

    assert_eq!(report.outcome("web").map(|o| o.action), Some(Action::Update));
    let web = state.descriptor("web").await.unwrap();
    assert_eq!(web.id, id);
    assert_eq!(web.ipv4addr.as_deref(), Some("10.0.0.6"));
    assert!(store.deleted_ids().is_empty());
}

#[tokio::test]
async fn name_change_replaces_the_record() {
    let store = MockRecordStore::new();
    let state = RecordingStateStore::new();
    let engine = engine(&store, &state);
    assert_ok!(engine.apply(&desired(&[("web", a_record())])).await);
    let old_id = state.descriptor("web").await.unwrap().id.unwrap();

    let renamed = RecordDescriptor::new("A", "web", "example.com", "10.0.0.5");
    let report = assert_ok!(engine.apply(&desired(&[("web", renamed)])).await);

    assert_eq!(report.outcome("web").map(|o| o.action), Some(Action::Replace));
    assert_eq!(store.deleted_ids(), vec![old_id.clone()]);

    let web = state.descriptor("web").await.unwrap();
    assert_ne!(web.id.as_deref(), Some(old_id.as_str()));
    assert_eq!(web.fqdn.as_deref(), Some("web.example.com"));
    assert_eq!(store.record_count(), 1);
}

#[tokio::test]
async fn removed_resource_is_deleted() {
    let store = MockRecordStore::new();
    let state = RecordingStateStore::new();
    let engine = engine(&store, &state);
    assert_ok!(
        engine
            .apply(&desired(&[("web", a_record()), ("db", pool())]))
            .await
    );

    let report = assert_ok!(engine.apply(&desired(&[("web", a_record())])).await);

    assert_eq!(report.outcome("db").map(|o| o.action), Some(Action::Delete));
    assert!(state.descriptor("db").await.is_none());
    assert_eq!(store.record_count(), 1);
}

#[tokio::test]
async fn failing_resource_does_not_stop_the_others() {
    let store = MockRecordStore::new();
    let state = RecordingStateStore::new();
    let engine = engine(&store, &state);
    let mail = RecordDescriptor::new("MX", "mail", "example.com", "10");

    let report = assert_ok!(
        engine
            .apply(&desired(&[("mail", mail), ("web", a_record())]))
            .await
    );

    assert!(!report.is_success());
    let failed: Vec<_> = report.failures().map(|o| o.resource.as_str()).collect();
    assert_eq!(failed, vec!["mail"]);
    assert!(matches!(
        report.outcome("mail").map(|o| &o.result),
        Some(Err(Error::UnknownType(_)))
    ));
    assert!(state.descriptor("mail").await.is_none());
    assert!(state.descriptor("web").await.is_some());
}

#[tokio::test]
async fn mistyped_type_on_managed_resource_leaves_record_alone() {
    let store = MockRecordStore::new();
    let state = RecordingStateStore::new();
    let engine = engine(&store, &state);
    assert_ok!(engine.apply(&desired(&[("web", a_record())])).await);
    let calls_before = store.call_count();

    let typo = RecordDescriptor::new("AA", "www", "example.com", "10.0.0.5");
    let report = assert_ok!(engine.apply(&desired(&[("web", typo)])).await);

    assert!(matches!(
        report.outcome("web").map(|o| &o.result),
        Some(Err(Error::UnknownType(_)))
    ));
    assert_eq!(store.call_count(), calls_before);
    assert!(store.deleted_ids().is_empty());
    assert_eq!(store.record_count(), 1);

    let web = state.descriptor("web").await.unwrap();
    assert_eq!(web.record_type, "A");
    assert!(web.is_created());
}

#[tokio::test]
async fn created_record_is_tracked_even_when_read_back_fails() {
    let store = MockRecordStore::new();
    let state = RecordingStateStore::new();
    let engine = engine(&store, &state);
    store.fail(StoreOp::Get, "connection reset");

    let report = assert_ok!(engine.apply(&desired(&[("web", a_record())])).await);
    assert!(!report.is_success());

    let web = state.descriptor("web").await.unwrap();
    assert!(web.is_created());
    assert!(web.fqdn.is_none());

    store.recover(StoreOp::Get);
    let report = assert_ok!(engine.refresh().await);
    assert!(report.is_success());

    let web = state.descriptor("web").await.unwrap();
    assert_eq!(web.fqdn.as_deref(), Some("www.example.com"));
    assert_eq!(store.created_bodies().len(), 1);
}

#[tokio::test]
async fn state_is_written_per_resource_and_flushed_per_run() {
    let store = MockRecordStore::new();
    let state = RecordingStateStore::new();
    let engine = engine(&store, &state);

    assert_ok!(
        engine
            .apply(&desired(&[("web", a_record()), ("db", pool())]))
            .await
    );

    assert_eq!(state.set_call_count(), 2);
    assert_eq!(state.flush_call_count(), 1);
}

#[tokio::test]
async fn state_store_failure_aborts_the_run() {
    let store = MockRecordStore::new();
    let state = RecordingStateStore::new();
    state.fail_writes();
    let engine = engine(&store, &state);

    let err = assert_err!(engine.apply(&desired(&[("web", a_record())])).await);

    assert!(matches!(err, Error::StateStore(_)));
    assert_eq!(store.created_bodies().len(), 1);
}

#[tokio::test]
async fn destroy_removes_named_or_all_resources() {
    let store = MockRecordStore::new();
    let state = RecordingStateStore::new();
    let engine = engine(&store, &state);
    assert_ok!(
        engine
            .apply(&desired(&[("web", a_record()), ("db", pool())]))
            .await
    );

    let report = assert_ok!(engine.destroy(&["db".to_string()]).await);
    assert!(report.is_success());
    assert!(state.descriptor("db").await.is_none());
    assert!(state.descriptor("web").await.is_some());

    let report = assert_ok!(engine.destroy(&["missing".to_string()]).await);
    assert!(!report.is_success());

    let report = assert_ok!(engine.destroy(&[]).await);
    assert!(report.is_success());
    assert_eq!(report.changed(), 1);
    assert_eq!(store.record_count(), 0);
}

#[tokio::test]
async fn destroy_keeps_state_when_record_is_already_gone() {
    let store = MockRecordStore::new();
    let state = RecordingStateStore::new();
    let engine = engine(&store, &state);
    assert_ok!(engine.apply(&desired(&[("web", a_record())])).await);
    let id = state.descriptor("web").await.unwrap().id.unwrap();
    store.remove_out_of_band(&id);

    let report = assert_ok!(engine.destroy(&[]).await);

    assert!(matches!(
        report.outcome("web").map(|o| &o.result),
        Some(Err(Error::NotFound(_)))
    ));
    assert!(state.descriptor("web").await.is_some());
}

#[tokio::test]
async fn forget_drops_state_without_touching_the_store() {
    let store = MockRecordStore::new();
    let state = RecordingStateStore::new();
    let engine = engine(&store, &state);
    assert_ok!(engine.apply(&desired(&[("web", a_record())])).await);
    let id = state.descriptor("web").await.unwrap().id.unwrap();
    store.remove_out_of_band(&id);
    let calls_before = store.call_count();

    let report = assert_ok!(
        engine
            .forget(&["web".to_string(), "missing".to_string()])
            .await
    );

    assert_eq!(store.call_count(), calls_before);
    assert!(state.descriptor("web").await.is_none());
    let failed: Vec<_> = report.failures().map(|o| o.resource.as_str()).collect();
    assert_eq!(failed, vec!["missing"]);
    assert_eq!(report.changed(), 0);

    // With the stale entry gone the record is created again
    let report = assert_ok!(engine.apply(&desired(&[("web", a_record())])).await);
    assert_eq!(report.outcome("web").map(|o| o.action), Some(Action::Create));
    assert_eq!(store.record_count(), 1);
}

#[tokio::test]
async fn apply_reports_progress_through_events() {
    let store = MockRecordStore::new();
    let state = RecordingStateStore::new();
    let (engine, mut events) = Engine::new(reconciler(&store), Box::new(state.clone()), 16);

    assert_ok!(engine.apply(&desired(&[("web", a_record())])).await);

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    let id = state.descriptor("web").await.unwrap().id;
    assert_eq!(
        received,
        vec![
            EngineEvent::Started { resources: 1 },
            EngineEvent::ResourceStarted {
                resource: "web".to_string(),
                action: Action::Create,
            },
            EngineEvent::ResourceSucceeded {
                resource: "web".to_string(),
                action: Action::Create,
                id,
            },
            EngineEvent::Finished {
                changed: 1,
                failed: 0,
            },
        ]
    );
}
