//! Sweep and refresh behaviour of the reconciliation engine.

use std::time::Duration;

use chrono::TimeDelta;
use chrono::Utc;
use common::FakeFlightSource;
use common::InMemoryStore;
use common::RecordingSink;
use common::Scripted;
use common::SinkFailure;
use common::flight_json;
use flight_bot::flight::error::FlightErrorKind;
use flight_bot::service::reconciliation_service::DeactivationReason;
use flight_bot::service::reconciliation_service::RefreshOutcome;

mod common;

macro_rules! engine_test {
    ($name:ident, |$store:ident, $source:ident, $sink:ident, $services:ident| $body:block) => {
        #[tokio::test]
        async fn $name() {
            let $store = InMemoryStore::new();
            let $source = FakeFlightSource::new();
            let $sink = RecordingSink::new();
            let $services = common::services($store.clone(), $source.clone(), $sink.clone());

            $body
        }
    };
}

engine_test!(test_stale_en_route_flight_is_refreshed, |store, source, sink, services| {
    let now = Utc::now();
    let sub = store.seed_at("abc123", now - TimeDelta::minutes(10));
    source.script("abc123", Scripted::Flight(flight_json("abc123", "EN_ROUTE")));

    let report = services.reconciliation.sweep(now).await.unwrap();
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.join().await, vec![RefreshOutcome::Refreshed]);

    let stored = store.get(sub.id);
    assert!(stored.active);
    assert_eq!(stored.last_refreshed_at, now);

    let updates = sink.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].channel_ref, "C1");
    assert_eq!(updates[0].message_ref, "abc123.ts");
    assert_eq!(updates[0].message.text, "Flight AA 100 (EN_ROUTE)");
});

engine_test!(test_fresh_subscriptions_are_untouched, |store, source, sink, services| {
    let now = Utc::now();
    let sub = store.seed_at("abc123", now - TimeDelta::minutes(1));
    source.script("abc123", Scripted::Flight(flight_json("abc123", "EN_ROUTE")));

    let report = services.reconciliation.sweep(now).await.unwrap();
    assert_eq!(report.active, 1);
    assert_eq!(report.fresh, 1);
    assert_eq!(report.dispatched, 0);

    assert!(source.calls().is_empty());
    assert!(sink.updates().is_empty());
    assert_eq!(store.get(sub.id).last_refreshed_at, sub.last_refreshed_at);
});

engine_test!(test_staleness_boundary_is_inclusive, |store, source, _sink, services| {
    let now = Utc::now();
    store.seed_at("abc123", now - TimeDelta::minutes(5));
    source.script("abc123", Scripted::Flight(flight_json("abc123", "SCHEDULED")));

    let report = services.reconciliation.sweep(now).await.unwrap();
    assert_eq!(report.dispatched, 1);
    report.join().await;
    assert_eq!(source.calls(), vec!["abc123"]);
});

engine_test!(test_inactive_subscriptions_are_never_swept, |store, source, sink, services| {
    let now = Utc::now();
    let mut sub = store.seed_at("abc123", now - TimeDelta::hours(1));
    sub.deactivate();
    store.update_raw(sub);

    let report = services.reconciliation.sweep(now).await.unwrap();
    assert_eq!(report.active, 0);
    assert_eq!(report.dispatched, 0);
    assert!(source.calls().is_empty());
    assert!(sink.updates().is_empty());
});

engine_test!(test_landed_flight_is_deactivated_after_one_update, |store, source, sink, services| {
    let now = Utc::now();
    let sub = store.seed_at("abc123", now - TimeDelta::minutes(10));
    source.script("abc123", Scripted::Flight(flight_json("abc123", "LANDED")));

    let outcomes = services.reconciliation.sweep(now).await.unwrap().join().await;
    assert_eq!(
        outcomes,
        vec![RefreshOutcome::Deactivated(DeactivationReason::Landed)]
    );
    assert!(!store.get(sub.id).active);

    let updates = sink.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].message.text, "Flight AA 100 (LANDED)");
    let blocks = updates[0].message.blocks.to_string();
    assert!(blocks.contains("Landed *"));
    assert!(blocks.contains("No longer updating"));

    // Nothing left to sweep.
    let later = now + TimeDelta::hours(1);
    let report = services.reconciliation.sweep(later).await.unwrap();
    assert_eq!(report.active, 0);
    assert_eq!(source.calls().len(), 1);
});

engine_test!(test_flight_not_found_deactivates_permanently, |store, source, sink, services| {
    let now = Utc::now();
    let sub = store.seed_at("gone42", now - TimeDelta::minutes(10));
    source.script("gone42", Scripted::NotFound);

    let outcomes = services.reconciliation.sweep(now).await.unwrap().join().await;
    assert_eq!(
        outcomes,
        vec![RefreshOutcome::Deactivated(DeactivationReason::FlightNotFound)]
    );

    let stored = store.get(sub.id);
    assert!(!stored.active);
    assert_eq!(stored.last_refreshed_at, now);

    let updates = sink.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].message.text, "Flight AA 100 (no longer available)");

    let later = now + TimeDelta::hours(1);
    let report = services.reconciliation.sweep(later).await.unwrap();
    assert_eq!(report.dispatched, 0);
    assert_eq!(source.calls(), vec!["gone42"]);
});

engine_test!(test_transient_failures_keep_subscription_active, |store, source, sink, services| {
    let first = Utc::now();
    let sub = store.seed_at("abc123", first - TimeDelta::minutes(10));
    source.script("abc123", Scripted::Unavailable);

    let outcomes = services.reconciliation.sweep(first).await.unwrap().join().await;
    assert_eq!(
        outcomes,
        vec![RefreshOutcome::Transient(FlightErrorKind::UpstreamUnavailable)]
    );
    let stored = store.get(sub.id);
    assert!(stored.active);
    assert_eq!(stored.last_refreshed_at, first);

    let second = first + TimeDelta::minutes(6);
    let outcomes = services.reconciliation.sweep(second).await.unwrap().join().await;
    assert_eq!(
        outcomes,
        vec![RefreshOutcome::Transient(FlightErrorKind::UpstreamUnavailable)]
    );
    let stored = store.get(sub.id);
    assert!(stored.active);
    assert_eq!(stored.last_refreshed_at, second);

    source.script("abc123", Scripted::Malformed);
    let third = second + TimeDelta::minutes(6);
    let outcomes = services.reconciliation.sweep(third).await.unwrap().join().await;
    assert_eq!(
        outcomes,
        vec![RefreshOutcome::Transient(FlightErrorKind::MalformedResponse)]
    );
    assert!(store.get(sub.id).active);
    assert!(sink.updates().is_empty());
});

engine_test!(test_missing_card_deactivates, |store, source, sink, services| {
    let now = Utc::now();
    let message_gone = store.seed_at("abc123", now - TimeDelta::minutes(10));
    source.script("abc123", Scripted::Flight(flight_json("abc123", "EN_ROUTE")));
    sink.fail_updates(SinkFailure::MessageGone);

    let outcomes = services.reconciliation.sweep(now).await.unwrap().join().await;
    assert_eq!(
        outcomes,
        vec![RefreshOutcome::Deactivated(DeactivationReason::MessageGone)]
    );
    assert!(!store.get(message_gone.id).active);

    let channel_gone = store.seed_at("def456", now - TimeDelta::minutes(10));
    source.script("def456", Scripted::Flight(flight_json("def456", "EN_ROUTE")));
    sink.fail_updates(SinkFailure::ChannelGone);

    let outcomes = services.reconciliation.sweep(now).await.unwrap().join().await;
    assert_eq!(
        outcomes,
        vec![RefreshOutcome::Deactivated(DeactivationReason::MessageGone)]
    );
    assert!(!store.get(channel_gone.id).active);
});

engine_test!(test_other_chat_errors_keep_subscription_active, |store, source, sink, services| {
    let now = Utc::now();
    let sub = store.seed_at("abc123", now - TimeDelta::minutes(10));
    source.script("abc123", Scripted::Flight(flight_json("abc123", "EN_ROUTE")));
    sink.fail_updates(SinkFailure::RateLimited);

    let outcomes = services.reconciliation.sweep(now).await.unwrap().join().await;
    assert_eq!(outcomes, vec![RefreshOutcome::ChatFailed]);

    let stored = store.get(sub.id);
    assert!(stored.active);
    assert_eq!(stored.last_refreshed_at, now);
});

engine_test!(test_overlapping_sweep_skips_in_flight_refresh, |store, source, _sink, services| {
    let now = Utc::now();
    let sub = store.seed_at("abc123", now - TimeDelta::minutes(10));
    source.script("abc123", Scripted::Flight(flight_json("abc123", "EN_ROUTE")));
    source.hold();

    let first = services.reconciliation.sweep(now).await.unwrap();
    assert_eq!(first.dispatched, 1);
    tokio::time::timeout(Duration::from_secs(5), async {
        while source.calls().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("refresh never started");

    // Still stale in the store because the first refresh has not finished.
    let second = services
        .reconciliation
        .sweep(now + TimeDelta::minutes(1))
        .await
        .unwrap();
    assert_eq!(second.in_flight, 1);
    assert_eq!(second.dispatched, 0);

    source.release_one();
    assert_eq!(first.join().await, vec![RefreshOutcome::Refreshed]);
    assert_eq!(source.calls().len(), 1);
    assert_eq!(store.get(sub.id).last_refreshed_at, now);

    // The claim is released once the refresh completes.
    let third = services
        .reconciliation
        .sweep(now + TimeDelta::minutes(10))
        .await
        .unwrap();
    assert_eq!(third.dispatched, 1);
    third.join().await;
});

engine_test!(test_one_failure_does_not_affect_others, |store, source, sink, services| {
    let now = Utc::now();
    let ok = store.seed_at("abc123", now - TimeDelta::minutes(10));
    let gone = store.seed_at("gone42", now - TimeDelta::minutes(10));
    let flaky = store.seed_at("flaky7", now - TimeDelta::minutes(10));
    source.script("abc123", Scripted::Flight(flight_json("abc123", "EN_ROUTE")));
    source.script("gone42", Scripted::NotFound);
    source.script("flaky7", Scripted::Unavailable);

    let report = services.reconciliation.sweep(now).await.unwrap();
    assert_eq!(report.dispatched, 3);
    let outcomes = report.join().await;
    assert_eq!(outcomes.len(), 3);

    assert!(store.get(ok.id).active);
    assert!(!store.get(gone.id).active);
    assert!(store.get(flaky.id).active);
    assert_eq!(sink.updates().len(), 2);
});

engine_test!(test_not_found_card_update_is_best_effort, |store, source, sink, services| {
    for (tracking_id, failure) in [
        ("gone42", SinkFailure::RateLimited),
        ("gone43", SinkFailure::MessageGone),
    ] {
        let now = Utc::now();
        let sub = store.seed_at(tracking_id, now - TimeDelta::minutes(10));
        source.script(tracking_id, Scripted::NotFound);
        sink.fail_updates(failure);

        let outcomes = services.reconciliation.sweep(now).await.unwrap().join().await;
        assert_eq!(
            outcomes,
            vec![RefreshOutcome::Deactivated(DeactivationReason::FlightNotFound)]
        );

        let stored = store.get(sub.id);
        assert!(!stored.active);
        assert_eq!(stored.last_refreshed_at, now);
    }
    assert_eq!(sink.updates().len(), 2);
});

engine_test!(test_landed_flight_stays_deactivated_when_update_fails, |store, source, sink, services| {
    for (tracking_id, failure) in [
        ("abc123", SinkFailure::RateLimited),
        ("def456", SinkFailure::MessageGone),
    ] {
        let now = Utc::now();
        let sub = store.seed_at(tracking_id, now - TimeDelta::minutes(10));
        source.script(tracking_id, Scripted::Flight(flight_json(tracking_id, "LANDED")));
        sink.fail_updates(failure);

        let outcomes = services.reconciliation.sweep(now).await.unwrap().join().await;
        assert_eq!(
            outcomes,
            vec![RefreshOutcome::Deactivated(DeactivationReason::Landed)]
        );

        let stored = store.get(sub.id);
        assert!(!stored.active);
        assert_eq!(stored.last_refreshed_at, now);
    }
});
