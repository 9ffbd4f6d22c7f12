//! Integration tests for trip selection against the in-memory cart service.

use std::sync::Arc;
use std::time::Duration;

use common::CartId;
use selection::{
    AddScript, CartCall, DedupeGuard, DedupeKey, InMemoryCartClient, OrchestrationEvent,
    OrchestratorConfig, PassengerComposition, RecordingObserver, SelectionCoordinator,
    SelectionError, SelectionRequest,
};
use tokio::sync::Notify;

struct TestHarness {
    coordinator: Arc<SelectionCoordinator<InMemoryCartClient>>,
    carts: InMemoryCartClient,
    observer: RecordingObserver,
    dedupe: DedupeGuard,
}

impl TestHarness {
    fn new() -> Self {
        let carts = InMemoryCartClient::new();
        let observer = RecordingObserver::new();
        let dedupe = DedupeGuard::new();
        let config = OrchestratorConfig {
            return_leg_backoff: Duration::ZERO,
            ..OrchestratorConfig::default()
        };

        let coordinator = Arc::new(SelectionCoordinator::with_config(
            carts.clone(),
            config,
            Arc::new(observer.clone()),
            dedupe.clone(),
        ));

        Self {
            coordinator,
            carts,
            observer,
            dedupe,
        }
    }

    fn add_calls(&self) -> usize {
        self.carts
            .calls()
            .iter()
            .filter(|c| matches!(c, CartCall::Add { .. }))
            .count()
    }
}

fn one_way(trip: &str) -> SelectionRequest {
    SelectionRequest::one_way(trip, PassengerComposition::adults(1))
}

fn round_trip(outbound: &str, inbound: &str) -> SelectionRequest {
    SelectionRequest::round_trip(outbound, inbound, PassengerComposition::adults(1))
}

#[tokio::test]
async fn test_missing_trip_ids_fail_before_any_call() {
    let h = TestHarness::new();
    let mut request = one_way("T1");
    request.outbound_trip_id = None;

    let result = h.coordinator.select_trip(&request).await;

    assert!(matches!(result, Err(SelectionError::ValidationFailed(_))));
    assert!(h.carts.calls().is_empty());
    assert!(h.dedupe.is_empty());
}

#[tokio::test]
async fn test_oversized_party_fails_before_any_call() {
    let h = TestHarness::new();
    let request = SelectionRequest::one_way("T1", PassengerComposition::adults(u32::MAX));

    let result = h.coordinator.select_trip(&request).await;

    assert!(matches!(result, Err(SelectionError::ValidationFailed(_))));
    assert!(h.carts.calls().is_empty());
    assert!(h.dedupe.is_empty());
    assert!(h.coordinator.select_trip(&one_way("T1")).await.is_ok());
}

#[tokio::test]
async fn test_concurrent_duplicate_is_rejected() {
    let h = TestHarness::new();
    let gate = Arc::new(Notify::new());
    h.carts.set_add_gate(Some(gate.clone()));
    let key = DedupeKey::new("T1");

    let first = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move { coordinator.select_trip(&one_way("T1")).await })
    };
    while !h.dedupe.is_in_flight(&key) {
        tokio::task::yield_now().await;
    }

    let second = h.coordinator.select_trip(&one_way("T1")).await;
    assert!(matches!(
        second,
        Err(SelectionError::DuplicateInFlight { key: ref k }) if *k == key
    ));

    // A different trip is not blocked by the held key.
    h.carts.set_add_gate(None);
    assert!(h.coordinator.select_trip(&one_way("T9")).await.is_ok());

    gate.notify_one();
    let first = first.await.unwrap();
    assert!(first.is_ok());
    assert!(!h.dedupe.is_in_flight(&key));
}

#[tokio::test]
async fn test_key_is_admittable_after_success_and_failure() {
    let h = TestHarness::new();

    h.coordinator.select_trip(&round_trip("T1", "T2")).await.unwrap();
    assert!(h.dedupe.try_admit(&DedupeKey::new("T1_T2")));
    h.dedupe.release(&DedupeKey::new("T1_T2"));

    h.carts.script_add(AddScript::Unavailable);
    assert!(h.coordinator.select_trip(&round_trip("T1", "T2")).await.is_err());
    assert!(h.dedupe.try_admit(&DedupeKey::new("T1_T2")));
}

#[tokio::test]
async fn test_key_is_released_when_task_panics() {
    let h = TestHarness::new();
    let dedupe = h.dedupe.clone();

    let handle = tokio::spawn(async move {
        let _permit = dedupe.admit(DedupeKey::new("T1")).unwrap();
        panic!("orchestration crashed");
    });

    assert!(handle.await.is_err());
    assert!(h.coordinator.select_trip(&one_way("T1")).await.is_ok());
}

#[tokio::test]
async fn test_one_way_recovers_with_second_cart() {
    let h = TestHarness::new();
    h.carts.script_add(AddScript::CartInvalid);

    let response = h.coordinator.select_trip(&one_way("T1")).await.unwrap();

    assert!(response.success);
    assert_eq!(response.cart_id, "CART-0002");
    assert_eq!(response.item_count, 1);
    assert!(!response.is_round_trip);
    assert_eq!(h.add_calls(), 2);
}

#[tokio::test]
async fn test_round_trip_first_leg_invalidation_stops_immediately() {
    let h = TestHarness::new();
    h.carts.script_add(AddScript::CartInvalid);

    let result = h.coordinator.select_trip(&round_trip("T1", "T2")).await;

    match result {
        Err(err @ SelectionError::UpstreamCartInvalid { .. }) => assert!(err.is_retryable()),
        other => panic!("expected cart invalid, got {other:?}"),
    }
    assert_eq!(h.carts.calls().len(), 2);
    assert_eq!(h.add_calls(), 1);
}

#[tokio::test]
async fn test_round_trip_reports_second_leg_cart() {
    let h = TestHarness::new();
    h.carts.script_add(AddScript::Succeed);
    h.carts
        .script_add(AddScript::RedirectTo(CartId::new("CART-RETURN")));

    let response = h
        .coordinator
        .select_trip(&round_trip("T1", "T2"))
        .await
        .unwrap();

    assert!(response.is_round_trip);
    assert_eq!(response.cart_id, "CART-RETURN");
    assert_eq!(response.legs.outbound, "T1");
    assert_eq!(response.legs.inbound.as_deref(), Some("T2"));

    let completed = h
        .observer
        .events()
        .into_iter()
        .find_map(|e| match e {
            OrchestrationEvent::Completed(d) => Some(d),
            _ => None,
        })
        .unwrap();
    assert_eq!(completed.leg_count, 2);
    assert_eq!(completed.cart_id, CartId::new("CART-RETURN"));
}

#[tokio::test]
async fn test_round_trip_return_leg_recovers_once() {
    let h = TestHarness::new();
    h.carts.script_add(AddScript::Succeed);
    h.carts.script_add(AddScript::CartInvalid);

    let response = h
        .coordinator
        .select_trip(&round_trip("T1", "T2"))
        .await
        .unwrap();

    assert_eq!(response.cart_id, "CART-0001");
    assert_eq!(response.item_count, 2);
    assert_eq!(h.add_calls(), 3);
}

#[tokio::test]
async fn test_both_legs_share_passenger_manifest() {
    let h = TestHarness::new();
    let passengers = PassengerComposition::adults(2).with_children(1, vec![Some(7)]);
    let request = SelectionRequest::round_trip("T1", "T2", passengers);

    h.coordinator.select_trip(&request).await.unwrap();

    let sizes: Vec<usize> = h
        .carts
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            CartCall::Add { passengers, .. } => Some(passengers),
            _ => None,
        })
        .collect();
    assert_eq!(sizes, vec![3, 3]);
}

#[tokio::test]
async fn test_each_selection_gets_a_fresh_cart() {
    let h = TestHarness::new();

    let first = h.coordinator.select_trip(&one_way("T1")).await.unwrap();
    let second = h.coordinator.select_trip(&one_way("T1")).await.unwrap();

    assert_ne!(first.cart_id, second.cart_id);
    assert_eq!(h.carts.cart_count(), 2);
}

#[tokio::test]
async fn test_currency_is_forwarded() {
    let h = TestHarness::new();

    h.coordinator
        .select_trip(&one_way("T1").with_currency("cad"))
        .await
        .unwrap();

    assert!(matches!(
        h.carts.calls().first(),
        Some(CartCall::Create { currency }) if currency.code() == "CAD"
    ));
}
