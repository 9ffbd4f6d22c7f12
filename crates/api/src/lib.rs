//! HTTP API server with observability for trip selection.
//!
//! Exposes the selection coordinator over REST, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use selection::{
    CartClient, DedupeGuard, HttpCartClient, InMemoryCartClient, SelectionCoordinator,
    SelectionError, TracingObserver,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::selections::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<C: CartClient + 'static>(
    state: Arc<AppState<C>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<C>))
        .route("/trips/select", post(routes::selections::select::<C>))
        .route("/trips/in-flight", get(routes::selections::in_flight::<C>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

fn build_state<C: CartClient>(
    client: C,
    config: &Config,
    cart_backend: &'static str,
) -> Arc<AppState<C>> {
    let coordinator = SelectionCoordinator::with_config(
        client,
        config.orchestrator(),
        Arc::new(TracingObserver),
        DedupeGuard::new(),
    );
    Arc::new(AppState {
        coordinator,
        cart_backend,
    })
}

/// Creates application state backed by the in-memory cart service.
pub fn create_default_state(
    config: &Config,
) -> (Arc<AppState<InMemoryCartClient>>, InMemoryCartClient) {
    let carts = InMemoryCartClient::new();
    let state = build_state(carts.clone(), config, "in-memory");
    (state, carts)
}

/// Creates application state backed by the booking backend at `base_url`.
pub fn create_http_state(
    base_url: &str,
    config: &Config,
) -> Result<Arc<AppState<HttpCartClient>>, SelectionError> {
    let client = HttpCartClient::with_timeout(base_url, config.cart_api_timeout)?;
    Ok(build_state(client, config, "http"))
}
