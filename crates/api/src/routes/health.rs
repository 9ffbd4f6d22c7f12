//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use selection::CartClient;
use serde::Serialize;

use crate::routes::selections::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub cart_backend: &'static str,
    pub in_flight_selections: usize,
}

/// GET /health — returns service health and current selection load.
pub async fn check<C: CartClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cart_backend: state.cart_backend,
        in_flight_selections: state.coordinator.dedupe().len(),
    })
}
