//! Trip selection endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::{DateTime, Utc};
use common::{Currency, TripId};
use selection::manifest;
use selection::{
    CartClient, PassengerComposition, SelectionCoordinator, SelectionRequest, SelectionResponse,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<C: CartClient> {
    pub coordinator: SelectionCoordinator<C>,
    /// Label for the configured cart backend, reported by `/health`.
    pub cart_backend: &'static str,
}

// -- Request types --

fn default_adult_count() -> u32 {
    1
}

/// Body of `POST /trips/select`.
///
/// Child ages are taken as raw JSON so unparseable entries fall back to the
/// default child age instead of rejecting the whole request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectTripBody {
    #[serde(default)]
    pub outbound_trip_id: Option<String>,
    #[serde(default)]
    pub return_trip_id: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default = "default_adult_count")]
    pub adult_count: u32,
    #[serde(default)]
    pub child_count: u32,
    #[serde(default)]
    pub child_ages: Vec<serde_json::Value>,
    #[serde(default)]
    pub default_adult_age: Option<u32>,
}

impl SelectTripBody {
    fn into_request(self) -> SelectionRequest {
        let passengers = PassengerComposition {
            adult_count: self.adult_count,
            child_count: self.child_count,
            child_ages: self.child_ages.iter().map(manifest::parse_age).collect(),
            default_adult_age: self.default_adult_age,
        };

        SelectionRequest {
            outbound_trip_id: self.outbound_trip_id.map(TripId::from),
            return_trip_id: self.return_trip_id.map(TripId::from),
            currency: self.currency.map(Currency::from).unwrap_or_default(),
            passengers,
        }
    }
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InFlightSelection {
    pub key: String,
    pub admitted_at: DateTime<Utc>,
}

// -- Handlers --

/// POST /trips/select — provision the chosen legs into a fresh cart.
#[tracing::instrument(skip(state, body))]
pub async fn select<C: CartClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
    body: Result<Json<SelectTripBody>, JsonRejection>,
) -> Result<Json<SelectionResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let request = body.into_request();
    let response = state.coordinator.select_trip(&request).await?;
    Ok(Json(response))
}

/// GET /trips/in-flight — list selections currently holding a dedupe key.
#[tracing::instrument(skip(state))]
pub async fn in_flight<C: CartClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> Json<Vec<InFlightSelection>> {
    let entries = state
        .coordinator
        .dedupe()
        .in_flight()
        .into_iter()
        .map(|(key, admitted_at)| InFlightSelection {
            key: key.to_string(),
            admitted_at,
        })
        .collect();
    Json(entries)
}
