//! Caller-facing response for a completed selection.

use serde::{Deserialize, Serialize};

use crate::orchestrator::OrchestrationOutcome;

/// Trip identifiers of the legs placed in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionLegs {
    pub outbound: String,
    #[serde(rename = "return")]
    pub inbound: Option<String>,
}

/// Response returned by `selectTrip`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub success: bool,
    pub cart_id: String,
    pub status: String,
    pub item_count: usize,
    pub is_round_trip: bool,
    pub legs: SelectionLegs,
}

/// Formats an orchestration outcome for the caller.
pub fn assemble(outcome: &OrchestrationOutcome) -> SelectionResponse {
    SelectionResponse {
        success: true,
        cart_id: outcome.cart_id.to_string(),
        status: outcome.status.clone(),
        item_count: outcome.item_count,
        is_round_trip: outcome.is_round_trip,
        legs: SelectionLegs {
            outbound: outcome.outbound_trip_id.to_string(),
            inbound: outcome.return_trip_id.as_ref().map(ToString::to_string),
        },
    }
}
