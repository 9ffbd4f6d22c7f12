//! Events emitted while orchestrating a trip selection.

use chrono::{DateTime, Utc};
use common::{CartId, SelectionId};
use serde::{Deserialize, Serialize};

use crate::request::DedupeKey;
use crate::state::OrchestrationState;

/// Which leg a cart write belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    Outbound,
    Return,
}

impl Leg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Leg::Outbound => "outbound",
            Leg::Return => "return",
        }
    }
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observable milestones of one orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrchestrationEvent {
    /// Orchestration started for an admitted selection.
    Started(StartedData),

    /// The state machine moved between states.
    Transitioned(TransitionData),

    /// A fresh remote cart was created.
    CartAcquired(CartData),

    /// The upstream answered a leg write with a different cart id.
    CartRedirected(RedirectData),

    /// A leg was written to the cart.
    LegAdded(LegAddedData),

    /// The upstream rejected the working cart as stale.
    CartInvalidated(InvalidatedData),

    /// Orchestration finished successfully.
    Completed(CompletedData),

    /// Orchestration finished without a usable cart.
    Failed(FailedData),
}

impl OrchestrationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrchestrationEvent::Started(_) => "Started",
            OrchestrationEvent::Transitioned(_) => "Transitioned",
            OrchestrationEvent::CartAcquired(_) => "CartAcquired",
            OrchestrationEvent::CartRedirected(_) => "CartRedirected",
            OrchestrationEvent::LegAdded(_) => "LegAdded",
            OrchestrationEvent::CartInvalidated(_) => "CartInvalidated",
            OrchestrationEvent::Completed(_) => "Completed",
            OrchestrationEvent::Failed(_) => "Failed",
        }
    }

    /// Returns the selection this event belongs to.
    pub fn selection_id(&self) -> SelectionId {
        match self {
            OrchestrationEvent::Started(d) => d.selection_id,
            OrchestrationEvent::Transitioned(d) => d.selection_id,
            OrchestrationEvent::CartAcquired(d) => d.selection_id,
            OrchestrationEvent::CartRedirected(d) => d.selection_id,
            OrchestrationEvent::LegAdded(d) => d.selection_id,
            OrchestrationEvent::CartInvalidated(d) => d.selection_id,
            OrchestrationEvent::Completed(d) => d.selection_id,
            OrchestrationEvent::Failed(d) => d.selection_id,
        }
    }
}

/// Data for Started event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartedData {
    pub selection_id: SelectionId,
    pub key: DedupeKey,
    pub round_trip: bool,
    pub started_at: DateTime<Utc>,
}

/// Data for Transitioned event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionData {
    pub selection_id: SelectionId,
    pub from: OrchestrationState,
    pub to: OrchestrationState,
}

/// Data for CartAcquired event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartData {
    pub selection_id: SelectionId,
    pub cart_id: CartId,
    /// True when the cart replaces an invalidated one.
    pub replacement: bool,
}

/// Data for CartRedirected event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectData {
    pub selection_id: SelectionId,
    pub from: CartId,
    pub to: CartId,
}

/// Data for LegAdded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegAddedData {
    pub selection_id: SelectionId,
    pub leg: Leg,
    pub cart_id: CartId,
    pub item_count: usize,
}

/// Data for CartInvalidated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidatedData {
    pub selection_id: SelectionId,
    pub leg: Leg,
    pub cart_id: CartId,
    pub reason: String,
}

/// Data for Completed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedData {
    pub selection_id: SelectionId,
    pub cart_id: CartId,
    pub leg_count: usize,
    pub completed_at: DateTime<Utc>,
}

/// Data for Failed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedData {
    pub selection_id: SelectionId,
    /// State whose step failed.
    pub state: OrchestrationState,
    pub code: String,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}
