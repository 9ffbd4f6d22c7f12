//! Trip selection orchestrator.
//!
//! Given one or two transit legs, provisions a reservation in a remote cart
//! service whose carts are short-lived and may be invalidated mid-flow:
//! 1. Admit the selection through the in-process dedupe guard
//! 2. Build the passenger manifest
//! 3. Create a fresh cart and add the outbound leg
//! 4. Add the return leg for round trips
//!
//! Cart invalidation is recovered at most once per leg, following the
//! transition table in [`state`].

pub mod assembler;
pub mod coordinator;
pub mod dedupe;
pub mod error;
pub mod events;
pub mod manifest;
pub mod observer;
pub mod orchestrator;
pub mod request;
pub mod services;
pub mod state;

pub use assembler::{SelectionLegs, SelectionResponse, assemble};
pub use coordinator::SelectionCoordinator;
pub use dedupe::{AdmissionPermit, DedupeGuard};
pub use error::SelectionError;
pub use events::{Leg, OrchestrationEvent};
pub use manifest::{PassengerCategory, PassengerRecord};
pub use observer::{NoOpObserver, OrchestrationObserver, RecordingObserver, TracingObserver};
pub use orchestrator::{LegOrchestrator, OrchestrationOutcome, OrchestratorConfig};
pub use request::{
    DedupeKey, MAX_PASSENGERS, PassengerComposition, ResolvedLegs, SelectionRequest,
};
pub use services::{
    AddScript, AddTripResponse, CartCall, CartClient, CartItem, HttpCartClient,
    InMemoryCartClient, RemoteCart,
};
pub use state::{OrchestrationState, StepOutcome};
