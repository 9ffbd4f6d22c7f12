//! Leg orchestration state machine.

use serde::{Deserialize, Serialize};

use crate::error::SelectionError;

/// The state of one leg orchestration.
///
/// State transitions:
/// ```text
/// Acquiring ──► AddingOutbound ──┬──────────────────────────────┬──► Complete (one-way)
///                                │                              └──► AddingReturn (round-trip)
///                                └─(cart invalid, one-way)──► RecoveringOutbound ──► Complete
///
/// AddingReturn ──┬──► Complete
///                └─(cart invalid)──► RecoveringReturn ──► Complete
///
/// any other failure ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrchestrationState {
    /// Creating a fresh remote cart.
    #[default]
    Acquiring,

    /// Adding the outbound leg to the working cart.
    AddingOutbound,

    /// Replacing an invalidated cart and retrying the outbound leg once.
    RecoveringOutbound,

    /// Re-fetching the cart and adding the return leg.
    AddingReturn,

    /// Backing off, re-fetching and retrying the return leg once.
    RecoveringReturn,

    /// All legs added (terminal state).
    Complete,

    /// A step failed without recovery (terminal state).
    Failed,
}

/// Classification of a step result for the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    /// The upstream reported the cart reference as stale.
    CartInvalid,
    /// Any other error.
    OtherFailure,
}

impl StepOutcome {
    /// Classifies the result of a step.
    pub fn of<T>(result: &Result<T, SelectionError>) -> Self {
        match result {
            Ok(_) => StepOutcome::Succeeded,
            Err(SelectionError::UpstreamCartInvalid { .. }) => StepOutcome::CartInvalid,
            Err(_) => StepOutcome::OtherFailure,
        }
    }
}

impl OrchestrationState {
    /// Returns the next state after a step in this state produced `outcome`.
    ///
    /// Only `CartInvalid` ever leads to a recovering state, and no
    /// recovering state leads to another, so every leg is retried at most
    /// once. Round-trip selections do not recover the outbound leg.
    pub fn transition(self, outcome: StepOutcome, round_trip: bool) -> OrchestrationState {
        use OrchestrationState::*;
        use StepOutcome::*;

        let after_outbound = if round_trip { AddingReturn } else { Complete };

        match (self, outcome) {
            (Acquiring, Succeeded) => AddingOutbound,
            (Acquiring, _) => Failed,

            (AddingOutbound, Succeeded) => after_outbound,
            (AddingOutbound, CartInvalid) if !round_trip => RecoveringOutbound,
            (AddingOutbound, _) => Failed,

            (RecoveringOutbound, Succeeded) => after_outbound,
            (RecoveringOutbound, _) => Failed,

            (AddingReturn, Succeeded) => Complete,
            (AddingReturn, CartInvalid) => RecoveringReturn,
            (AddingReturn, OtherFailure) => Failed,

            (RecoveringReturn, Succeeded) => Complete,
            (RecoveringReturn, _) => Failed,

            (Complete, _) => Complete,
            (Failed, _) => Failed,
        }
    }

    /// Returns true if this is a recovery attempt.
    pub fn is_recovering(&self) -> bool {
        matches!(
            self,
            OrchestrationState::RecoveringOutbound | OrchestrationState::RecoveringReturn
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestrationState::Complete | OrchestrationState::Failed
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestrationState::Acquiring => "Acquiring",
            OrchestrationState::AddingOutbound => "AddingOutbound",
            OrchestrationState::RecoveringOutbound => "RecoveringOutbound",
            OrchestrationState::AddingReturn => "AddingReturn",
            OrchestrationState::RecoveringReturn => "RecoveringReturn",
            OrchestrationState::Complete => "Complete",
            OrchestrationState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
