//! Selection error types.

use common::CartId;
use thiserror::Error;

use crate::request::DedupeKey;

/// Errors that can occur while selecting a trip.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// The request failed business validation. Never retried.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// An identical selection is already being orchestrated.
    #[error("Too many requests for {key}: selection already in progress")]
    DuplicateInFlight { key: DedupeKey },

    /// The upstream rejected the cart reference as stale or expired.
    #[error("Cart {cart_id} is no longer valid: {reason}")]
    UpstreamCartInvalid { cart_id: CartId, reason: String },

    /// Transport or upstream failure other than cart invalidation.
    #[error("Cart service unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl SelectionError {
    /// Returns true if the caller may resubmit the selection later.
    ///
    /// A duplicate should be resubmitted once the first request settles; an
    /// invalid cart means the caller must restart the selection from scratch.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SelectionError::DuplicateInFlight { .. } | SelectionError::UpstreamCartInvalid { .. }
        )
    }

    /// Short machine-readable code for logs, metrics and API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            SelectionError::ValidationFailed(_) => "validation_failed",
            SelectionError::DuplicateInFlight { .. } => "duplicate_in_flight",
            SelectionError::UpstreamCartInvalid { .. } => "cart_invalid",
            SelectionError::UpstreamUnavailable(_) => "upstream_unavailable",
        }
    }
}

impl From<reqwest::Error> for SelectionError {
    fn from(err: reqwest::Error) -> Self {
        SelectionError::UpstreamUnavailable(err.to_string())
    }
}

/// Convenience type alias for selection results.
pub type Result<T> = std::result::Result<T, SelectionError>;
