//! Shared identifier types for the trip selection workspace.

mod types;

pub use types::{CartId, Currency, SelectionId, TripId};
