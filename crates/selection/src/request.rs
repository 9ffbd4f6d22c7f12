//! Selection requests and the trip legs they resolve to.

use common::{Currency, TripId};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SelectionError};

/// Most passengers one selection may book.
pub const MAX_PASSENGERS: u32 = 9;

/// Passenger composition asked for by the traveler.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PassengerComposition {
    pub adult_count: u32,
    pub child_count: u32,
    /// Ages by child position; `None` where no usable age was supplied.
    pub child_ages: Vec<Option<u32>>,
    pub default_adult_age: Option<u32>,
}

impl PassengerComposition {
    /// Creates a composition of adults only.
    pub fn adults(adult_count: u32) -> Self {
        Self {
            adult_count,
            ..Self::default()
        }
    }

    /// Adds children with the given ages.
    pub fn with_children(mut self, child_count: u32, child_ages: Vec<Option<u32>>) -> Self {
        self.child_count = child_count;
        self.child_ages = child_ages;
        self
    }

    /// Total number of passengers.
    pub fn total(&self) -> u32 {
        self.adult_count.saturating_add(self.child_count)
    }
}

/// A traveler's choice of one or two legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub outbound_trip_id: Option<TripId>,
    pub return_trip_id: Option<TripId>,
    #[serde(default)]
    pub currency: Currency,
    pub passengers: PassengerComposition,
}

impl SelectionRequest {
    /// Creates a one-way selection.
    pub fn one_way(outbound: impl Into<TripId>, passengers: PassengerComposition) -> Self {
        Self {
            outbound_trip_id: Some(outbound.into()),
            return_trip_id: None,
            currency: Currency::default(),
            passengers,
        }
    }

    /// Creates a round-trip selection.
    pub fn round_trip(
        outbound: impl Into<TripId>,
        inbound: impl Into<TripId>,
        passengers: PassengerComposition,
    ) -> Self {
        Self {
            outbound_trip_id: Some(outbound.into()),
            return_trip_id: Some(inbound.into()),
            currency: Currency::default(),
            passengers,
        }
    }

    /// Sets the currency.
    pub fn with_currency(mut self, currency: impl Into<Currency>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Resolves which legs this request asks for.
    ///
    /// Blank identifiers count as absent. A lone return identifier becomes
    /// the single leg of a one-way selection.
    pub fn resolve_legs(&self) -> Result<ResolvedLegs> {
        let outbound = self.outbound_trip_id.clone().filter(|id| !id.is_blank());
        let inbound = self.return_trip_id.clone().filter(|id| !id.is_blank());

        match (outbound, inbound) {
            (Some(outbound), inbound) => Ok(ResolvedLegs { outbound, inbound }),
            (None, Some(only)) => Ok(ResolvedLegs {
                outbound: only,
                inbound: None,
            }),
            (None, None) => Err(SelectionError::ValidationFailed(
                "at least one trip id is required".to_string(),
            )),
        }
    }

    /// Business-level validation. Performs no I/O.
    ///
    /// Rejects compositions outside `1..=MAX_PASSENGERS`, and child age
    /// lists longer than that, before anything is allocated for them.
    pub fn validate(&self) -> Result<ResolvedLegs> {
        let legs = self.resolve_legs()?;
        let total = self.passengers.total();
        if total == 0 {
            return Err(SelectionError::ValidationFailed(
                "at least one passenger is required".to_string(),
            ));
        }
        if total > MAX_PASSENGERS {
            return Err(SelectionError::ValidationFailed(format!(
                "at most {MAX_PASSENGERS} passengers per selection, got {total}"
            )));
        }
        if self.passengers.child_ages.len() > MAX_PASSENGERS as usize {
            return Err(SelectionError::ValidationFailed(format!(
                "at most {MAX_PASSENGERS} child ages per selection, got {}",
                self.passengers.child_ages.len()
            )));
        }
        Ok(legs)
    }
}

/// The legs of a validated selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLegs {
    pub outbound: TripId,
    pub inbound: Option<TripId>,
}

impl ResolvedLegs {
    pub fn is_round_trip(&self) -> bool {
        self.inbound.is_some()
    }

    pub fn leg_count(&self) -> usize {
        if self.is_round_trip() { 2 } else { 1 }
    }

    /// Key under which concurrent identical selections are deduplicated.
    ///
    /// Ids are joined with `_` and not escaped, so a one-way trip `"A_B"`
    /// and the round trip `("A", "B")` share a key and block each other
    /// while either is in flight.
    pub fn dedupe_key(&self) -> DedupeKey {
        match &self.inbound {
            Some(inbound) => DedupeKey::new(format!("{}_{}", self.outbound, inbound)),
            None => DedupeKey::new(self.outbound.as_str()),
        }
    }
}

/// Deterministic key for one logical trip selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupeKey(String);

impl DedupeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(outbound: Option<&str>, inbound: Option<&str>) -> SelectionRequest {
        SelectionRequest {
            outbound_trip_id: outbound.map(TripId::from),
            return_trip_id: inbound.map(TripId::from),
            currency: Currency::default(),
            passengers: PassengerComposition::adults(1),
        }
    }

    #[test]
    fn test_one_way_key_is_outbound_id() {
        let legs = request(Some("T1"), None).resolve_legs().unwrap();
        assert!(!legs.is_round_trip());
        assert_eq!(legs.leg_count(), 1);
        assert_eq!(legs.dedupe_key().as_str(), "T1");
    }

    #[test]
    fn test_round_trip_key_joins_ids() {
        let legs = request(Some("T1"), Some("T2")).resolve_legs().unwrap();
        assert!(legs.is_round_trip());
        assert_eq!(legs.leg_count(), 2);
        assert_eq!(legs.dedupe_key().as_str(), "T1_T2");
    }

    #[test]
    fn test_underscore_trip_id_shares_round_trip_key() {
        let one_way = request(Some("A_B"), None).resolve_legs().unwrap();
        let round_trip = request(Some("A"), Some("B")).resolve_legs().unwrap();
        assert_eq!(one_way.dedupe_key(), round_trip.dedupe_key());
    }

    #[test]
    fn test_missing_both_ids_fails_validation() {
        for req in [
            request(None, None),
            request(Some(""), None),
            request(Some("  "), Some("")),
        ] {
            assert!(matches!(
                req.resolve_legs(),
                Err(SelectionError::ValidationFailed(_))
            ));
        }
    }

    #[test]
    fn test_lone_return_id_becomes_one_way() {
        let legs = request(None, Some("T2")).resolve_legs().unwrap();
        assert_eq!(legs.outbound.as_str(), "T2");
        assert!(!legs.is_round_trip());
    }

    #[test]
    fn test_blank_return_id_is_one_way() {
        let legs = request(Some("T1"), Some(" ")).resolve_legs().unwrap();
        assert!(!legs.is_round_trip());
    }

    #[test]
    fn test_no_passengers_fails_validation() {
        let mut req = request(Some("T1"), None);
        req.passengers = PassengerComposition::default();
        assert!(matches!(
            req.validate(),
            Err(SelectionError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_children_only_is_valid() {
        let mut req = request(Some("T1"), None);
        req.passengers = PassengerComposition::adults(0).with_children(1, vec![Some(8)]);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_passenger_count_is_capped() {
        let mut req = request(Some("T1"), None);
        req.passengers = PassengerComposition::adults(MAX_PASSENGERS);
        assert!(req.validate().is_ok());

        for passengers in [
            PassengerComposition::adults(MAX_PASSENGERS + 1),
            PassengerComposition::adults(u32::MAX),
            PassengerComposition::adults(1).with_children(u32::MAX, Vec::new()),
        ] {
            req.passengers = passengers;
            assert!(matches!(
                req.validate(),
                Err(SelectionError::ValidationFailed(_))
            ));
        }
    }

    #[test]
    fn test_child_age_list_is_capped() {
        let mut req = request(Some("T1"), None);
        req.passengers =
            PassengerComposition::adults(1).with_children(1, vec![Some(5); 1_000]);
        assert!(matches!(
            req.validate(),
            Err(SelectionError::ValidationFailed(_))
        ));
    }
}
