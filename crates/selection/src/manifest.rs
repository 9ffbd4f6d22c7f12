//! Passenger manifest builder.

use serde::{Deserialize, Serialize};

use crate::request::PassengerComposition;

/// Age used for adults when the request does not name one.
pub const DEFAULT_ADULT_AGE: u32 = 30;

/// Age used for a child whose age is missing or not numeric.
pub const FALLBACK_CHILD_AGE: u32 = 10;

/// Fare category of a passenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassengerCategory {
    Adult,
    Youth,
}

/// One passenger as sent to the cart service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerRecord {
    #[serde(rename = "type")]
    pub category: PassengerCategory,
    pub age: u32,
    pub wheelchair: bool,
    pub discounts: Vec<String>,
}

impl PassengerRecord {
    fn new(category: PassengerCategory, age: u32) -> Self {
        Self {
            category,
            age,
            wheelchair: false,
            discounts: Vec::new(),
        }
    }
}

/// Builds the passenger list: adults first, then one youth per child.
///
/// Child `i` takes `child_ages[i]` when present, otherwise
/// [`FALLBACK_CHILD_AGE`]. Never fails.
pub fn build(
    adult_count: u32,
    child_count: u32,
    child_ages: &[Option<u32>],
    default_adult_age: Option<u32>,
) -> Vec<PassengerRecord> {
    let adult_age = default_adult_age.unwrap_or(DEFAULT_ADULT_AGE);
    let adults = (0..adult_count).map(|_| PassengerRecord::new(PassengerCategory::Adult, adult_age));
    let youths = (0..child_count as usize).map(|i| {
        let age = child_ages
            .get(i)
            .copied()
            .flatten()
            .unwrap_or(FALLBACK_CHILD_AGE);
        PassengerRecord::new(PassengerCategory::Youth, age)
    });
    adults.chain(youths).collect()
}

/// Builds the manifest for a request's passenger composition.
pub fn build_for(passengers: &PassengerComposition) -> Vec<PassengerRecord> {
    build(
        passengers.adult_count,
        passengers.child_count,
        &passengers.child_ages,
        passengers.default_adult_age,
    )
}

/// Reads an age from loosely typed input.
///
/// Non-negative integers and strings holding one are accepted; anything
/// else yields `None` so the builder falls back.
pub fn parse_age(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
