//! In-process guard that admits at most one orchestration per dedupe key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::request::DedupeKey;

/// Table of selections currently in flight.
///
/// Cloning yields another handle to the same table. The guard is local to
/// one process; it is not a distributed lock.
#[derive(Debug, Clone, Default)]
pub struct DedupeGuard {
    in_flight: Arc<Mutex<HashMap<DedupeKey, DateTime<Utc>>>>,
}

impl DedupeGuard {
    /// Creates an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` busy if nothing holds it. Returns false, leaving the
    /// table untouched, if the key is already busy.
    pub fn try_admit(&self, key: &DedupeKey) -> bool {
        let mut table = self.table();
        if table.contains_key(key) {
            return false;
        }
        table.insert(key.clone(), Utc::now());
        true
    }

    /// Frees `key`. Releasing a key that is not held is a no-op.
    pub fn release(&self, key: &DedupeKey) {
        if let Some(admitted_at) = self.table().remove(key) {
            let held_ms = (Utc::now() - admitted_at).num_milliseconds();
            tracing::debug!(%key, held_ms, "dedupe key released");
        }
    }

    /// Admits `key` and returns a permit that releases it when dropped.
    pub fn admit(&self, key: DedupeKey) -> Option<AdmissionPermit> {
        if !self.try_admit(&key) {
            return None;
        }
        Some(AdmissionPermit {
            guard: self.clone(),
            key,
        })
    }

    /// Returns true if `key` is currently held.
    pub fn is_in_flight(&self, key: &DedupeKey) -> bool {
        self.table().contains_key(key)
    }

    /// Returns held keys with their admission time, oldest first.
    pub fn in_flight(&self) -> Vec<(DedupeKey, DateTime<Utc>)> {
        let mut entries: Vec<_> = self
            .table()
            .iter()
            .map(|(key, at)| (key.clone(), *at))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-updated, so
    // a poisoned table is still usable and must stay releasable.
    fn table(&self) -> MutexGuard<'_, HashMap<DedupeKey, DateTime<Utc>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped admission of one dedupe key.
///
/// The key is released exactly once, when the permit is dropped: on normal
/// return, on error propagation, on panic unwinding, and when the owning
/// future is cancelled.
#[derive(Debug)]
#[must_use = "dropping the permit releases the key immediately"]
pub struct AdmissionPermit {
    guard: DedupeGuard,
    key: DedupeKey,
}

impl AdmissionPermit {
    pub fn key(&self) -> &DedupeKey {
        &self.key
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.guard.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_admit_is_rejected() {
        let guard = DedupeGuard::new();
        let key = DedupeKey::new("T1");

        assert!(guard.try_admit(&key));
        assert!(!guard.try_admit(&key));
        assert_eq!(guard.len(), 1);

        guard.release(&key);
        assert!(guard.is_empty());
        assert!(guard.try_admit(&key));
    }

    #[test]
    fn test_distinct_keys_are_independent() {
        let guard = DedupeGuard::new();
        assert!(guard.try_admit(&DedupeKey::new("T1")));
        assert!(guard.try_admit(&DedupeKey::new("T1_T2")));
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn test_release_unknown_key_is_noop() {
        let guard = DedupeGuard::new();
        guard.release(&DedupeKey::new("missing"));
        assert!(guard.is_empty());
    }

    #[test]
    fn test_permit_releases_on_drop() {
        let guard = DedupeGuard::new();
        let key = DedupeKey::new("T1");

        let permit = guard.admit(key.clone()).unwrap();
        assert_eq!(permit.key(), &key);
        assert!(guard.is_in_flight(&key));
        assert!(guard.admit(key.clone()).is_none());

        drop(permit);
        assert!(!guard.is_in_flight(&key));
    }

    #[test]
    fn test_permit_releases_on_panic() {
        let guard = DedupeGuard::new();
        let key = DedupeKey::new("T1");

        let handle = guard.clone();
        let panicking_key = key.clone();
        let result = std::thread::spawn(move || {
            let _permit = handle.admit(panicking_key).unwrap();
            panic!("orchestration crashed");
        })
        .join();

        assert!(result.is_err());
        assert!(guard.try_admit(&key));
    }

    #[test]
    fn test_concurrent_admission_admits_exactly_one() {
        let guard = DedupeGuard::new();
        let key = DedupeKey::new("T1_T2");

        let admitted: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(|| guard.try_admit(&key)))
                .collect();
            handles
                .into_iter()
                .map(|h| usize::from(h.join().unwrap()))
                .sum()
        });

        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_in_flight_lists_held_keys() {
        let guard = DedupeGuard::new();
        guard.try_admit(&DedupeKey::new("A"));
        guard.try_admit(&DedupeKey::new("B"));

        let keys: Vec<_> = guard.in_flight().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&DedupeKey::new("A")));
        assert!(keys.contains(&DedupeKey::new("B")));
    }
}
