//! The in-memory registration store.
//!
//! A single readers-writer lock guards the whole map. Lookups are cheap
//! relative to the TCP/HTTP round-trips they serve, so the coarse lock is
//! sufficient at the expected fan-in of hundreds to low-thousands of
//! producers. Heartbeats bypass the lock entirely via the atomic
//! `last_update` field on [`PeerInfo`](crate::PeerInfo).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::producer::{Producer, Producers};
use crate::registration::{Registration, Registrations, WILDCARD};

/// Thread-safe index of `(category, key, sub_key)` to producer lists.
///
/// Keys are retained when their last producer is removed; an empty list means
/// "this topic/channel exists but has no producers". Only
/// [`remove_registration`](Self::remove_registration) deletes a key.
#[derive(Debug, Default)]
pub struct RegistrationStore {
    map: RwLock<HashMap<Registration, Vec<Arc<Producer>>>>,
}

fn needs_scan(key: &str, sub_key: &str) -> bool {
    key == WILDCARD || sub_key == WILDCARD
}

impl RegistrationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure `k` exists, creating an empty producer list if absent.
    /// Idempotent.
    pub fn add_registration(&self, k: Registration) {
        self.map.write().entry(k).or_default();
    }

    /// Append `p` under `k`, creating `k` if absent. Returns `false` and
    /// leaves the list untouched if a producer with the same id is already
    /// present.
    pub fn add_producer(&self, k: Registration, p: Arc<Producer>) -> bool {
        let mut map = self.map.write();
        let producers = map.entry(k).or_default();
        if producers.iter().any(|existing| existing.id() == p.id()) {
            return false;
        }
        producers.push(p);
        true
    }

    /// Remove every producer with `id` from `k`. Returns whether any were
    /// removed and how many remain. The key stays in the map even when the
    /// list is now empty.
    pub fn remove_producer(&self, k: &Registration, id: &str) -> (bool, usize) {
        let mut map = self.map.write();
        let Some(producers) = map.get_mut(k) else {
            return (false, 0);
        };
        let before = producers.len();
        producers.retain(|p| p.id() != id);
        (producers.len() < before, producers.len())
    }

    /// Delete `k` and its producer list entirely.
    pub fn remove_registration(&self, k: &Registration) {
        self.map.write().remove(k);
    }

    /// Find registrations matching the query. Without a wildcard this is an
    /// exact lookup returning zero or one entry; with one, a full scan.
    #[must_use]
    pub fn find_registrations(&self, category: &str, key: &str, sub_key: &str) -> Registrations {
        let map = self.map.read();
        if !needs_scan(key, sub_key) {
            let k = Registration::new(category, key, sub_key);
            if map.contains_key(&k) {
                return Registrations(vec![k]);
            }
            return Registrations::default();
        }
        map.keys()
            .filter(|k| k.is_match(category, key, sub_key))
            .cloned()
            .collect()
    }

    /// Find producers under registrations matching the query. Scans across
    /// multiple registrations deduplicate by producer id.
    #[must_use]
    pub fn find_producers(&self, category: &str, key: &str, sub_key: &str) -> Producers {
        let map = self.map.read();
        if !needs_scan(key, sub_key) {
            let k = Registration::new(category, key, sub_key);
            return Producers(map.get(&k).cloned().unwrap_or_default());
        }

        let mut results: Vec<Arc<Producer>> = Vec::new();
        for (k, producers) in map.iter() {
            if !k.is_match(category, key, sub_key) {
                continue;
            }
            for p in producers {
                if !results.iter().any(|seen| seen.id() == p.id()) {
                    results.push(Arc::clone(p));
                }
            }
        }
        Producers(results)
    }

    /// Reverse lookup: every registration whose list contains a producer
    /// with `id`.
    #[must_use]
    pub fn lookup_registrations(&self, id: &str) -> Registrations {
        self.map
            .read()
            .iter()
            .filter(|(_, producers)| producers.iter().any(|p| p.id() == id))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// A point-in-time copy of the whole map, for the debug dump.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Registration, Producers)> {
        self.map
            .read()
            .iter()
            .map(|(k, producers)| (k.clone(), Producers(producers.clone())))
            .collect()
    }
}
