//! Producer descriptions and liveness filtering.
//!
//! A [`PeerInfo`] is the self-description a producer sends on IDENTIFY. It is
//! shared by `Arc` between every registration that refers to the same
//! connection, so a heartbeat refreshes `last_update` for all of them at
//! once. The [`Producer`] wrapper adds tombstone state and is created fresh
//! for every insertion, keeping tombstones scoped to the registration they
//! were set through.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Current time as Unix nanoseconds.
#[must_use]
pub fn unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// A producer's addressing information, received in the IDENTIFY body.
#[derive(Debug, Serialize)]
pub struct PeerInfo {
    /// Unique per live connection; the remote `host:port` of the TCP socket.
    #[serde(skip)]
    pub id: String,
    pub remote_address: String,
    pub hostname: String,
    pub broadcast_address: String,
    pub tcp_port: u16,
    pub http_port: u16,
    pub version: String,
    /// Unix nanoseconds of the last IDENTIFY or PING, read and written
    /// atomically so heartbeats never take the store lock.
    #[serde(skip)]
    last_update: AtomicI64,
}

impl PeerInfo {
    /// Create a peer record with `last_update` set to now.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        remote_address: impl Into<String>,
        hostname: impl Into<String>,
        broadcast_address: impl Into<String>,
        tcp_port: u16,
        http_port: u16,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            remote_address: remote_address.into(),
            hostname: hostname.into(),
            broadcast_address: broadcast_address.into(),
            tcp_port,
            http_port,
            version: version.into(),
            last_update: AtomicI64::new(unix_nanos()),
        }
    }

    /// Refresh `last_update` to now, returning the previous value.
    pub fn touch(&self) -> i64 {
        self.last_update.swap(unix_nanos(), Ordering::Relaxed)
    }

    /// The last heartbeat, as Unix nanoseconds.
    #[must_use]
    pub fn last_update(&self) -> i64 {
        self.last_update.load(Ordering::Relaxed)
    }
}

/// A producer entry in one registration: shared peer info plus tombstone
/// state local to this entry.
#[derive(Debug)]
pub struct Producer {
    peer_info: Arc<PeerInfo>,
    tombstoned: AtomicBool,
    tombstoned_at: AtomicI64,
}

impl Producer {
    #[must_use]
    pub fn new(peer_info: Arc<PeerInfo>) -> Self {
        Self {
            peer_info,
            tombstoned: AtomicBool::new(false),
            tombstoned_at: AtomicI64::new(0),
        }
    }

    #[must_use]
    pub fn peer_info(&self) -> &Arc<PeerInfo> {
        &self.peer_info
    }

    /// The producer's connection id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.peer_info.id
    }

    /// Hide this producer from lookups for the configured lifetime.
    pub fn tombstone(&self) {
        self.tombstoned_at.store(unix_nanos(), Ordering::Relaxed);
        self.tombstoned.store(true, Ordering::Relaxed);
    }

    /// Whether the tombstone is still in effect. A zero lifetime means
    /// tombstones are ignored entirely.
    #[must_use]
    pub fn is_tombstoned(&self, lifetime: Duration) -> bool {
        if !self.tombstoned.load(Ordering::Relaxed) {
            return false;
        }
        let elapsed = unix_nanos() - self.tombstoned_at.load(Ordering::Relaxed);
        elapsed < lifetime.as_nanos() as i64
    }

    /// Raw tombstone fields, for the debug dump.
    #[must_use]
    pub fn tombstone_state(&self) -> (bool, i64) {
        (
            self.tombstoned.load(Ordering::Relaxed),
            self.tombstoned_at.load(Ordering::Relaxed),
        )
    }
}

impl fmt::Display for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {}]",
            self.peer_info.broadcast_address, self.peer_info.tcp_port, self.peer_info.http_port
        )
    }
}

/// An owned list of producers returned from store queries.
#[derive(Debug, Default, Clone)]
pub struct Producers(pub Vec<Arc<Producer>>);

impl Producers {
    /// Retain producers seen within `inactivity_timeout` that are not
    /// currently tombstoned. Pass a zero `tombstone_lifetime` to keep
    /// tombstoned producers in the result.
    #[must_use]
    pub fn filter_by_active(
        &self,
        inactivity_timeout: Duration,
        tombstone_lifetime: Duration,
    ) -> Producers {
        let now = unix_nanos();
        Producers(
            self.0
                .iter()
                .filter(|p| {
                    let idle = now - p.peer_info().last_update();
                    idle <= inactivity_timeout.as_nanos() as i64
                        && !p.is_tombstoned(tombstone_lifetime)
                })
                .cloned()
                .collect(),
        )
    }

    /// Project to the underlying peer info records.
    #[must_use]
    pub fn peer_infos(&self) -> Vec<Arc<PeerInfo>> {
        self.0.iter().map(|p| Arc::clone(p.peer_info())).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Producer>> {
        self.0.iter()
    }
}

impl IntoIterator for Producers {
    type Item = Arc<Producer>;
    type IntoIter = std::vec::IntoIter<Arc<Producer>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Producers {
    type Item = &'a Arc<Producer>;
    type IntoIter = std::slice::Iter<'a, Arc<Producer>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Arc<Producer>> for Producers {
    fn from_iter<T: IntoIterator<Item = Arc<Producer>>>(iter: T) -> Self {
        Producers(iter.into_iter().collect())
    }
}
