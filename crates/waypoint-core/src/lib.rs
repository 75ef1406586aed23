//! # waypoint-core
//!
//! In-memory registration store for the waypoint lookup service.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Registration** - `(category, key, sub_key)` index entries
//! - **PeerInfo** / **Producer** - producer descriptions with heartbeat and
//!   tombstone state
//! - **RegistrationStore** - the thread-safe multi-indexed map both
//!   front-ends share
//!
//! The store is soft state: nothing is persisted, and producer liveness is
//! enforced at query time via
//! [`Producers::filter_by_active`](producer::Producers::filter_by_active)
//! rather than by expiring entries.

pub mod producer;
pub mod registration;
pub mod store;

pub use producer::{unix_nanos, PeerInfo, Producer, Producers};
pub use registration::{
    Registration, Registrations, CATEGORY_CHANNEL, CATEGORY_CLIENT, CATEGORY_TOPIC, WILDCARD,
};
pub use store::RegistrationStore;
