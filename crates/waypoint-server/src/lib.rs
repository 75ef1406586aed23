//! # waypoint-server
//!
//! The waypoint lookup daemon: an in-memory directory of message producers
//! with a line-oriented TCP protocol for registration and an HTTP JSON API
//! for discovery and administration.

pub mod config;
pub mod daemon;
pub mod http;
pub mod metrics;
pub mod response;
mod tcp;

pub use config::Config;
pub use daemon::{AppState, Lookupd};
