//! HTTP query/admin API.
//!
//! Read endpoints serve consumer lookups; write endpoints let operators
//! create, delete and tombstone registrations. Every route goes through the
//! same middleware stack: request tracing and panic recovery, with response
//! serialization handled by the envelope types in [`crate::response`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use waypoint_core::{Registration, CATEGORY_CHANNEL, CATEGORY_CLIENT, CATEGORY_TOPIC, WILDCARD};
use waypoint_protocol::names;

use crate::daemon::AppState;
use crate::response::{handle_panic, ApiError, ApiPayload};

type Params = HashMap<String, String>;

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/info", get(do_info))
        .route("/debug", get(do_debug))
        .route("/lookup", get(do_lookup))
        .route("/topics", get(do_topics))
        .route("/channels", get(do_channels))
        .route("/nodes", get(do_nodes))
        .route("/topic/create", post(do_create_topic))
        .route("/topic/delete", post(do_delete_topic))
        .route("/channel/create", post(do_create_channel))
        .route("/channel/delete", post(do_delete_channel))
        .route("/topic/tombstone", post(do_tombstone_topic_producer))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn required_arg(params: &Params, name: &str) -> Result<String, ApiError> {
    params
        .get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ApiError::bad_request(format!("MISSING_ARG_{}", name.to_uppercase())))
}

/// Extract and validate the topic/channel argument pair used by the channel
/// admin endpoints.
fn topic_channel_args(params: &Params) -> Result<(String, String), ApiError> {
    let topic = required_arg(params, "topic")?;
    if !names::is_valid_topic_name(&topic) {
        return Err(ApiError::bad_request("INVALID_ARG_TOPIC"));
    }

    let channel = required_arg(params, "channel")?;
    if !names::is_valid_channel_name(&channel) {
        return Err(ApiError::bad_request("INVALID_ARG_CHANNEL"));
    }

    Ok((topic, channel))
}

async fn not_found() -> ApiError {
    ApiError::not_found("NOT_FOUND")
}

/// Liveness probe; plain text, outside the envelope.
async fn ping() -> &'static str {
    "OK"
}

async fn do_info() -> Result<ApiPayload, ApiError> {
    ApiPayload::json(json!({ "version": AppState::VERSION }))
}

async fn do_topics(State(state): State<Arc<AppState>>) -> Result<ApiPayload, ApiError> {
    let topics = state
        .store
        .find_registrations(CATEGORY_TOPIC, WILDCARD, "")
        .keys();
    ApiPayload::json(json!({ "topics": topics }))
}

async fn do_channels(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<ApiPayload, ApiError> {
    let topic = required_arg(&params, "topic")?;
    let channels = state
        .store
        .find_registrations(CATEGORY_CHANNEL, &topic, WILDCARD)
        .sub_keys();
    ApiPayload::json(json!({ "channels": channels }))
}

async fn do_lookup(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<ApiPayload, ApiError> {
    let topic = required_arg(&params, "topic")?;

    let registrations = state.store.find_registrations(CATEGORY_TOPIC, &topic, "");
    if registrations.is_empty() {
        return Err(ApiError::not_found("TOPIC_NOT_FOUND"));
    }

    let channels = state
        .store
        .find_registrations(CATEGORY_CHANNEL, &topic, WILDCARD)
        .sub_keys();
    let producers = state
        .store
        .find_producers(CATEGORY_TOPIC, &topic, "")
        .filter_by_active(
            state.config.inactive_producer_timeout(),
            state.config.tombstone_lifetime(),
        );
    ApiPayload::json(json!({
        "channels": channels,
        "producers": producers.peer_infos(),
    }))
}

#[derive(Debug, Serialize)]
struct Node {
    remote_address: String,
    hostname: String,
    broadcast_address: String,
    tcp_port: u16,
    http_port: u16,
    version: String,
    tombstones: Vec<bool>,
    topics: Vec<String>,
}

async fn do_nodes(State(state): State<Arc<AppState>>) -> Result<ApiPayload, ApiError> {
    // Tombstoned nodes stay listed here; a zero lifetime disables the filter.
    let producers = state
        .store
        .find_producers(CATEGORY_CLIENT, "", "")
        .filter_by_active(state.config.inactive_producer_timeout(), Duration::ZERO);

    let mut nodes = Vec::with_capacity(producers.len());
    for p in &producers {
        let topics = state
            .store
            .lookup_registrations(p.id())
            .filter(CATEGORY_TOPIC, WILDCARD, "")
            .keys();

        // Each topic key holds its own producer entry for this peer; that
        // entry carries the tombstone state for the (producer, topic) pair.
        let mut tombstones = Vec::with_capacity(topics.len());
        for topic in &topics {
            let tombstoned = state
                .store
                .find_producers(CATEGORY_TOPIC, topic, "")
                .iter()
                .find(|tp| Arc::ptr_eq(tp.peer_info(), p.peer_info()))
                .map(|tp| tp.is_tombstoned(state.config.tombstone_lifetime()))
                .unwrap_or(false);
            tombstones.push(tombstoned);
        }

        let peer = p.peer_info();
        nodes.push(Node {
            remote_address: peer.remote_address.clone(),
            hostname: peer.hostname.clone(),
            broadcast_address: peer.broadcast_address.clone(),
            tcp_port: peer.tcp_port,
            http_port: peer.http_port,
            version: peer.version.clone(),
            tombstones,
            topics,
        });
    }

    ApiPayload::json(json!({ "producers": nodes }))
}

async fn do_create_topic(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<ApiPayload, ApiError> {
    let topic = required_arg(&params, "topic")?;
    if !names::is_valid_topic_name(&topic) {
        return Err(ApiError::bad_request("INVALID_ARG_TOPIC"));
    }

    info!(topic = %topic, "adding topic");
    state.store.add_registration(Registration::topic(&topic));

    Ok(ApiPayload::Empty)
}

async fn do_delete_topic(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<ApiPayload, ApiError> {
    let topic = required_arg(&params, "topic")?;

    for registration in &state
        .store
        .find_registrations(CATEGORY_CHANNEL, &topic, WILDCARD)
    {
        info!(topic = %topic, channel = %registration.sub_key, "removing channel");
        state.store.remove_registration(registration);
    }

    for registration in &state.store.find_registrations(CATEGORY_TOPIC, &topic, "") {
        info!(topic = %topic, "removing topic");
        state.store.remove_registration(registration);
    }

    Ok(ApiPayload::Empty)
}

async fn do_create_channel(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<ApiPayload, ApiError> {
    let (topic, channel) = topic_channel_args(&params)?;

    info!(topic = %topic, channel = %channel, "adding channel");
    state
        .store
        .add_registration(Registration::channel(&topic, &channel));

    // The topic key is a long-lived index entry; creating a channel ensures
    // its topic exists too.
    info!(topic = %topic, "adding topic");
    state.store.add_registration(Registration::topic(&topic));

    Ok(ApiPayload::Empty)
}

async fn do_delete_channel(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<ApiPayload, ApiError> {
    let (topic, channel) = topic_channel_args(&params)?;

    let registrations = state
        .store
        .find_registrations(CATEGORY_CHANNEL, &topic, &channel);
    if registrations.is_empty() {
        return Err(ApiError::not_found("CHANNEL_NOT_FOUND"));
    }

    info!(topic = %topic, channel = %channel, "removing channel");
    for registration in &registrations {
        state.store.remove_registration(registration);
    }

    Ok(ApiPayload::Empty)
}

async fn do_tombstone_topic_producer(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<ApiPayload, ApiError> {
    let topic = required_arg(&params, "topic")?;
    let node = required_arg(&params, "node")?;

    info!(topic = %topic, node = %node, "setting tombstone");
    for producer in &state.store.find_producers(CATEGORY_TOPIC, &topic, "") {
        let peer = producer.peer_info();
        let this_node = format!("{}:{}", peer.broadcast_address, peer.http_port);
        if this_node == node {
            producer.tombstone();
        }
    }

    Ok(ApiPayload::Empty)
}

async fn do_debug(State(state): State<Arc<AppState>>) -> Result<ApiPayload, ApiError> {
    let mut data: BTreeMap<String, Vec<serde_json::Value>> = BTreeMap::new();
    for (registration, producers) in state.store.snapshot() {
        let key = format!(
            "{}:{}:{}",
            registration.category, registration.key, registration.sub_key
        );
        let entries = data.entry(key).or_default();
        for p in &producers {
            let peer = p.peer_info();
            let (tombstoned, tombstoned_at) = p.tombstone_state();
            entries.push(json!({
                "id": peer.id,
                "hostname": peer.hostname,
                "broadcast_address": peer.broadcast_address,
                "tcp_port": peer.tcp_port,
                "http_port": peer.http_port,
                "version": peer.version,
                "last_update": peer.last_update(),
                "tombstoned": tombstoned,
                "tombstoned_at": tombstoned_at,
            }));
        }
    }

    ApiPayload::json(data)
}
