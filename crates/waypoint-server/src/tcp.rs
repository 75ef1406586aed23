//! Producer-facing TCP protocol engine.
//!
//! One task per accepted connection runs the command loop: read a
//! `\n`-terminated line, execute, reply with a length-prefixed payload.
//! Fatal protocol errors close the connection after the error reply is
//! flushed. Whenever the loop exits, an identified client is purged from
//! every registration it appears in.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use waypoint_core::{PeerInfo, Producer, Registration, CATEGORY_CHANNEL, CATEGORY_CLIENT};
use waypoint_protocol::codec::FrameError;
use waypoint_protocol::{codec, command, names, ClientError, E_BAD_BODY, E_INVALID};
use waypoint_protocol::{IdentifyRequest, IdentifyResponse};

use crate::daemon::AppState;
use crate::metrics;

/// Per-connection state. `peer_info` is set once IDENTIFY succeeds and
/// doubles as the "has identified" flag.
struct Client {
    addr: SocketAddr,
    peer_info: Option<Arc<PeerInfo>>,
}

/// Accept loop. Errors on individual accepts are logged and the loop
/// continues; the loop ends when the listener is closed (daemon shutdown).
pub(crate) async fn run_tcp_server(
    listener: TcpListener,
    state: Arc<AppState>,
) -> anyhow::Result<()> {
    loop {
        match listener.accept().await {
            Ok((socket, peer_addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    handle_connection(socket, peer_addr, state).await;
                });
            }
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                tokio::task::yield_now().await;
            }
        }
    }
}

async fn handle_connection(socket: TcpStream, peer_addr: SocketAddr, state: Arc<AppState>) {
    let _metrics_guard = metrics::ConnectionMetricsGuard::new();
    debug!(client = %peer_addr, "new connection");

    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let mut client = Client {
        addr: peer_addr,
        peer_info: None,
    };

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(client = %peer_addr, error = %e, "read error");
                break;
            }
        }

        let trimmed = line.trim();
        let (cmd, params) = command::split_command_line(trimmed);
        metrics::record_command(cmd);

        match exec(&mut client, &mut reader, &state, cmd, &params).await {
            Ok(response) => {
                if codec::write_frame(&mut write_half, &response).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                error!(client = %peer_addr, error = %err, "command failed");
                metrics::record_protocol_error(err.code());
                if codec::write_frame(&mut write_half, err.to_string().as_bytes())
                    .await
                    .is_err()
                {
                    break;
                }
                if err.is_fatal() {
                    break;
                }
            }
        }
    }

    drop(write_half);
    info!(client = %peer_addr, "closing");

    if let Some(peer) = &client.peer_info {
        let registrations = state.store.lookup_registrations(&peer.id);
        for r in &registrations {
            let (removed, _) = state.store.remove_producer(r, &peer.id);
            if removed {
                info!(
                    client = %peer.id,
                    category = %r.category,
                    key = %r.key,
                    sub_key = %r.sub_key,
                    "UNREGISTER on disconnect"
                );
            }
        }
        metrics::set_active_producers(
            state
                .store
                .find_producers(CATEGORY_CLIENT, "", "")
                .len(),
        );
    }
}

async fn exec<R>(
    client: &mut Client,
    reader: &mut R,
    state: &AppState,
    cmd: &str,
    params: &[&str],
) -> Result<Vec<u8>, ClientError>
where
    R: AsyncBufRead + Unpin,
{
    match cmd {
        "PING" => Ok(ping(client)),
        "IDENTIFY" => identify(client, reader, state).await,
        "REGISTER" => register(client, state, params),
        "UNREGISTER" => unregister(client, state, params),
        other => Err(ClientError::fatal(
            E_INVALID,
            format!("invalid command {other}"),
        )),
    }
}

/// PING refreshes the heartbeat of an identified client. A PING may arrive
/// before IDENTIFY on a fresh connection; it succeeds without touching state.
fn ping(client: &Client) -> Vec<u8> {
    if let Some(peer) = &client.peer_info {
        let previous = peer.touch();
        debug!(
            client = %peer.id,
            last_ping_ns = peer.last_update() - previous,
            "pinged"
        );
    }
    b"OK".to_vec()
}

async fn identify<R>(
    client: &mut Client,
    reader: &mut R,
    state: &AppState,
) -> Result<Vec<u8>, ClientError>
where
    R: AsyncBufRead + Unpin,
{
    if client.peer_info.is_some() {
        return Err(ClientError::fatal(E_INVALID, "cannot IDENTIFY again"));
    }

    let body = codec::read_frame(reader).await.map_err(|e| match e {
        FrameError::Negative(_) | FrameError::TooLarge(_) => {
            ClientError::fatal(E_BAD_BODY, "IDENTIFY failed to read body size")
        }
        FrameError::Io(_) => ClientError::fatal(E_BAD_BODY, "IDENTIFY failed to read body"),
    })?;

    let request = IdentifyRequest::decode(&body)?;
    request.validate()?;

    let id = client.addr.to_string();
    let peer_info = Arc::new(PeerInfo::new(
        id.clone(),
        id,
        request.hostname,
        request.broadcast_address,
        request.tcp_port,
        request.http_port,
        request.version,
    ));

    info!(
        client = %peer_info.id,
        broadcast_address = %peer_info.broadcast_address,
        tcp_port = peer_info.tcp_port,
        http_port = peer_info.http_port,
        version = %peer_info.version,
        "IDENTIFY"
    );

    client.peer_info = Some(Arc::clone(&peer_info));
    if state.store.add_producer(
        Registration::client(),
        Arc::new(Producer::new(Arc::clone(&peer_info))),
    ) {
        info!(client = %peer_info.id, "REGISTER client");
    }
    metrics::set_active_producers(
        state
            .store
            .find_producers(CATEGORY_CLIENT, "", "")
            .len(),
    );

    let response = IdentifyResponse {
        tcp_port: state.tcp_addr.port(),
        http_port: state.http_addr.port(),
        version: AppState::VERSION.to_string(),
        broadcast_address: state.config.broadcast_address.clone(),
        hostname: state.hostname.clone(),
    };
    match serde_json::to_vec(&response) {
        Ok(body) => Ok(body),
        Err(e) => {
            error!(error = %e, "failed to marshal IDENTIFY response");
            Ok(b"OK".to_vec())
        }
    }
}

fn register(client: &Client, state: &AppState, params: &[&str]) -> Result<Vec<u8>, ClientError> {
    let Some(peer) = &client.peer_info else {
        return Err(ClientError::fatal(E_INVALID, "client must IDENTIFY"));
    };

    let (topic, channel) = command::get_topic_channel("REGISTER", params)?;

    if let Some(channel) = &channel {
        let key = Registration::channel(&topic, channel);
        if state
            .store
            .add_producer(key, Arc::new(Producer::new(Arc::clone(peer))))
        {
            info!(client = %peer.id, topic = %topic, channel = %channel, "REGISTER channel");
        }
    }
    let key = Registration::topic(&topic);
    if state
        .store
        .add_producer(key, Arc::new(Producer::new(Arc::clone(peer))))
    {
        info!(client = %peer.id, topic = %topic, "REGISTER topic");
    }

    Ok(b"OK".to_vec())
}

fn unregister(client: &Client, state: &AppState, params: &[&str]) -> Result<Vec<u8>, ClientError> {
    let Some(peer) = &client.peer_info else {
        return Err(ClientError::fatal(E_INVALID, "client must IDENTIFY"));
    };

    let (topic, channel) = command::get_topic_channel("UNREGISTER", params)?;

    if let Some(channel) = &channel {
        let key = Registration::channel(&topic, channel);
        let (removed, remaining) = state.store.remove_producer(&key, &peer.id);
        if removed {
            info!(client = %peer.id, topic = %topic, channel = %channel, "UNREGISTER channel");
        }
        // Ephemeral channels disappear with their last producer.
        if remaining == 0 && names::is_ephemeral(channel) {
            state.store.remove_registration(&key);
        }
    } else {
        // Topic-level unregistration. Producers normally unregister their
        // channels first, so removals here are unexpected.
        let registrations = state
            .store
            .find_registrations(CATEGORY_CHANNEL, &topic, waypoint_core::WILDCARD);
        for r in &registrations {
            let (removed, _) = state.store.remove_producer(r, &peer.id);
            if removed {
                warn!(
                    client = %peer.id,
                    topic = %topic,
                    channel = %r.sub_key,
                    "unexpected UNREGISTER of channel producer"
                );
            }
        }

        let key = Registration::topic(&topic);
        let (removed, _) = state.store.remove_producer(&key, &peer.id);
        if removed {
            info!(client = %peer.id, topic = %topic, "UNREGISTER topic");
        }
    }

    Ok(b"OK".to_vec())
}
