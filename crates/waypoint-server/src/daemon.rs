//! Daemon assembly.
//!
//! [`Lookupd::bind`] opens both listeners up front so the resolved addresses
//! are available before any client connects (IDENTIFY responses advertise
//! the real ports even when configured with `:0`). [`Lookupd::run_until`]
//! drives the TCP accept loop and the HTTP server concurrently; dropping the
//! listeners on shutdown unblocks both loops.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use waypoint_core::RegistrationStore;

use crate::config::Config;
use crate::{http, tcp};

/// State shared by the TCP engine and the HTTP handlers. The registration
/// store is the only mutable part.
pub struct AppState {
    pub store: RegistrationStore,
    pub config: Config,
    pub tcp_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub hostname: String,
}

impl AppState {
    /// The daemon version advertised by IDENTIFY and `/info`.
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");
}

/// The lookup daemon: a registration store with a TCP front-end for
/// producers and an HTTP front-end for consumers and operators.
pub struct Lookupd {
    state: Arc<AppState>,
    tcp_listener: TcpListener,
    http_listener: TcpListener,
}

impl Lookupd {
    /// Bind both listeners and assemble the shared state.
    ///
    /// # Errors
    ///
    /// Returns an error if either address cannot be bound.
    pub async fn bind(config: Config) -> Result<Self> {
        let tcp_listener = TcpListener::bind(&config.tcp_address)
            .await
            .with_context(|| format!("Failed to bind TCP listener on {}", config.tcp_address))?;
        let http_listener = TcpListener::bind(&config.http_address)
            .await
            .with_context(|| format!("Failed to bind HTTP listener on {}", config.http_address))?;

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());

        let state = Arc::new(AppState {
            store: RegistrationStore::new(),
            tcp_addr: tcp_listener.local_addr()?,
            http_addr: http_listener.local_addr()?,
            hostname,
            config,
        });

        Ok(Self {
            state,
            tcp_listener,
            http_listener,
        })
    }

    /// Shared state, for tests and embedding.
    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// The resolved TCP protocol address.
    #[must_use]
    pub fn tcp_addr(&self) -> SocketAddr {
        self.state.tcp_addr
    }

    /// The resolved HTTP API address.
    #[must_use]
    pub fn http_addr(&self) -> SocketAddr {
        self.state.http_addr
    }

    /// Run until interrupted (ctrl-c).
    ///
    /// # Errors
    ///
    /// Returns an error if either server loop fails.
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Run until the given future resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if either server loop fails.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        info!(addr = %self.tcp_addr(), "TCP: listening");
        info!(addr = %self.http_addr(), "HTTP: listening");

        let app = http::router(Arc::clone(&self.state));
        let http_server = axum::serve(self.http_listener, app).into_future();
        let tcp_server = tcp::run_tcp_server(self.tcp_listener, Arc::clone(&self.state));

        tokio::select! {
            () = shutdown => {
                info!("shutdown signal received");
                Ok(())
            }
            result = http_server => result.context("HTTP server failed"),
            result = tcp_server => result,
        }
    }
}
