//! # waypointd
//!
//! Lookup/discovery daemon for the waypoint messaging platform.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! waypointd
//!
//! # Run with a config file in the search path
//! cp waypoint.toml /etc/waypoint/ && waypointd
//!
//! # Run with environment variables
//! WAYPOINT_TCP_ADDRESS=0.0.0.0:4160 WAYPOINT_HTTP_ADDRESS=0.0.0.0:4161 waypointd
//! ```

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waypoint_server::{metrics, Config, Lookupd};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waypoint=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;

    tracing::info!(
        tcp = %config.tcp_address,
        http = %config.http_address,
        "Starting waypoint lookup daemon"
    );

    // Initialize metrics
    metrics::init_metrics();
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            tracing::error!("Failed to start metrics server: {}", e);
        }
    }

    // Bind and serve
    let lookupd = Lookupd::bind(config).await?;
    lookupd.run().await
}
