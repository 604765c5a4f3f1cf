//! PinkPunk Stream Client Binary
//!
//! Connects to the trending token feed and logs normalized batches - the
//! consumer stand-in for a rendering layer.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin pinkpunk-stream-client
//! ```
//!
//! # Environment Variables (all optional)
//!
//! - `TRENDING_FEED_URL`: Feed endpoint (default: wss://web-t.pinkpunk.io/ws)
//! - `TRENDING_CHAIN_ID`: Chain identifier (default: 56)
//! - `TRENDING_HEARTBEAT_INTERVAL_SECS`: Ping interval (default: 30)
//! - `TRENDING_HEARTBEAT_TIMEOUT_SECS`: Pong window (default: 10)
//! - `TRENDING_RECONNECT_DELAY_MS`: Backoff base delay (default: 3000)
//! - `TRENDING_MAX_RECONNECT_ATTEMPTS`: Attempt budget (default: 5)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use pinkpunk_stream_client::{
    ClientSettings, TrendingClient, TrendingClientConfig, init_telemetry,
};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let _ = dotenvy::dotenv();

    init_telemetry();

    tracing::info!("Starting PinkPunk stream client");

    let settings = ClientSettings::from_env()?;
    log_settings(&settings);

    let client = Arc::new(TrendingClient::new(TrendingClientConfig::from_settings(
        &settings,
    )));

    client.on_connect(|| {
        tracing::info!("trending feed connected");
        Ok(())
    });
    client.on_disconnect(|| {
        tracing::info!("trending feed disconnected");
        Ok(())
    });
    client.on_error(|error| {
        tracing::error!(error = %error, "trending feed error");
        Ok(())
    });
    client.on_message(|tokens| {
        tracing::info!(count = tokens.len(), "token batch received");
        for token in tokens.iter().take(5) {
            tracing::info!(
                rank = token.rank,
                symbol = %token.symbol,
                price = token.price,
                change_1h = token.price_change_1h,
                change_24h = token.price_change_24h,
                volume_24h = token.volume_24h,
                "trending token"
            );
        }
        Ok(())
    });

    client.connect();

    await_shutdown().await;

    client.disconnect();
    tracing::info!("Stream client stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_settings(settings: &ClientSettings) {
    tracing::info!(
        url = %settings.feed.url,
        chain_id = %settings.feed.chain_id,
        heartbeat_interval_secs = settings.websocket.heartbeat_interval.as_secs(),
        heartbeat_timeout_secs = settings.websocket.heartbeat_timeout.as_secs(),
        reconnect_base_delay_ms = settings.websocket.reconnect_base_delay.as_millis(),
        max_reconnect_attempts = settings.websocket.max_reconnect_attempts,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
