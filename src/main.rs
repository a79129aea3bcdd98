//! HTTP echo server (fault injection test target)
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ net::listener ──▶ http::server ──▶ middleware::tracking
//!                      (bounded accept)  (hyper conn,     (counters, context,
//!                                         takeover)        "Request Done")
//!                                                               │
//!                                                               ▼
//!                                               handlers::{echo, chunk, status,
//!                                                          sum, help}
//!                                                               │
//!                                          fault::injector ◀────┤
//!                                          (sleep, http_code,   │
//!                                           broken, type)       ▼
//!     Client Response                                   http::response
//!     ◀──────────────────────────────────────────────── (payload, sleep_ah)
//! ```

use clap::Parser;
use std::sync::Arc;

use http_echo_server::config::cli::CliArgs;
use http_echo_server::lifecycle::signals::spawn_signal_listener;
use http_echo_server::net::Listener;
use http_echo_server::observability::{logging, metrics};
use http_echo_server::{HttpServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match CliArgs::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("http-echo-server: {}", e);
            std::process::exit(2);
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!("http-echo-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        static_body = config.response.static_body.is_some(),
        default_status = ?config.response.default_status,
        log_headers = config.observability.log_headers,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = match Listener::bind(&config.listener).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(
                bind_address = %config.listener.bind_address,
                error = %e,
                "Cannot listen"
            );
            std::process::exit(1);
        }
    };

    let shutdown = Arc::new(Shutdown::new());
    let receiver = shutdown.subscribe();
    spawn_signal_listener(shutdown.clone());

    HttpServer::new(config).run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
