//! HTTP server setup and connection serving.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request tracking, tracing, per-route headers)
//! - Serve accepted connections over HTTP/1.1 and HTTP/2
//! - Attach the peer address and takeover capability to every request
//! - Drain connections on shutdown

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderValue},
    middleware,
    routing::any,
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::config::EchoConfig;
use crate::handlers;
use crate::http::middleware::{observe_requests, track_requests};
use crate::net::listener::ConnectionPermit;
use crate::net::{ConnectionTakeover, ConnectionTracker, Listener, ListenerError};

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EchoConfig>,
    pub tracker: Arc<ConnectionTracker>,
    /// Server-wide cancellation; every request token derives from it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: EchoConfig) -> Self {
        Self {
            config: Arc::new(config),
            tracker: Arc::new(ConnectionTracker::new()),
            shutdown: CancellationToken::new(),
        }
    }
}

/// HTTP server for the echo service.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: EchoConfig) -> Self {
        let state = AppState::new(config);
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// `/status` sits outside the counted routes so reading the counters
    /// never moves them.
    fn build_router(state: AppState) -> Router {
        let nosniff = SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );

        let counted = Router::new()
            .route("/", any(handlers::echo::echo))
            .route("/help", any(handlers::help::help))
            .route("/chunk", any(handlers::chunk::chunk).layer(nosniff))
            .route("/cal/sum", any(handlers::sum::sum))
            .fallback(handlers::echo::echo)
            .layer(middleware::from_fn_with_state(state.clone(), track_requests));

        let observed = Router::new()
            .route("/status", any(handlers::status::status))
            .layer(middleware::from_fn_with_state(state.clone(), observe_requests));

        counted
            .merge(observed)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for serving without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn tracker(&self) -> Arc<ConnectionTracker> {
        self.state.tracker.clone()
    }

    /// Run the server until `shutdown` fires, then drain open connections.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn_connection(stream, peer, permit),
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        self.state.shutdown.cancel();
        tracing::info!(
            in_flight = self.state.tracker.in_flight(),
            "HTTP server stopped"
        );
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let shutdown = self.state.shutdown.clone();
        let takeover = ConnectionTakeover::new(peer, &shutdown);
        let capability = takeover.clone();
        let service = self
            .router
            .clone()
            .map_request(move |mut req: Request<Incoming>| {
                req.extensions_mut().insert(ConnectInfo(peer));
                req.extensions_mut().insert(capability.clone());
                req
            });

        tokio::spawn(async move {
            let _permit = permit;
            // Declared before `conn` so it drops after it: a severed handler
            // is only released once the socket is gone.
            let _liveness = takeover.liveness_guard();

            let builder = auto::Builder::new(TokioExecutor::new());
            let conn = builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(service));
            tokio::pin!(conn);

            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(e) = result {
                        tracing::debug!(peer = %peer, error = %e, "Connection ended with error");
                    }
                }
                _ = takeover.severed() => {
                    tracing::debug!(peer = %peer, "Connection severed");
                }
                _ = shutdown.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    if let Err(e) = conn.await {
                        tracing::debug!(peer = %peer, error = %e, "Connection drain failed");
                    }
                }
            }
        });
    }
}
