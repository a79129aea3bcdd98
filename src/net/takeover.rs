//! Connection takeover capability.
//!
//! The accept loop attaches a [`ConnectionTakeover`] to every request it
//! serves. A handler holding one can sever the underlying socket: the
//! connection task stops polling hyper and drops the stream without
//! completing the response. Requests served some other way (in-process
//! tests, a different transport) carry no capability and the caller
//! treats the takeover as a no-op.
//!
//! The handle also owns the connection's liveness token. Request tokens
//! derive from it, so every request on a connection is cancelled when the
//! connection task exits or the server shuts down. Severing does not touch
//! it: a severed handler must stay parked until the socket is gone, or
//! hyper would still write its response.

use std::net::SocketAddr;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Handle allowing a handler to abort its own connection.
#[derive(Debug, Clone)]
pub struct ConnectionTakeover {
    peer: SocketAddr,
    sever: CancellationToken,
    liveness: CancellationToken,
}

impl ConnectionTakeover {
    /// `shutdown` is the server-wide token; the connection's liveness derives from it.
    pub fn new(peer: SocketAddr, shutdown: &CancellationToken) -> Self {
        Self {
            peer,
            sever: CancellationToken::new(),
            liveness: shutdown.child_token(),
        }
    }

    /// Remote end of the connection.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Ask the connection task to drop the socket immediately.
    pub fn sever(&self) {
        tracing::debug!(peer = %self.peer, "Severing connection");
        self.sever.cancel();
    }

    pub fn is_severed(&self) -> bool {
        self.sever.is_cancelled()
    }

    /// Resolves once [`sever`](Self::sever) has been called.
    pub async fn severed(&self) {
        self.sever.cancelled().await
    }

    /// Token for a request served on this connection.
    pub fn request_token(&self) -> CancellationToken {
        self.liveness.child_token()
    }

    /// Guard that ends the connection's liveness when the connection task exits.
    pub fn liveness_guard(&self) -> DropGuard {
        self.liveness.clone().drop_guard()
    }
}
