//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → takeover.rs (per-connection sever handle)
//!     → Hand off to HTTP layer
//!
//! Per request:
//!     → connection.rs (in-flight counters, live address table)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Counters are atomics; the live table is a sharded map
//! - Takeover is a capability carried in request extensions, absent when
//!   the transport cannot provide it

pub mod connection;
pub mod listener;
pub mod takeover;

pub use connection::{ConnectionTracker, InFlightGuard, TrackerSnapshot};
pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use takeover::ConnectionTakeover;
