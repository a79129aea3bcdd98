//! HTTP echo server with fault injection.
//!
//! Echoes every request back (plain, JSON or XML) and lets the client
//! dictate latency, status codes, content type, repetition and abrupt
//! connection loss through query or form parameters.

pub mod config;
pub mod fault;
pub mod handlers;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::EchoConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
