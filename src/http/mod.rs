//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper connection, peer address, takeover capability)
//!     → middleware/tracking.rs (counters, RequestContext, "Request Done" line)
//!     → request.rs (body capture, form values, wire dump)
//!     → handlers (echo, chunk, status, sum, help)
//!     → response.rs (payload encoding, delayed body)
//!     → Send to client
//! ```

pub mod context;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use context::{CtxErr, RequestContext};
pub use request::{CapturedRequest, FormValues, RequestRecord};
pub use server::{AppState, HttpServer};
