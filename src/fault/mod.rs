//! Fault injection subsystem.
//!
//! # Data Flow
//! ```text
//! query / form parameters
//!     → spec.rs (FaultSpec: delays, status, content type, repeat, broken, type)
//!     → injector.rs (apply delay → status → takeover → content type)
//!     → ResponsePlan handed to the response synthesizer
//! ```
//!
//! # Design Decisions
//! - Parsing never fails; malformed values read as unset
//! - Every suspension point is a cancellable wait (wait.rs)
//! - Takeover is a capability checked once, absent on transports without it

pub mod injector;
pub mod spec;
pub mod wait;

pub use injector::{FaultInjector, Injection, ResponsePlan};
pub use spec::{FaultSpec, DEFAULT_CHUNK_REPEAT, DEFAULT_ECHO_REPEAT};
pub use wait::sleep_or_cancel;
