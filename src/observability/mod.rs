//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → fields.rs (LogFields bag filled by middleware and handlers)
//!     → logging.rs (one "Request Done" line on the access target)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod fields;
pub mod logging;
pub mod metrics;

pub use fields::LogFields;
