//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → cli.rs (startup flags override file values)
//!     → validation.rs (semantic checks)
//!     → EchoConfig (validated, immutable)
//!     → shared via Arc to all handlers
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow running with no file at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::EchoConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::OutputFormat;
pub use schema::ResponseConfig;
