//! Endpoint handlers.
//!
//! | Path | Handler |
//! |---|---|
//! | `/` and unmatched paths | [`echo::echo`] |
//! | `/help` | [`help::help`] |
//! | `/chunk` | [`chunk::chunk`] |
//! | `/status` | [`status::status`] |
//! | `/cal/sum` | [`sum::sum`] |
//!
//! Every handler runs behind the tracking middleware and can rely on a
//! [`RequestContext`](crate::http::RequestContext) in the request extensions.

pub mod chunk;
pub mod echo;
pub mod help;
pub mod status;
pub mod sum;
