//! Request middleware.

pub mod tracking;

pub use tracking::{observe_requests, track_requests};
