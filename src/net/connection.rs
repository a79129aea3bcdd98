//! Process-wide request and connection bookkeeping.
//!
//! # Responsibilities
//! - Count requests issued since startup (sequence IDs)
//! - Count requests currently in flight
//! - Remember when each live remote address started its request
//!
//! The tracker is created once at startup and shared by handle; every
//! mutation is an atomic or a sharded map operation, so no lock is held
//! across an await point.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::observability::metrics;

/// Shared request counters and live-connection table.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    /// Requests that entered tracking and have not left yet.
    in_flight: AtomicI64,
    /// Requests issued since startup; doubles as the sequence ID source.
    total_issued: AtomicU64,
    /// Remote address → time its current request started.
    live: DashMap<String, Instant>,
}

impl ConnectionTracker {
    /// Create a new tracker with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request entering the server. Returns a guard that undoes
    /// the in-flight bookkeeping when dropped.
    pub fn enter(self: &Arc<Self>, remote: &str) -> InFlightGuard {
        let id = self.total_issued.fetch_add(1, Ordering::SeqCst) + 1;
        let connecting = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        self.live.insert(remote.to_string(), started);
        metrics::set_in_flight(connecting);

        InFlightGuard {
            tracker: Arc::clone(self),
            remote: remote.to_string(),
            started,
            id,
            connecting,
        }
    }

    /// Current in-flight request count.
    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Total requests issued since startup.
    pub fn total_issued(&self) -> u64 {
        self.total_issued.load(Ordering::SeqCst)
    }

    /// Point-in-time view for the status endpoint.
    pub fn snapshot(&self) -> TrackerSnapshot {
        let now = Instant::now();
        let remote_detail: BTreeMap<String, String> = self
            .live
            .iter()
            .map(|entry| {
                let age = now.saturating_duration_since(*entry.value());
                (entry.key().clone(), format_age(age))
            })
            .collect();

        TrackerSnapshot {
            connecting: self.in_flight(),
            request_id: self.total_issued(),
            remote_total: remote_detail.len(),
            remote_detail,
        }
    }
}

fn format_age(age: Duration) -> String {
    format!("{:?}", age)
}

/// Serialized body of the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackerSnapshot {
    pub connecting: i64,
    #[serde(rename = "RequestID")]
    pub request_id: u64,
    pub remote_total: usize,
    pub remote_detail: BTreeMap<String, String>,
}

/// Guard for one tracked request.
/// Decrements the in-flight count and clears the live entry when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    tracker: Arc<ConnectionTracker>,
    remote: String,
    started: Instant,
    id: u64,
    connecting: i64,
}

impl InFlightGuard {
    /// Sequence ID assigned to this request.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// In-flight count observed right after this request entered.
    pub fn connecting(&self) -> i64 {
        self.connecting
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let remaining = self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        // A later request from the same address may have replaced the entry.
        self.tracker
            .live
            .remove_if(&self.remote, |_, started| *started == self.started);
        metrics::set_in_flight(remaining);
        tracing::trace!(request_id = self.id, remote = %self.remote, "Request left tracking");
    }
}
