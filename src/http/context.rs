//! Per-request execution context.
//!
//! The tracking middleware creates one [`RequestContext`] per request and
//! stores it in the request extensions. It carries the sequence ID, the
//! log field bag, and the request's cancellation token. The token is a
//! child of the server shutdown token and also fires on the request
//! deadline or when the request is torn down early.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::observability::LogFields;

const LIVE: u8 = 0;
const CANCELED: u8 = 1;
const DEADLINE: u8 = 2;

/// Why a request's token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtxErr {
    /// Client went away, server shut down, or the connection was severed.
    Canceled,
    /// The configured request deadline elapsed.
    DeadlineExceeded,
}

impl fmt::Display for CtxErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CtxErr::Canceled => f.write_str("context canceled"),
            CtxErr::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    id: u64,
    log_id: String,
    fields: LogFields,
    token: CancellationToken,
    cause: Arc<AtomicU8>,
}

impl RequestContext {
    pub fn new(id: u64, log_id: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            id,
            log_id: log_id.into(),
            fields: LogFields::new(),
            token,
            cause: Arc::new(AtomicU8::new(LIVE)),
        }
    }

    /// Sequence ID, or 0 for requests excluded from counting.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn log_id(&self) -> &str {
        &self.log_id
    }

    pub fn fields(&self) -> &LogFields {
        &self.fields
    }

    /// Shorthand for appending a single log field.
    pub fn add_field(&self, key: &str, value: impl Into<serde_json::Value>) {
        self.fields.add(key, value);
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the token, remembering the first cause.
    pub fn cancel_with(&self, cause: CtxErr) {
        let code = match cause {
            CtxErr::Canceled => CANCELED,
            CtxErr::DeadlineExceeded => DEADLINE,
        };
        let _ = self
            .cause
            .compare_exchange(LIVE, code, Ordering::SeqCst, Ordering::SeqCst);
        self.token.cancel();
    }

    /// Cancellation state as seen right now.
    pub fn ctx_err(&self) -> Option<CtxErr> {
        match self.cause.load(Ordering::SeqCst) {
            CANCELED => Some(CtxErr::Canceled),
            DEADLINE => Some(CtxErr::DeadlineExceeded),
            _ if self.token.is_cancelled() => Some(CtxErr::Canceled),
            _ => None,
        }
    }

    /// Cancel the token once `after` elapses, unless it fires first.
    pub fn arm_deadline(&self, after: Duration) {
        let ctx = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = ctx.token.cancelled() => {}
                _ = tokio::time::sleep(after) => ctx.cancel_with(CtxErr::DeadlineExceeded),
            }
        });
    }

    /// Stop background watchers once the request is over. Does not record a cause.
    pub(crate) fn release(&self) {
        self.token.cancel();
    }
}
