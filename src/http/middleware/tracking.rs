//! Request tracking middleware.
//!
//! Wraps every handler. On entry it bumps the shared counters, records the
//! remote address, builds the [`RequestContext`] and seeds its log fields.
//! On exit, whichever way the request ends, the [`Completion`] guard
//! releases the counters and emits exactly one "Request Done" line.
//!
//! A request ends when its response body has been fully produced. Bodies
//! that are already in memory end the request as soon as the handler
//! returns; streaming bodies carry the guard until their last frame, or
//! until hyper drops them because the client went away.

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::http::context::{CtxErr, RequestContext};
use crate::http::request::{remote_addr, request_target};
use crate::http::server::AppState;
use crate::net::{ConnectionTakeover, InFlightGuard};
use crate::observability::fields::Rendered;
use crate::observability::logging::ACCESS_TARGET;
use crate::observability::metrics;

/// Whether a route counts toward the request counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tracking {
    Counted,
    /// Logged but invisible to the counters, so observing them does not move them.
    Observed,
}

/// Middleware for routes that count as traffic.
pub async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    run_tracked(state, req, next, Tracking::Counted).await
}

/// Middleware for the status route.
pub async fn observe_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    run_tracked(state, req, next, Tracking::Observed).await
}

async fn run_tracked(state: AppState, mut req: Request, next: Next, mode: Tracking) -> Response {
    let start = Instant::now();
    let remote = remote_addr(req.extensions());

    let guard = match mode {
        Tracking::Counted => Some(state.tracker.enter(&remote)),
        Tracking::Observed => None,
    };
    let id = guard.as_ref().map(InFlightGuard::id).unwrap_or(0);
    let connecting = guard
        .as_ref()
        .map(InFlightGuard::connecting)
        .unwrap_or_else(|| state.tracker.in_flight());

    let token = req
        .extensions()
        .get::<ConnectionTakeover>()
        .map(ConnectionTakeover::request_token)
        .unwrap_or_else(|| state.shutdown.child_token());
    let ctx = RequestContext::new(id, log_id(&req), token);
    ctx.fields().extend([
        ("ID", Value::from(id)),
        ("Connecting", Value::from(connecting)),
        ("LogID", Value::from(ctx.log_id())),
        ("Remote", Value::from(remote.as_str())),
        ("Method", Value::from(req.method().as_str())),
        ("URI", Value::from(request_target(req.uri()))),
    ]);
    if let Some(deadline) = state.config.request_deadline() {
        ctx.arm_deadline(deadline);
    }

    let headers = state
        .config
        .observability
        .log_headers
        .then(|| req.headers().clone());

    let mut completion = Completion {
        ctx: ctx.clone(),
        method: req.method().clone(),
        start,
        status: None,
        headers,
        finished: false,
        _guard: guard,
    };

    req.extensions_mut().insert(ctx);
    let response = next.run(req).await;
    completion.status = Some(response.status());

    let (parts, body) = response.into_parts();
    if body.size_hint().exact().is_some() {
        completion.finish();
        return Response::from_parts(parts, body);
    }

    let stream = GuardedStream {
        inner: body.into_data_stream(),
        completion: Some(completion),
    };
    Response::from_parts(parts, Body::from_stream(stream))
}

/// Log ID from the `logid` query parameter, the `X_BD_LOGID` or
/// `x-request-id` header, or a fresh UUID.
fn log_id(req: &Request) -> String {
    let from_query = req.uri().query().and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(k, v)| k == "logid" && !v.is_empty())
            .map(|(_, v)| v.into_owned())
    });
    let from_header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    from_query
        .or_else(|| from_header("X_BD_LOGID"))
        .or_else(|| from_header("x-request-id"))
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Runs the request's exit bookkeeping exactly once, on drop.
struct Completion {
    ctx: RequestContext,
    method: Method,
    start: Instant,
    status: Option<StatusCode>,
    headers: Option<HeaderMap>,
    finished: bool,
    _guard: Option<InFlightGuard>,
}

impl Completion {
    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.finished {
            self.ctx.cancel_with(CtxErr::Canceled);
        }

        let cost_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        let ctx_err = self
            .ctx
            .ctx_err()
            .map(|e| Value::from(e.to_string()))
            .unwrap_or(Value::Null);

        let mut fields = self.ctx.fields().take();
        fields.push(("Cost".to_string(), Value::from(format!("{:.4}", cost_ms))));
        fields.push(("CtxErr".to_string(), ctx_err));
        if let Some(headers) = &self.headers {
            fields.push(("Headers".to_string(), headers_value(headers)));
        }

        tracing::info!(
            target: ACCESS_TARGET,
            id = self.ctx.id(),
            status = self.status.map(|s| s.as_u16()),
            fields = %Rendered(&fields),
            "Request Done"
        );
        metrics::record_request(
            self.method.as_str(),
            self.status.map(|s| s.as_u16()).unwrap_or(0),
            self.start,
        );

        self.ctx.release();
    }
}

fn headers_value(headers: &HeaderMap) -> Value {
    let mut map = serde_json::Map::new();
    for (name, value) in headers {
        let value = Value::from(String::from_utf8_lossy(value.as_bytes()).into_owned());
        match map.get_mut(name.as_str()) {
            Some(Value::Array(values)) => values.push(value),
            _ => {
                map.insert(name.as_str().to_string(), Value::Array(vec![value]));
            }
        }
    }
    Value::Object(map)
}

/// Response body stream that completes its request when the last frame
/// is produced, or cancels it when dropped early.
struct GuardedStream<S> {
    inner: S,
    completion: Option<Completion>,
}

impl<S> Stream for GuardedStream<S>
where
    S: Stream<Item = Result<Bytes, axum::Error>> + Unpin,
{
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.inner.poll_next_unpin(cx);
        if let Poll::Ready(None) = polled {
            if let Some(completion) = self.completion.take() {
                completion.finish();
            }
        }
        polled
    }
}
