//! `/chunk`: streams `Hello <i>` lines, one per second.
//!
//! Each line is its own body frame, so hyper flushes it as soon as it is
//! produced. The wait after each line races the request token; a cancelled
//! wait ends the stream without another line.

use axum::{
    body::{Body, Bytes},
    extract::{Extension, State},
    http::{header, HeaderValue},
    response::Response,
};
use futures_util::stream;
use std::convert::Infallible;
use std::time::Duration;

use crate::fault::spec::resolve_status;
use crate::fault::{sleep_or_cancel, FaultSpec, DEFAULT_CHUNK_REPEAT};
use crate::http::context::RequestContext;
use crate::http::request::CapturedRequest;
use crate::http::server::AppState;

/// Pause after every line.
pub const CHUNK_INTERVAL: Duration = Duration::from_secs(1);

pub async fn chunk(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    captured: CapturedRequest,
) -> Response {
    let spec = FaultSpec::parse(&captured.form, &state.config.response, DEFAULT_CHUNK_REPEAT);
    let repeat = spec.repeat;
    ctx.add_field("Repeat", repeat);

    let mut response = Response::new(Body::from_stream(lines(ctx.clone(), repeat)));
    if let Some(status) = resolve_status(spec.forced_status, &state.config.response) {
        ctx.add_field("RespStatus", status.as_u16());
        *response.status_mut() = status;
    }
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn lines(
    ctx: RequestContext,
    repeat: usize,
) -> impl futures_util::Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    stream::unfold(0usize, move |i| {
        let ctx = ctx.clone();
        async move {
            if i > 0 && !sleep_or_cancel(ctx.token(), CHUNK_INTERVAL).await {
                ctx.add_field("Chunks", i);
                return None;
            }
            if i >= repeat {
                ctx.add_field("Chunks", i);
                return None;
            }
            Some((Ok(Bytes::from(format!("Hello {}\n", i))), i + 1))
        }
    })
}
