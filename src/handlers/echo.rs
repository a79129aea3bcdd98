//! `/` and every unmatched path: echo the request back.
//!
//! Order of effects: fault injection (delay, status, takeover, content
//! type), then payload synthesis, then delivery with the optional
//! post-header delay.

use axum::{
    body::Bytes,
    extract::{Extension, State},
    response::Response,
};

use crate::fault::{FaultInjector, FaultSpec, Injection, DEFAULT_ECHO_REPEAT};
use crate::http::context::RequestContext;
use crate::http::request::{CapturedRequest, RequestRecord};
use crate::http::response::{delayed_body, EchoPayload, ResponseSynthesizer};
use crate::http::server::AppState;
use crate::net::ConnectionTakeover;
use crate::observability::metrics::{self, FaultKind};

pub async fn echo(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    captured: CapturedRequest,
) -> Response {
    let defaults = &state.config.response;
    let spec = FaultSpec::parse(&captured.form, defaults, DEFAULT_ECHO_REPEAT);
    let takeover = captured.parts.extensions.get::<ConnectionTakeover>().cloned();

    let plan = match FaultInjector::new(&spec, defaults, &ctx, takeover.as_ref())
        .apply()
        .await
    {
        Injection::Proceed(plan) => plan,
        Injection::Cancelled => return Response::default(),
        Injection::Severed => {
            // Parked until the connection task has dropped the socket, so
            // this response can never reach the wire.
            ctx.token().cancelled().await;
            return Response::default();
        }
    };

    let record = RequestRecord::capture(&ctx, &captured);
    ctx.add_field("Repeat", spec.repeat);

    let body = match ResponseSynthesizer::new(defaults).render(&record, spec.repeat, spec.format) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(request_id = ctx.id(), error = %e, "Payload encoding failed, echoing plain text");
            ctx.add_field("SynthErr", e.to_string());
            Bytes::from(EchoPayload::repeated(&record, spec.repeat).to_plain())
        }
    };

    let delay = spec.post_header_delay;
    if !delay.is_zero() && !body.is_empty() {
        metrics::record_fault(FaultKind::PostHeaderDelay);
        ctx.add_field("SleepAfterHeader", delay.as_millis() as u64);
    }

    let mut response = Response::new(delayed_body(body, delay, ctx.token().clone()));
    plan.apply_to(&mut response);
    response
}
