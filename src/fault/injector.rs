//! Applies a [`FaultSpec`] to a response, in a fixed order:
//!
//! 1. pre-header delay (cancellable; cancellation aborts the handler)
//! 2. status resolution: request, else process default, else implicit 200
//! 3. status recorded for the response head
//! 4. `broken`: sever the connection when the transport allows it
//! 5. content type resolution

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;

use crate::config::ResponseConfig;
use crate::fault::spec::{resolve_status, FaultSpec};
use crate::fault::wait::sleep_or_cancel;
use crate::http::context::RequestContext;
use crate::net::ConnectionTakeover;
use crate::observability::metrics::{self, FaultKind};

/// What the handler should do after injection.
#[derive(Debug)]
pub enum Injection {
    /// Build the response with this head.
    Proceed(ResponsePlan),
    /// The request was cancelled during the pre-header delay; write nothing.
    Cancelled,
    /// The connection was severed; the response must never be written.
    Severed,
}

/// Response head decided by the injector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponsePlan {
    pub status: Option<StatusCode>,
    pub content_type: Option<HeaderValue>,
}

impl ResponsePlan {
    /// Commit status and content type to a response before its body is sent.
    pub fn apply_to(&self, response: &mut Response) {
        if let Some(status) = self.status {
            *response.status_mut() = status;
        }
        if let Some(content_type) = &self.content_type {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type.clone());
        }
    }
}

pub struct FaultInjector<'a> {
    spec: &'a FaultSpec,
    defaults: &'a ResponseConfig,
    ctx: &'a RequestContext,
    takeover: Option<&'a ConnectionTakeover>,
}

impl<'a> FaultInjector<'a> {
    /// `takeover` is the connection capability, if the transport offers one.
    pub fn new(
        spec: &'a FaultSpec,
        defaults: &'a ResponseConfig,
        ctx: &'a RequestContext,
        takeover: Option<&'a ConnectionTakeover>,
    ) -> Self {
        Self {
            spec,
            defaults,
            ctx,
            takeover,
        }
    }

    pub async fn apply(&self) -> Injection {
        let delay = self.spec.pre_header_delay;
        if !delay.is_zero() {
            metrics::record_fault(FaultKind::PreHeaderDelay);
            if !sleep_or_cancel(self.ctx.token(), delay).await {
                self.ctx.add_field("Aborted", "sleep");
                return Injection::Cancelled;
            }
        }

        let status = resolve_status(self.spec.forced_status, self.defaults);
        if let Some(status) = status {
            if self.spec.forced_status.is_some() {
                metrics::record_fault(FaultKind::ForcedStatus);
            }
            self.ctx.add_field("RespStatus", status.as_u16());
        }

        if self.spec.truncate {
            match self.takeover {
                Some(takeover) => {
                    metrics::record_fault(FaultKind::Broken);
                    self.ctx.add_field("Broken", true);
                    takeover.sever();
                    return Injection::Severed;
                }
                None => {
                    tracing::debug!(
                        request_id = self.ctx.id(),
                        "Connection takeover unavailable, ignoring broken"
                    );
                }
            }
        }

        Injection::Proceed(ResponsePlan {
            status,
            content_type: self.content_type(),
        })
    }

    /// Request value, else the format's type for synthesized bodies, else
    /// the process default.
    pub fn content_type(&self) -> Option<HeaderValue> {
        if let Some(forced) = &self.spec.forced_content_type {
            return Some(forced.clone());
        }
        if self.defaults.static_body.is_none() {
            return Some(HeaderValue::from_static(self.spec.format.content_type()));
        }
        self.defaults
            .default_content_type
            .as_deref()
            .and_then(|ct| HeaderValue::from_str(ct).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::fault::spec::DEFAULT_ECHO_REPEAT;
    use crate::http::request::FormValues;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn spec(query: &str, defaults: &ResponseConfig) -> FaultSpec {
        FaultSpec::parse(
            &FormValues::from_query(Some(query)),
            defaults,
            DEFAULT_ECHO_REPEAT,
        )
    }

    fn ctx() -> RequestContext {
        RequestContext::new(1, "", CancellationToken::new())
    }

    #[tokio::test]
    async fn plain_request_proceeds_with_format_type() {
        let defaults = ResponseConfig::default();
        let spec = spec("type=json", &defaults);
        let ctx = ctx();
        match FaultInjector::new(&spec, &defaults, &ctx, None).apply().await {
            Injection::Proceed(plan) => {
                assert_eq!(plan.status, None);
                assert_eq!(
                    plan.content_type,
                    Some(HeaderValue::from_static("application/json"))
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_sleep_aborts() {
        let defaults = ResponseConfig::default();
        let spec = spec("sleep=60000&http_code=500", &defaults);
        let ctx = ctx();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel_with(crate::http::context::CtxErr::Canceled);
        });

        let outcome = FaultInjector::new(&spec, &defaults, &ctx, None).apply().await;
        assert!(matches!(outcome, Injection::Cancelled));
        let fields = ctx.fields().snapshot();
        assert!(fields.iter().all(|(k, _)| k != "RespStatus"));
    }

    #[tokio::test]
    async fn broken_without_takeover_is_a_noop() {
        let defaults = ResponseConfig::default();
        let spec = spec("broken=1&http_code=418", &defaults);
        let ctx = ctx();
        match FaultInjector::new(&spec, &defaults, &ctx, None).apply().await {
            Injection::Proceed(plan) => assert_eq!(plan.status, Some(StatusCode::IM_A_TEAPOT)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn broken_with_takeover_severs() {
        let defaults = ResponseConfig::default();
        let spec = spec("broken=1", &defaults);
        let ctx = ctx();
        let takeover = ConnectionTakeover::new("127.0.0.1:1".parse().unwrap(), &CancellationToken::new());
        let outcome = FaultInjector::new(&spec, &defaults, &ctx, Some(&takeover))
            .apply()
            .await;
        assert!(matches!(outcome, Injection::Severed));
        assert!(takeover.is_severed());
    }

    #[test]
    fn content_type_resolution() {
        let ctx = ctx();
        let mut defaults = ResponseConfig::default();

        let forced = spec("content_type=text/html&type=json", &defaults);
        assert_eq!(
            FaultInjector::new(&forced, &defaults, &ctx, None).content_type(),
            Some(HeaderValue::from_static("text/html"))
        );

        let xml = spec("type=xml", &defaults);
        assert_eq!(
            FaultInjector::new(&xml, &defaults, &ctx, None).content_type(),
            Some(HeaderValue::from_static("text/xml"))
        );

        defaults.static_body = Some("pong".into());
        let plain = spec("", &defaults);
        assert_eq!(plain.format, OutputFormat::Plain);
        assert_eq!(
            FaultInjector::new(&plain, &defaults, &ctx, None).content_type(),
            None
        );

        defaults.default_content_type = Some("application/octet-stream".into());
        assert_eq!(
            FaultInjector::new(&plain, &defaults, &ctx, None).content_type(),
            Some(HeaderValue::from_static("application/octet-stream"))
        );
    }

    #[test]
    fn plan_commits_head() {
        let plan = ResponsePlan {
            status: Some(StatusCode::ACCEPTED),
            content_type: Some(HeaderValue::from_static("text/plain")),
        };
        let mut response = Response::new(axum::body::Body::empty());
        plan.apply_to(&mut response);
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    }
}
