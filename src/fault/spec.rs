//! Parsed fault parameters for one request.

use axum::http::{HeaderValue, StatusCode};
use std::time::Duration;

use crate::config::{OutputFormat, ResponseConfig};
use crate::http::request::FormValues;

/// Repeat count for the echo endpoint when `repeat` is absent.
pub const DEFAULT_ECHO_REPEAT: usize = 1;

/// Repeat count for the chunk endpoint when `repeat` is absent.
pub const DEFAULT_CHUNK_REPEAT: usize = 100;

/// Validated view of the fault parameters of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultSpec {
    /// `sleep`: wait before anything is written.
    pub pre_header_delay: Duration,
    /// `sleep_ah`: wait between the first body byte and the rest.
    pub post_header_delay: Duration,
    /// `http_code`: status forced by the request.
    pub forced_status: Option<StatusCode>,
    /// `content_type`: content type forced by the request.
    pub forced_content_type: Option<HeaderValue>,
    /// `repeat`: number of payload entries or chunks, at least 1.
    pub repeat: usize,
    /// `broken`: drop the connection instead of answering.
    pub truncate: bool,
    /// `type`: payload encoding.
    pub format: OutputFormat,
}

impl FaultSpec {
    /// Interpret request parameters. Malformed values fall back to defaults.
    pub fn parse(form: &FormValues, defaults: &ResponseConfig, default_repeat: usize) -> Self {
        let format = match form.get("type") {
            Some(value) => OutputFormat::from_param(value),
            None => defaults.default_format.unwrap_or_default(),
        };

        Self {
            pre_header_delay: millis(form.int("sleep")),
            post_header_delay: millis(form.int("sleep_ah")),
            forced_status: status_code(form.int("http_code")),
            forced_content_type: form
                .get("content_type")
                .and_then(|ct| HeaderValue::from_str(ct).ok()),
            repeat: positive(form.int("repeat")).unwrap_or(default_repeat),
            truncate: form.is_set("broken"),
            format,
        }
    }
}

fn millis(value: i64) -> Duration {
    Duration::from_millis(value.max(0) as u64)
}

fn positive(value: i64) -> Option<usize> {
    usize::try_from(value).ok().filter(|&n| n > 0)
}

/// Final status codes only; informational and out-of-range codes read as unset.
pub fn status_code(value: i64) -> Option<StatusCode> {
    u16::try_from(value)
        .ok()
        .filter(|code| (200..=999).contains(code))
        .and_then(|code| StatusCode::from_u16(code).ok())
}

/// Request status, else the process default, else none (implicit 200).
pub fn resolve_status(forced: Option<StatusCode>, defaults: &ResponseConfig) -> Option<StatusCode> {
    forced.or_else(|| {
        defaults
            .default_status
            .and_then(|code| status_code(i64::from(code)))
    })
}
