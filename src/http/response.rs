//! Echo payload synthesis.
//!
//! # Responsibilities
//! - Repeat the captured request `repeat` times
//! - Encode the payload as plain text, indented JSON or indented XML
//! - Honour the process-wide static body override
//! - Deliver the body as first byte, delay, remainder when `sleep_ah` is set
//!
//! # Design Decisions
//! - Bodies are built fully in memory; only the delayed split streams
//! - An empty body has nothing to split, so the delay is skipped

use axum::body::{Body, Bytes};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{OutputFormat, ResponseConfig};
use crate::fault::wait::sleep_or_cancel;
use crate::http::request::RequestRecord;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("xml encoding failed: {0}")]
    Xml(String),
}

/// One echoed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EchoEntry {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Request")]
    pub request: String,
}

/// The echoed payload. Its type name is the XML root element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EchoPayload {
    #[serde(rename = "ResData")]
    pub entries: Vec<EchoEntry>,
}

impl EchoPayload {
    /// `repeat` identical entries derived from `record`; at least one.
    pub fn repeated(record: &RequestRecord, repeat: usize) -> Self {
        let entry = EchoEntry {
            id: record.sequence_id.to_string(),
            request: record.dump_text(),
        };
        Self {
            entries: vec![entry; repeat.max(1)],
        }
    }

    pub fn to_plain(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(format!("ID={}\n\n", entry.id).as_bytes());
            out.extend_from_slice(entry.request.as_bytes());
            out.extend_from_slice(b"\n\n\n");
        }
        out
    }

    pub fn to_json(&self) -> Result<Vec<u8>, SynthError> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        Ok(out)
    }

    pub fn to_xml(&self) -> Result<Vec<u8>, SynthError> {
        let mut out = String::new();
        let mut serializer = quick_xml::se::Serializer::new(&mut out);
        serializer.indent(' ', 1);
        self.serialize(serializer)
            .map_err(|e| SynthError::Xml(e.to_string()))?;
        Ok(out.into_bytes())
    }

    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>, SynthError> {
        match format {
            OutputFormat::Plain => Ok(self.to_plain()),
            OutputFormat::Json => self.to_json(),
            OutputFormat::Xml => self.to_xml(),
        }
    }
}

/// Builds echo bodies under the process-wide response settings.
pub struct ResponseSynthesizer<'a> {
    defaults: &'a ResponseConfig,
}

impl<'a> ResponseSynthesizer<'a> {
    pub fn new(defaults: &'a ResponseConfig) -> Self {
        Self { defaults }
    }

    /// Body bytes for a request: the static override, or the encoded payload.
    pub fn render(
        &self,
        record: &RequestRecord,
        repeat: usize,
        format: OutputFormat,
    ) -> Result<Bytes, SynthError> {
        if let Some(body) = &self.defaults.static_body {
            return Ok(Bytes::from(body.clone()));
        }
        let payload = EchoPayload::repeated(record, repeat);
        Ok(Bytes::from(payload.encode(format)?))
    }
}

/// Response body that sends the first byte, waits `delay`, then sends the rest.
///
/// Without a delay, or with nothing to split, the body is sent as one piece.
/// The remainder is still sent if the wait is cancelled.
pub fn delayed_body(body: Bytes, delay: Duration, token: CancellationToken) -> Body {
    if delay.is_zero() || body.is_empty() {
        return Body::from(body);
    }

    let head = body.slice(..1);
    let tail = body.slice(1..);
    let first = stream::once(async move { Ok::<_, Infallible>(head) });
    let rest = stream::once(async move {
        sleep_or_cancel(&token, delay).await;
        Ok::<_, Infallible>(tail)
    });
    Body::from_stream(first.chain(rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use std::time::SystemTime;

    fn record() -> RequestRecord {
        RequestRecord {
            sequence_id: 9,
            remote_address: "127.0.0.1:4000".into(),
            method: Method::GET,
            raw_dump: b"GET / HTTP/1.1\r\nHost: h\r\n\r\n".to_vec(),
            received_at: SystemTime::now(),
        }
    }

    #[test]
    fn plain_layout() {
        let payload = EchoPayload::repeated(&record(), 2);
        let text = String::from_utf8(payload.to_plain()).unwrap();
        let entry = "ID=9\n\nGET / HTTP/1.1\r\nHost: h\r\n\r\n\n\n\n";
        assert_eq!(text, entry.repeat(2));
    }

    #[test]
    fn repeat_yields_identical_entries() {
        for n in [1, 2, 7] {
            let payload = EchoPayload::repeated(&record(), n);
            assert_eq!(payload.entries.len(), n);
            assert!(payload.entries.iter().all(|e| *e == payload.entries[0]));
        }
        assert_eq!(EchoPayload::repeated(&record(), 0).entries.len(), 1);
    }

    #[test]
    fn json_uses_capitalized_fields() {
        let payload = EchoPayload::repeated(&record(), 3);
        let bytes = payload.to_json().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("{\n \"ResData\": [\n  {\n   \"ID\": \"9\""));

        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let entries = value["ResData"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["Request"], "GET / HTTP/1.1\r\nHost: h\r\n\r\n");
    }

    #[test]
    fn xml_root_is_type_name() {
        let payload = EchoPayload::repeated(&record(), 2);
        let text = String::from_utf8(payload.to_xml().unwrap()).unwrap();
        assert!(text.starts_with("<EchoPayload>"));
        assert!(text.trim_end().ends_with("</EchoPayload>"));
        assert_eq!(text.matches("<ResData>").count(), 2);
        assert_eq!(text.matches("<ID>9</ID>").count(), 2);
        assert!(text.contains("\n <ResData>\n  <ID>"));
    }

    #[test]
    fn static_body_replaces_payload() {
        let defaults = ResponseConfig {
            static_body: Some("pong".into()),
            ..ResponseConfig::default()
        };
        let body = ResponseSynthesizer::new(&defaults)
            .render(&record(), 5, OutputFormat::Json)
            .unwrap();
        assert_eq!(&body[..], b"pong");
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_body_splits_after_first_byte() {
        let body = delayed_body(
            Bytes::from_static(b"hello"),
            Duration::from_millis(500),
            CancellationToken::new(),
        );
        let mut frames = body.into_data_stream();

        let start = tokio::time::Instant::now();
        let first = frames.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"h");
        assert!(start.elapsed() < Duration::from_millis(500));

        let rest = frames.next().await.unwrap().unwrap();
        assert_eq!(&rest[..], b"ello");
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn empty_body_skips_the_delay() {
        let body = delayed_body(Bytes::new(), Duration::from_secs(3600), CancellationToken::new());
        let bytes = tokio::time::timeout(Duration::from_secs(1), axum::body::to_bytes(body, 16))
            .await
            .unwrap()
            .unwrap();
        assert!(bytes.is_empty());
    }
}
