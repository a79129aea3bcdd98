//! Request capture and parameter parsing.
//!
//! # Responsibilities
//! - Read the request body once, up to the configured limit
//! - Merge urlencoded form body and query string into one lookup
//! - Reproduce the request as it looked on the wire for echoing
//!
//! # Design Decisions
//! - Malformed parameters degrade to "unset", never to an error response
//! - A body that cannot be read is embedded as `error:<reason>` in the dump

use axum::{
    body::Bytes,
    extract::{ConnectInfo, FromRequest, Request},
    http::{header, request::Parts, Extensions, HeaderMap, Method, Uri},
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::SystemTime;

use crate::http::context::RequestContext;
use crate::http::server::AppState;

/// Form values from the urlencoded body followed by the query string.
///
/// Lookups return the first occurrence, so body values shadow query values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    pairs: Vec<(String, String)>,
}

impl FormValues {
    /// Values from a raw query string only.
    pub fn from_query(query: Option<&str>) -> Self {
        let mut values = Self::default();
        if let Some(query) = query {
            values.extend_urlencoded(query.as_bytes());
        }
        values
    }

    pub fn extend_urlencoded(&mut self, input: &[u8]) {
        self.pairs.extend(
            url::form_urlencoded::parse(input).map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
    }

    /// First occurrence of `key`; an empty value counts as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Integer value for `key`; missing or malformed values read as 0.
    pub fn int(&self, key: &str) -> i64 {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(0)
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// A request with its body fully read and its parameters parsed.
#[derive(Debug)]
pub struct CapturedRequest {
    pub parts: Parts,
    /// Body bytes, or the reason they could not be read.
    pub body: Result<Bytes, String>,
    pub form: FormValues,
}

impl CapturedRequest {
    pub async fn capture(req: Request, body_limit: usize) -> Self {
        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, body_limit)
            .await
            .map_err(|e| e.to_string());

        let mut form = FormValues::default();
        if let Ok(bytes) = &body {
            if carries_form(&parts) {
                form.extend_urlencoded(bytes);
            }
        }
        if let Some(query) = parts.uri.query() {
            form.extend_urlencoded(query.as_bytes());
        }

        Self { parts, body, form }
    }
}

impl FromRequest<AppState> for CapturedRequest {
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self::capture(req, state.config.limits.max_body_bytes).await)
    }
}

fn carries_form(parts: &Parts) -> bool {
    let method_has_form = matches!(parts.method, Method::POST | Method::PUT | Method::PATCH);
    let is_urlencoded = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);
    method_has_form && is_urlencoded
}

/// Host the client addressed, from the Host header or the URI authority.
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

/// Remote address recorded by the accept loop, if any.
pub fn remote_addr(extensions: &Extensions) -> String {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Request target as it appears on the request line.
pub fn request_target(uri: &Uri) -> &str {
    uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
}

/// One inbound request, frozen at capture time.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub sequence_id: u64,
    pub remote_address: String,
    pub method: Method,
    /// Request line, headers, blank line and body, as on the wire.
    pub raw_dump: Vec<u8>,
    pub received_at: SystemTime,
}

impl RequestRecord {
    pub fn capture(ctx: &RequestContext, request: &CapturedRequest) -> Self {
        let raw_dump = match &request.body {
            Ok(body) => dump_request(&request.parts, body),
            Err(reason) => format!("error:{}", reason).into_bytes(),
        };

        Self {
            sequence_id: ctx.id(),
            remote_address: remote_addr(&request.parts.extensions),
            method: request.parts.method.clone(),
            raw_dump,
            received_at: SystemTime::now(),
        }
    }

    pub fn dump_text(&self) -> String {
        String::from_utf8_lossy(&self.raw_dump).into_owned()
    }
}

/// Serialize a request in HTTP/1.x wire form.
pub fn dump_request(parts: &Parts, body: &[u8]) -> Vec<u8> {
    let mut head = format!(
        "{} {} {:?}\r\n",
        parts.method,
        request_target(&parts.uri),
        parts.version
    );
    let host = request_host(&parts.headers, &parts.uri);
    if !host.is_empty() {
        head.push_str("Host: ");
        head.push_str(&host);
        head.push_str("\r\n");
    }

    let mut out = head.into_bytes();
    for (name, value) in parts.headers.iter() {
        if name == header::HOST {
            continue;
        }
        out.extend_from_slice(canonical_header_name(name.as_str()).as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}

/// `x-request-id` → `X-Request-Id`.
fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
