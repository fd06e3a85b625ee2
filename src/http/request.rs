//! HTTP/1.1 request parsing using the [`httparse`] crate.
//!
//! Besides the raw request line and headers, a parsed [`Request`] carries the
//! content-negotiation snapshot (`Accept*`, `Content-*`) extracted once at parse
//! time, so route checks never re-tokenize header strings.

use std::io::Read;
use std::net::SocketAddr;

use bytes::Bytes;
use flate2::read::{DeflateDecoder, GzDecoder};
use thiserror::Error;

use super::header_value::{HeaderItem, HeaderValue};
use super::url::{Url, UrlError};
use super::{Headers, Method};
use crate::error::HttpError;

/// Content codings the framework can decode from request bodies.
pub const SUPPORTED_ENCODINGS: [&str; 2] = ["gzip", "deflate"];

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("request body exceeds maximum allowed size of {max_bytes} bytes")]
    BodyTooLarge { max_bytes: usize },

    #[error("invalid request target: {0}")]
    Target(#[from] UrlError),

    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    #[error("unsupported Transfer-Encoding: {0}")]
    UnsupportedTransferEncoding(String),
}

/// A fully parsed HTTP/1.1 request.
///
/// Created by [`Request::parse`] from a raw byte buffer.
///
/// # Examples
///
/// ```
/// use haven::http::Request;
///
/// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\nAccept-Charset: utf-8, *;q=0.1\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert!(request.is("get"));
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query_param("name").as_deref(), Some("world"));
/// assert_eq!(request.accept_values(), vec!["*/*"]);
/// assert_eq!(request.accept_charset().len(), 2);
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: Option<String>,
    url: Url,
    body: Bytes,
    peer_addr: Option<SocketAddr>,
    negotiation: Negotiation,
}

// Parsed `Accept*` / `Content-*` values. Empty strings and lists mean "absent".
#[derive(Debug, Default)]
struct Negotiation {
    accept: Vec<HeaderItem>,
    accept_charset: Vec<HeaderItem>,
    accept_encoding: Vec<HeaderItem>,
    accept_language: Vec<HeaderItem>,
    content_encoding: String,
    content_language: Vec<String>,
    content_length: Option<u64>,
    content_type: String,
    content_type_charset: String,
}

/// Body length declared by every `Content-Length` field, which must agree.
///
/// Absent means no body. Repeated or comma-listed fields are accepted only when
/// every entry is the same non-negative integer; anything else cannot frame the
/// message safely.
fn framing_length(headers: &Headers) -> Result<Option<u64>, RequestError> {
    let mut declared: Option<u64> = None;
    for raw in headers.get_all("content-length") {
        for entry in raw.split(',') {
            let entry = entry.trim();
            let value = entry
                .parse::<u64>()
                .map_err(|_| RequestError::InvalidContentLength(raw.to_owned()))?;
            match declared {
                Some(seen) if seen != value => {
                    return Err(RequestError::InvalidContentLength(raw.to_owned()));
                }
                _ => declared = Some(value),
            }
        }
    }
    Ok(declared)
}

impl Negotiation {
    fn extract(headers: &Headers) -> Self {
        let parse = |name: &str| {
            headers
                .get_joined(name)
                .map(|raw| HeaderValue::parse(&raw))
                .unwrap_or_default()
        };

        let single_value = |parsed: &HeaderValue| match parsed.values().as_slice() {
            [only] => (*only).to_owned(),
            _ => String::new(),
        };

        let content_encoding = single_value(&parse("content-encoding"));

        let content_type_header = parse("content-type");
        let (content_type, content_type_charset) = match content_type_header.values().as_slice() {
            [only] => (
                (*only).to_owned(),
                content_type_header
                    .param("charset")
                    .unwrap_or_default()
                    .to_owned(),
            ),
            _ => (String::new(), String::new()),
        };

        Self {
            accept: parse("accept").into_items(),
            accept_charset: parse("accept-charset").into_items(),
            accept_encoding: parse("accept-encoding").into_items(),
            accept_language: parse("accept-language").into_items(),
            content_encoding,
            content_language: parse("content-language")
                .values()
                .into_iter()
                .map(str::to_owned)
                .collect(),
            content_length: None,
            content_type,
            content_type_charset,
        }
    }
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf` (i.e. immediately after the `\r\n\r\n` header terminator). The body
    /// is limited to `Content-Length` bytes; without that header it is empty.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — more data is needed to complete the request headers.
    /// - [`RequestError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`] — a required field (method, path, version) is absent.
    /// - [`RequestError::Target`] — `Host` and target do not form a valid URL.
    /// - [`RequestError::InvalidContentLength`] — `Content-Length` fields are malformed
    ///   or disagree.
    /// - [`RequestError::UnsupportedTransferEncoding`] — any `Transfer-Encoding` is present;
    ///   only `Content-Length` framing is understood.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = Method::from(
            raw_req
                .method
                .ok_or(RequestError::MissingField { field: "method" })?,
        );

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let host = header_map.get("host").unwrap_or("localhost");
        let url = Url::from_parts("http", host, raw_path)?;

        let (path, query) = match raw_path.find('?') {
            Some(pos) => (
                raw_path[..pos].to_owned(),
                Some(raw_path[pos + 1..].to_owned()),
            ),
            None => (raw_path.to_owned(), None),
        };

        if let Some(coding) = header_map.get_joined("transfer-encoding") {
            return Err(RequestError::UnsupportedTransferEncoding(coding));
        }
        let content_length = framing_length(&header_map)?;

        let mut negotiation = Negotiation::extract(&header_map);
        negotiation.content_length = content_length;

        let body_end = content_length
            .and_then(|len| usize::try_from(len).ok())
            .map_or(body_offset, |len| body_offset.saturating_add(len).min(buf.len()));
        let body = Bytes::copy_from_slice(&buf[body_offset..body_end]);

        Ok((
            Self {
                method,
                path,
                version,
                headers: header_map,
                query,
                url,
                body,
                peer_addr: None,
                negotiation,
            },
            body_offset,
        ))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Case-insensitive check of the request method, e.g. `request.is("post")`.
    pub fn is(&self, method: &str) -> bool {
        self.method.as_str().eq_ignore_ascii_case(method)
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the absolute URL the request addressed.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns a percent-decoded query parameter value by key.
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.url.query_param(key)
    }

    /// Returns the raw request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body with its `Content-Encoding` removed, refusing to
    /// inflate past `limit` bytes.
    ///
    /// # Errors
    ///
    /// A `415` [`HttpError`] when the coding is unknown or the
    /// payload does not decode, and a `413` when the decoded body
    /// would exceed `limit`.
    pub fn decoded_body(&self, limit: usize) -> Result<Bytes, HttpError> {
        let encoding = self.content_encoding();
        if encoding.is_empty() || encoding.eq_ignore_ascii_case("identity") {
            return Ok(self.body.clone());
        }

        let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
        let mut decoded = Vec::with_capacity(self.body.len().saturating_mul(2).min(limit));
        let result = if encoding.eq_ignore_ascii_case("gzip") {
            GzDecoder::new(&self.body[..]).take(cap).read_to_end(&mut decoded)
        } else if encoding.eq_ignore_ascii_case("deflate") {
            DeflateDecoder::new(&self.body[..]).take(cap).read_to_end(&mut decoded)
        } else {
            return Err(HttpError::unsupported_media_type()
                .with_message("HTTP 415: Unsupported request body encoding."));
        };

        result.map_err(|e| {
            HttpError::unsupported_media_type()
                .with_message(format!("HTTP 415: Could not decode {encoding} request body: {e}"))
        })?;
        if decoded.len() > limit {
            return Err(HttpError::payload_too_large().with_message(format!(
                "HTTP 413: Decoded request body exceeds {limit} bytes."
            )));
        }
        Ok(Bytes::from(decoded))
    }

    /// Records the TCP peer this request arrived from.
    pub fn set_peer_addr(&mut self, addr: SocketAddr) {
        self.peer_addr = Some(addr);
    }

    /// Returns the TCP peer address, when the request came through the server.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Returns the client IP: the first `X-Forwarded-For` hop, else the TCP peer.
    pub fn client_ip(&self) -> Option<String> {
        self.headers
            .get("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_owned)
            .or_else(|| self.peer_addr.map(|addr| addr.ip().to_string()))
    }

    /// Returns the `User-Agent` header, or `""`.
    pub fn user_agent(&self) -> &str {
        self.headers.get("user-agent").unwrap_or_default()
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Returns the parsed `Accept` items; a lone `*/*` when the header is absent.
    pub fn accept(&self) -> Vec<HeaderItem> {
        if self.negotiation.accept.iter().all(|i| i.value().is_empty()) {
            vec![HeaderItem::new("*/*")]
        } else {
            self.negotiation.accept.clone()
        }
    }

    /// Returns the bare `Accept` media ranges.
    pub fn accept_values(&self) -> Vec<String> {
        self.accept()
            .iter()
            .map(|i| i.value().to_owned())
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn accept_charset(&self) -> &[HeaderItem] {
        &self.negotiation.accept_charset
    }

    pub fn accept_encoding(&self) -> &[HeaderItem] {
        &self.negotiation.accept_encoding
    }

    pub fn accept_language(&self) -> &[HeaderItem] {
        &self.negotiation.accept_language
    }

    /// Returns the single `Content-Encoding` value, or `""` if absent or listed more than once.
    pub fn content_encoding(&self) -> &str {
        &self.negotiation.content_encoding
    }

    pub fn content_language(&self) -> &[String] {
        &self.negotiation.content_language
    }

    /// Returns the declared `Content-Length`; repeated fields only parse when they agree.
    pub fn content_length(&self) -> Option<u64> {
        self.negotiation.content_length
    }

    /// Returns the body media type without parameters, or `""`.
    pub fn content_type(&self) -> &str {
        &self.negotiation.content_type
    }

    /// Returns the `charset` parameter of `Content-Type`, or `""`.
    pub fn content_type_charset(&self) -> &str {
        &self.negotiation.content_type_charset
    }

    /// Content codings the framework can decode.
    pub fn supported_encodings(&self) -> &'static [&'static str] {
        &SUPPORTED_ENCODINGS
    }
}
