//! HTTP/1.1 response builder.
//!
//! Provides a fluent builder API for constructing HTTP responses and
//! serializing them to a byte buffer for transmission over TCP.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use super::{Headers, StatusCode};
use crate::config::Settings;

/// Errors raised by response builder methods that validate their input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseError {
    #[error("invalid content type {0:?}: expected `type/subtype`")]
    InvalidContentType(String),

    #[error("invalid charset name {0:?}")]
    InvalidCharset(String),

    #[error("charset {0:?} is not supported")]
    UnsupportedCharset(String),

    #[error("redirect target must not be empty")]
    EmptyRedirectTarget,

    #[error("redirect status must be in 301..=399, got {0}")]
    InvalidRedirectStatus(u16),
}

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use haven::Settings;
/// use haven::http::{Response, StatusCode};
///
/// let settings = Settings::default();
/// let response = Response::new(StatusCode::Ok)
///     .content_type("application/json").unwrap()
///     .charset("UTF-8", &settings).unwrap()
///     .body(r#"{"status":"ok"}"#);
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Type: application/json;charset=UTF-8\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    content_type: Option<String>,
    charset: Option<String>,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            content_type: None,
            charset: None,
            body: Vec::new(),
            keep_alive: true,
        }
    }

    /// Builds a redirect to `location`.
    ///
    /// # Errors
    ///
    /// Rejects an empty target and any status outside `301..=399`.
    pub fn redirect(location: &str, status: StatusCode) -> Result<Self, ResponseError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(ResponseError::EmptyRedirectTarget);
        }
        if !(301..=399).contains(&status.as_u16()) {
            return Err(ResponseError::InvalidRedirectStatus(status.as_u16()));
        }
        Ok(Self::new(status).header("Location", location))
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place, for code that decorates a response it received.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Drops every custom header set so far.
    #[must_use]
    pub fn reset_headers(mut self) -> Self {
        self.headers.clear();
        self
    }

    /// Changes the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Sets the media type written in `Content-Type`.
    ///
    /// # Errors
    ///
    /// [`ResponseError::InvalidContentType`] unless the value is `type/subtype`.
    pub fn content_type(mut self, content_type: &str) -> Result<Self, ResponseError> {
        let valid = content_type
            .split_once('/')
            .is_some_and(|(t, s)| is_token(t) && is_token(s));
        if !valid {
            return Err(ResponseError::InvalidContentType(content_type.to_owned()));
        }
        self.content_type = Some(content_type.to_owned());
        Ok(self)
    }

    /// Sets the `charset` parameter appended to `Content-Type`.
    ///
    /// # Errors
    ///
    /// [`ResponseError::InvalidCharset`] for names that are not HTTP tokens, and
    /// [`ResponseError::UnsupportedCharset`] for charsets missing from
    /// `settings.supported_charsets`.
    pub fn charset(mut self, charset: &str, settings: &Settings) -> Result<Self, ResponseError> {
        if !is_token(charset) {
            return Err(ResponseError::InvalidCharset(charset.to_owned()));
        }
        if !settings.supports_charset(charset) {
            return Err(ResponseError::UnsupportedCharset(charset.to_owned()));
        }
        self.charset = Some(charset.to_owned());
        Ok(self)
    }

    /// Sets the response body from a string.
    ///
    /// The `Content-Length` header is written automatically by [`into_bytes`](Self::into_bytes).
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Controls whether the `Connection: keep-alive` or `Connection: close` header is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the custom headers set so far.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the body bytes.
    pub fn body_ref(&self) -> &[u8] {
        &self.body
    }

    /// Returns the `Content-Type` value [`into_bytes`](Self::into_bytes) will write, if any.
    pub fn content_type_header(&self) -> Option<String> {
        match (&self.content_type, &self.charset) {
            (Some(ct), Some(cs)) => Some(format!("{ct};charset={cs}")),
            (Some(ct), None) => Some(ct.clone()),
            (None, _) => self.headers.get("content-type").map(str::to_owned),
        }
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Content-Type: <type>;charset=<charset>` when a content type was set, or
    ///   `text/plain; charset=utf-8` if the body is non-empty and none was given.
    /// - `Content-Length: <n>` (always written).
    /// - `Connection: keep-alive` or `Connection: close`.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        if let Some(ct) = &self.content_type {
            let value = match &self.charset {
                Some(cs) => format!("{ct};charset={cs}"),
                None => ct.clone(),
            };
            self.headers.set("Content-Type", value);
        } else if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", "text/plain; charset=utf-8");
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.set("Connection", connection);
        self.headers.remove("content-length");

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        buf.put(&b"\r\n"[..]);

        if !self.body.is_empty() {
            buf.put(self.body.as_slice());
        }

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

// RFC 9110 §5.6.2 token.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}
