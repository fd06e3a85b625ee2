//! HTTP error taxonomy and the error-handler seam.
//!
//! Every failure the routing pipeline can produce is an [`HttpError`]: a status
//! class, a human-readable message, and any headers the status requires (a `405`
//! always carries `Allow`). The router never writes error responses itself; it
//! hands each error to a single [`ErrorHandler`].

use std::error::Error as StdError;
use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use thiserror::Error;
use tracing::{debug, warn};

use crate::http::response::ResponseError;
use crate::http::{Method, Request, Response, StatusCode};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The status class of an [`HttpError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    /// Carries the methods the resource does support, for the `Allow` header.
    MethodNotAllowed(Vec<Method>),
    NotAcceptable,
    LengthRequired,
    PayloadTooLarge,
    UnsupportedMediaType,
    /// Temporary server-side failure.
    ServiceUnavailable,
}

impl HttpErrorKind {
    /// Returns the status code this kind maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BadRequest,
            Self::Unauthorized => StatusCode::Unauthorized,
            Self::Forbidden => StatusCode::Forbidden,
            Self::NotFound => StatusCode::NotFound,
            Self::MethodNotAllowed(_) => StatusCode::MethodNotAllowed,
            Self::NotAcceptable => StatusCode::NotAcceptable,
            Self::LengthRequired => StatusCode::LengthRequired,
            Self::PayloadTooLarge => StatusCode::PayloadTooLarge,
            Self::UnsupportedMediaType => StatusCode::UnsupportedMediaType,
            Self::ServiceUnavailable => StatusCode::ServiceUnavailable,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::BadRequest => "The request could not be understood by the server.",
            Self::Unauthorized => "The request requires user authentication.",
            Self::Forbidden => "Access to this resource is denied.",
            Self::NotFound => "Nothing matches the requested URL.",
            Self::MethodNotAllowed(_) => "Your request method is not allowed for this URL.",
            Self::NotAcceptable => "The resource cannot be returned in an acceptable format.",
            Self::LengthRequired => "Content-Length is required.",
            Self::PayloadTooLarge => "The request body is larger than the server will process.",
            Self::UnsupportedMediaType => "The request body format is not supported.",
            Self::ServiceUnavailable => "Service unavailable.",
        }
    }
}

/// An error that maps onto an HTTP status response.
///
/// # Examples
///
/// ```
/// use haven::{HttpError, Method};
///
/// let err = HttpError::method_not_allowed(vec![Method::Get, Method::Post]);
/// assert_eq!(err.status().as_u16(), 405);
/// assert_eq!(err.to_string(), "HTTP 405 Error: Your request method is not allowed for this URL.");
///
/// let response = err.into_response();
/// assert_eq!(response.headers().get("allow"), Some("GET,POST"));
/// ```
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HttpError {
    kind: HttpErrorKind,
    message: String,
    headers: Vec<(String, String)>,
    #[source]
    source: Option<BoxError>,
}

impl HttpError {
    /// Creates an error of `kind` with its default message.
    pub fn new(kind: HttpErrorKind) -> Self {
        let message = format!(
            "HTTP {} Error: {}",
            kind.status().as_u16(),
            kind.description()
        );
        Self {
            kind,
            message,
            headers: Vec::new(),
            source: None,
        }
    }

    pub fn bad_request() -> Self {
        Self::new(HttpErrorKind::BadRequest)
    }

    pub fn unauthorized() -> Self {
        Self::new(HttpErrorKind::Unauthorized)
    }

    pub fn forbidden() -> Self {
        Self::new(HttpErrorKind::Forbidden)
    }

    pub fn not_found() -> Self {
        Self::new(HttpErrorKind::NotFound)
    }

    /// A `405` listing the methods the resource accepts.
    pub fn method_not_allowed(allowed: Vec<Method>) -> Self {
        Self::new(HttpErrorKind::MethodNotAllowed(allowed))
    }

    pub fn not_acceptable() -> Self {
        Self::new(HttpErrorKind::NotAcceptable)
    }

    pub fn length_required() -> Self {
        Self::new(HttpErrorKind::LengthRequired)
    }

    pub fn payload_too_large() -> Self {
        Self::new(HttpErrorKind::PayloadTooLarge)
    }

    pub fn unsupported_media_type() -> Self {
        Self::new(HttpErrorKind::UnsupportedMediaType)
    }

    /// A `503` wrapping an internal failure.
    pub fn service_unavailable(source: impl Into<BoxError>) -> Self {
        let mut err = Self::new(HttpErrorKind::ServiceUnavailable);
        err.source = Some(source.into());
        err
    }

    /// Replaces the default message (also used as the response body).
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Adds a header to the generated response.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn kind(&self) -> &HttpErrorKind {
        &self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the headers the response will carry besides `ETag` / `Last-Modified`.
    pub fn response_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(self.headers.len() + 1);
        if let HttpErrorKind::MethodNotAllowed(allowed) = &self.kind {
            let allow = allowed
                .iter()
                .map(|m| m.as_str().to_ascii_uppercase())
                .collect::<Vec<_>>()
                .join(",");
            headers.push(("Allow".to_owned(), allow));
        }
        headers.extend(self.headers.iter().cloned());
        headers
    }

    /// Builds the plain-text error response.
    pub fn into_response(self) -> Response {
        let status = self.status();
        let now = SystemTime::now();
        let stamp = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let etag = format!("{:x}", Md5::digest(format!("{stamp}{}", status.as_u16())));

        let mut response = Response::new(status)
            .header("Content-Type", "text/plain")
            .header("ETag", format!("\"{etag}\""))
            .header("Last-Modified", httpdate::fmt_http_date(now));
        for (name, value) in self.response_headers() {
            response.add_header(name, value);
        }
        response.body(self.message)
    }
}

impl From<ResponseError> for HttpError {
    fn from(err: ResponseError) -> Self {
        HttpError::service_unavailable(err)
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::bad_request().with_message(format!("HTTP 400: Invalid JSON body: {err}"))
    }
}

/// Translates an [`HttpError`] raised anywhere in the pipeline into a response.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, request: &Request, error: HttpError) -> Response;
}

/// Logs the failure and renders [`HttpError::into_response`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, request: &Request, error: HttpError) -> Response {
        let status = error.status().as_u16();
        if error.status().is_server_error() {
            warn!(
                method = %request.method(),
                path = %request.path(),
                status,
                error = %error,
                cause = ?error.source(),
                "request failed"
            );
        } else {
            debug!(
                method = %request.method(),
                path = %request.path(),
                status,
                error = %error,
                "request rejected"
            );
        }
        error.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request {
        Request::parse(b"GET /x HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .unwrap()
            .0
    }

    #[test]
    fn default_messages_name_the_status() {
        assert_eq!(
            HttpError::not_found().to_string(),
            "HTTP 404 Error: Nothing matches the requested URL."
        );
        assert_eq!(HttpError::length_required().status().as_u16(), 411);
        assert_eq!(HttpError::not_acceptable().status().as_u16(), 406);
        assert_eq!(HttpError::unauthorized().status().as_u16(), 401);
        assert_eq!(HttpError::payload_too_large().status().as_u16(), 413);
    }

    #[test]
    fn message_override_becomes_body() {
        let response = HttpError::not_acceptable()
            .with_message("HTTP 406: Unacceptable charset.")
            .into_response();
        assert_eq!(response.status(), StatusCode::NotAcceptable);
        assert_eq!(response.body_ref(), b"HTTP 406: Unacceptable charset.");
        assert_eq!(response.headers().get("content-type"), Some("text/plain"));
    }

    #[test]
    fn error_response_carries_cache_headers() {
        let response = HttpError::forbidden()
            .with_header("X-Reason", "policy")
            .into_response();
        let etag = response.headers().get("etag").unwrap();
        assert_eq!(etag.len(), 34);
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert!(response.headers().get("last-modified").unwrap().ends_with("GMT"));
        assert_eq!(response.headers().get("x-reason"), Some("policy"));
    }

    #[test]
    fn method_not_allowed_always_has_allow() {
        let err = HttpError::method_not_allowed(vec![Method::Put, Method::from("purge")]);
        assert_eq!(
            err.response_headers(),
            vec![("Allow".to_owned(), "PUT,PURGE".to_owned())]
        );
    }

    #[test]
    fn internal_failure_keeps_its_source() {
        let io = std::io::Error::other("disk on fire");
        let err = HttpError::service_unavailable(io);
        assert_eq!(err.status(), StatusCode::ServiceUnavailable);
        assert_eq!(err.source().unwrap().to_string(), "disk on fire");
    }

    #[test]
    fn default_handler_renders_the_error() {
        let response = DefaultErrorHandler.handle(&request(), HttpError::not_found());
        assert_eq!(response.status(), StatusCode::NotFound);
    }
}
