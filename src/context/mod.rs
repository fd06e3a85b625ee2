//! Per-request context handed to route checks and handlers.
//!
//! A [`Context`] bundles the parsed [`Request`], the path parameters captured by
//! the matching route, and read-only handles to the application [`Settings`]
//! and service [`Container`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Settings;
use crate::container::Container;
use crate::{HttpError, Request, Response, StatusCode};

/// Path parameters extracted from the matched route
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    /// Create a new empty parameters map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value into the parameters map
    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    /// Get a value from the parameters map
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Remove a value from the parameters map
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.map.remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Per-request context.
pub struct Context {
    request: Arc<Request>,
    params: PathParams,
    settings: Arc<Settings>,
    services: Arc<Container>,
}

impl Context {
    /// Create a context with default settings and an empty container.
    pub fn new(request: Request) -> Self {
        Self::with_params(request, PathParams::new())
    }

    /// Create a context carrying already-extracted path parameters.
    pub fn with_params(request: Request, params: PathParams) -> Self {
        Self::shared(Arc::new(request), params)
    }

    /// Create a context around a request that is also held elsewhere.
    pub fn shared(request: Arc<Request>, params: PathParams) -> Self {
        Self {
            request,
            params,
            settings: Arc::new(Settings::default()),
            services: Arc::new(Container::new()),
        }
    }

    /// Attach the shared application state.
    pub fn with_app(mut self, settings: Arc<Settings>, services: Arc<Container>) -> Self {
        self.settings = settings;
        self.services = services;
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// A second handle to the request, valid after the context is consumed.
    pub fn request_handle(&self) -> Arc<Request> {
        Arc::clone(&self.request)
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn services(&self) -> &Container {
        &self.services
    }

    /// Starts a response using the application's default charset.
    ///
    /// The charset only appears on the wire once a content type is set.
    ///
    /// # Errors
    ///
    /// A `503` when `default_charset` is not one of the supported charsets,
    /// which [`Settings::validate`] would have rejected.
    pub fn response(&self, status: StatusCode) -> Result<Response, HttpError> {
        Ok(Response::new(status).charset(&self.settings.default_charset, &self.settings)?)
    }

    /// Sets a response charset, checked against the application's supported charsets.
    ///
    /// # Errors
    ///
    /// A `503` for a charset the application does not support.
    pub fn charset(&self, response: Response, charset: &str) -> Result<Response, HttpError> {
        Ok(response.charset(charset, &self.settings)?)
    }

    /// Deserializes the (decoded) request body as JSON.
    ///
    /// An encoded body is inflated to at most `max_request_size` bytes.
    pub fn json<T>(&self) -> Result<T, HttpError>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.request.decoded_body(self.settings.max_request_size)?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    fn request(raw: &str) -> Request {
        Request::parse(raw.as_bytes()).unwrap().0
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Login {
        user: String,
    }

    #[test]
    fn json_body() {
        let body = r#"{"user":"ada"}"#;
        let raw = format!(
            "POST / HTTP/1.1\r\nHost: h\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let ctx = Context::new(request(&raw));
        assert_eq!(ctx.json::<Login>().unwrap(), Login { user: "ada".into() });
    }

    #[test]
    fn malformed_json_is_400() {
        let raw = "POST / HTTP/1.1\r\nHost: h\r\nContent-Length: 3\r\n\r\n{x}";
        let err = Context::new(request(raw)).json::<Login>().unwrap_err();
        assert_eq!(err.status().as_u16(), 400);
    }

    #[test]
    fn response_uses_default_charset() {
        let ctx = Context::new(request("GET / HTTP/1.1\r\nHost: h\r\n\r\n"));
        let response = ctx
            .response(StatusCode::Ok)
            .unwrap()
            .content_type("text/html")
            .unwrap();
        assert_eq!(
            response.content_type_header().as_deref(),
            Some("text/html;charset=UTF-8")
        );
    }

    #[test]
    fn charsets_are_checked_against_settings() {
        let ctx = Context::new(request("GET / HTTP/1.1\r\nHost: h\r\n\r\n"));
        let err = ctx
            .charset(Response::new(StatusCode::Ok), "koi8-r")
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::ServiceUnavailable);
        assert!(ctx.charset(Response::new(StatusCode::Ok), "iso-8859-1").is_ok());

        let broken = Settings {
            default_charset: "koi8-r".to_owned(),
            ..Settings::default()
        };
        let ctx = ctx.with_app(Arc::new(broken), Arc::new(Container::new()));
        assert!(ctx.response(StatusCode::Ok).is_err());
    }

    #[test]
    fn params_accessors() {
        let mut params = PathParams::new();
        params.insert("id".into(), "7".into());
        let ctx = Context::with_params(request("GET /u/7 HTTP/1.1\r\nHost: h\r\n\r\n"), params);
        assert_eq!(ctx.params().get("id"), Some("7"));
        assert_eq!(ctx.params().len(), 1);
    }
}
