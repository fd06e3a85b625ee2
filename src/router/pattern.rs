//! URL-pattern routes built from closures.
//!
//! Three pattern styles are supported:
//!
//! | Pattern              | Example match              | Captured params              |
//! |----------------------|----------------------------|------------------------------|
//! | `/users`             | `/users`                   | *(none)*                     |
//! | `/users/:id`         | `/users/42`                | `id → "42"`                  |
//! | `/files/*`           | `/files/docs/readme.txt`   | `wildcard → "/docs/readme.txt"` |
//!
//! Trailing slashes are normalized on both patterns and incoming paths, so `/users/` and
//! `/users` are treated as equivalent. Captured values are percent-decoded
//! (`/users/a%20b` captures `id → "a b"`); literal segments compare undecoded.

use std::pin::Pin;
use std::sync::Arc;

use percent_encoding::percent_decode_str;

use super::route::{Route, RouteFuture};
use crate::context::{Context, PathParams};
use crate::security::{Authorization, AuthorizationDisabled};
use crate::{HttpError, Method, Response};

/// Type-erased, heap-allocated async handler behind a [`PatternRoute`].
pub type Handler = Arc<
    dyn Fn(Context) -> Pin<Box<dyn Future<Output = Result<Response, HttpError>> + Send>>
        + Send
        + Sync
        + 'static,
>;

/// What a handler may return: a plain [`Response`] or a `Result` whose error
/// converts into [`HttpError`].
pub trait IntoRouteResult {
    fn into_route_result(self) -> Result<Response, HttpError>;
}

impl IntoRouteResult for Response {
    fn into_route_result(self) -> Result<Response, HttpError> {
        Ok(self)
    }
}

impl<E> IntoRouteResult for Result<Response, E>
where
    E: Into<HttpError>,
{
    fn into_route_result(self) -> Result<Response, HttpError> {
        self.map_err(Into::into)
    }
}

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = R> + Send` with `R: IntoRouteResult`
/// implements this trait through the blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Result<Response, HttpError>> + Send>>;
}

impl<T, F, R> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = R> + Send + 'static,
    R: IntoRouteResult + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Result<Response, HttpError>> + Send>> {
        let fut = (self)(ctx);
        Box::pin(async move { fut.await.into_route_result() })
    }
}

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone)]
pub(crate) enum Segment {
    Static(String),
    Parameter(String),
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
pub(crate) enum Pattern {
    // Matches one exact path string, e.g. `/users`.
    Exact(String),
    // Matches a fixed number of segments where some may be named captures, e.g. `/users/:id`.
    Parameterized { segments: Vec<Segment> },
    // Matches any path that starts with the given prefix, e.g. `/files/*`.
    Wildcard(String),
}

fn trim_trailing_slash(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

impl Pattern {
    /// Compile a pattern string.
    ///
    /// Checked in order: a `/*` suffix makes a wildcard, any `:` makes a
    /// parameterized pattern, anything else is an exact match.
    pub(crate) fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return Pattern::Wildcard(prefix.to_string());
        }

        if pattern.contains(':') {
            let segments = pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| match s.strip_prefix(':') {
                    Some(p) => Segment::Parameter(p.to_string()),
                    None => Segment::Static(s.to_string()),
                })
                .collect();

            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_string())
    }

    pub(crate) fn matches(&self, path: &str) -> Option<PathParams> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => (p == path).then(PathParams::new),
            Pattern::Parameterized { segments } => {
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if segments.len() != path_segments.len() {
                    return None;
                }

                let mut params = PathParams::new();
                for (seg, path_seg) in segments.iter().zip(path_segments) {
                    match seg {
                        Segment::Static(s) if s != path_seg => return None,
                        Segment::Static(_) => {}
                        Segment::Parameter(name) => {
                            params.insert(name.clone(), decode(path_seg));
                        }
                    }
                }
                Some(params)
            }
            Pattern::Wildcard(prefix) => {
                let suffix = path.strip_prefix(prefix.as_str())?;
                // `/files/*` must not match `/filesystem`.
                if !suffix.is_empty() && !suffix.starts_with('/') {
                    return None;
                }
                let mut params = PathParams::new();
                params.insert("wildcard".to_string(), decode(suffix));
                Some(params)
            }
        }
    }
}

/// A [`Route`] made of a URL pattern, a method list, negotiation metadata, and
/// a closure handler.
///
/// # Examples
///
/// ```rust
/// use haven::context::Context;
/// use haven::router::PatternRoute;
/// use haven::{Method, Response, StatusCode};
///
/// let route = PatternRoute::new(&[Method::Get, Method::Head], "/reports/:year", |ctx: Context| async move {
///     let year = ctx.params().get("year").unwrap_or_default().to_owned();
///     Response::new(StatusCode::Ok).body(year)
/// })
/// .with_produces(["text/csv", "application/json"])
/// .require_content_length(false);
/// ```
pub struct PatternRoute {
    pattern: Pattern,
    methods: Vec<Method>,
    produces: Vec<String>,
    consumes: Vec<String>,
    languages: Vec<String>,
    response_encodings: Vec<String>,
    requires_content_length: bool,
    authorization: Arc<dyn Authorization>,
    handler: Handler,
}

fn strings<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl PatternRoute {
    pub fn new(methods: &[Method], path: &str, handler: impl IntoHandler) -> Self {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        Self {
            pattern: Pattern::parse(path),
            methods: methods.to_vec(),
            produces: Vec::new(),
            consumes: Vec::new(),
            languages: Vec::new(),
            response_encodings: Vec::new(),
            requires_content_length: false,
            authorization: Arc::new(AuthorizationDisabled),
            handler,
        }
    }

    pub fn get(path: &str, handler: impl IntoHandler) -> Self {
        Self::new(&[Method::Get], path, handler)
    }

    pub fn post(path: &str, handler: impl IntoHandler) -> Self {
        Self::new(&[Method::Post], path, handler)
    }

    pub fn put(path: &str, handler: impl IntoHandler) -> Self {
        Self::new(&[Method::Put], path, handler)
    }

    pub fn delete(path: &str, handler: impl IntoHandler) -> Self {
        Self::new(&[Method::Delete], path, handler)
    }

    pub fn patch(path: &str, handler: impl IntoHandler) -> Self {
        Self::new(&[Method::Patch], path, handler)
    }

    pub fn options(path: &str, handler: impl IntoHandler) -> Self {
        Self::new(&[Method::Options], path, handler)
    }

    /// Replace the served methods.
    pub fn methods(mut self, methods: &[Method]) -> Self {
        self.methods = methods.to_vec();
        self
    }

    /// Media types the handler produces; checked against `Accept`.
    pub fn with_produces<I, S>(mut self, media_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.produces = strings(media_types);
        self
    }

    /// Media ranges the handler reads; checked against `Content-Type`.
    pub fn with_consumes<I, S>(mut self, media_ranges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.consumes = strings(media_ranges);
        self
    }

    pub fn with_languages<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = strings(tags);
        self
    }

    pub fn with_response_encodings<I, S>(mut self, codings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.response_encodings = strings(codings);
        self
    }

    /// Reject requests without `Content-Length` with `411`.
    pub fn require_content_length(mut self, required: bool) -> Self {
        self.requires_content_length = required;
        self
    }

    pub fn with_authorization(mut self, authorization: Arc<dyn Authorization>) -> Self {
        self.authorization = authorization;
        self
    }
}

impl Route for PatternRoute {
    fn matches(&self, path: &str) -> Option<PathParams> {
        self.pattern.matches(path)
    }

    fn allowed_methods(&self) -> &[Method] {
        &self.methods
    }

    fn produces(&self) -> &[String] {
        &self.produces
    }

    fn consumes(&self) -> &[String] {
        &self.consumes
    }

    fn languages(&self) -> &[String] {
        &self.languages
    }

    fn response_encodings(&self) -> &[String] {
        &self.response_encodings
    }

    fn requires_content_length(&self) -> bool {
        self.requires_content_length
    }

    fn authorization(&self) -> &dyn Authorization {
        self.authorization.as_ref()
    }

    fn respond<'a>(&'a self, ctx: Context) -> RouteFuture<'a> {
        (self.handler)(ctx)
    }
}
