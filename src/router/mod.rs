//! Request routing with content negotiation.
//!
//! A [`Router`] holds an ordered list of [`Route`]s. Each request walks the list
//! in registration order; the first route whose URL pattern matches, whose
//! method is allowed, and whose negotiation checks all pass produces the
//! response. Every failure, whether raised by a check or by a handler, is
//! rendered by the router's single [`ErrorHandler`].
//!
//! When no route matches the URL the answer is `404`. When some routes match
//! the URL but none serves the method, the answer is `405` with an `Allow`
//! header listing every method those routes serve.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::Settings;
use crate::container::Container;
use crate::context::Context;
use crate::error::{DefaultErrorHandler, ErrorHandler, HttpError};
use crate::{Method, Request, Response};

pub mod negotiate;
mod pattern;
mod route;

pub use pattern::{Handler, IntoHandler, IntoRouteResult, PatternRoute};
pub use route::{Route, RouteFuture};

/// Ordered route table plus the shared application state handed to each route.
///
/// # Examples
///
/// ```rust,no_run
/// use haven::context::Context;
/// use haven::router::PatternRoute;
/// use haven::{Response, Router, Settings, StatusCode};
///
/// let mut router = Router::new().with_settings(Settings::default());
///
/// router.get("/ping", |_ctx| async { Response::new(StatusCode::Ok) });
///
/// router.add_route(
///     PatternRoute::get("/users/:id", |ctx: Context| async move {
///         let id = ctx.params().get("id").unwrap_or("unknown").to_owned();
///         Response::new(StatusCode::Ok).body(id)
///     })
///     .with_produces(["text/plain"]),
/// );
/// ```
pub struct Router {
    routes: Vec<Box<dyn Route>>,
    settings: Arc<Settings>,
    services: Arc<Container>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create an empty router with default settings, an empty container and
    /// the [`DefaultErrorHandler`].
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            settings: Arc::new(Settings::default()),
            services: Arc::new(Container::new()),
            error_handler: Arc::new(DefaultErrorHandler),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    #[must_use]
    pub fn with_services(mut self, services: Container) -> Self {
        self.services = Arc::new(services);
        self
    }

    /// Replace the handler that renders every failed request.
    #[must_use]
    pub fn with_error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn services(&self) -> &Container {
        &self.services
    }

    /// Append a route. Routes are tried in the order they were added.
    pub fn add_route(&mut self, route: impl Route + 'static) {
        self.routes.push(Box::new(route));
    }

    /// Register a handler for `GET` requests matching `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(PatternRoute::get(path, handler));
    }

    /// Register a handler for `POST` requests matching `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(PatternRoute::post(path, handler));
    }

    pub fn put(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(PatternRoute::put(path, handler));
    }

    pub fn delete(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(PatternRoute::delete(path, handler));
    }

    pub fn patch(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(PatternRoute::patch(path, handler));
    }

    pub fn options(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(PatternRoute::options(path, handler));
    }

    /// Return the number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch `request` and always come back with a response.
    ///
    /// Errors from checks or handlers are passed to the configured
    /// [`ErrorHandler`]. One `info` line per request records method, path,
    /// status and elapsed time.
    pub async fn handle(&self, request: Request) -> Response {
        let start = Instant::now();
        let request = Arc::new(request);

        let response = match self.dispatch(&request).await {
            Ok(response) => response,
            Err(error) => self.error_handler.handle(&request, error),
        };

        info!(
            "{} {} - {} ({:?})",
            request.method(),
            request.path(),
            response.status().as_u16(),
            start.elapsed()
        );
        response
    }

    async fn dispatch(&self, request: &Arc<Request>) -> Result<Response, HttpError> {
        let path = request.path();
        let mut allowed: Vec<Method> = Vec::new();

        for (index, route) in self.routes.iter().enumerate() {
            let Some(params) = route.matches(path) else {
                continue;
            };

            if !route.check_method(request) {
                debug!(route = index, method = %request.method(), "url matched, method not allowed");
                for method in route.allowed_methods() {
                    if !allowed.contains(method) {
                        allowed.push(method.clone());
                    }
                }
                continue;
            }

            let ctx = Context::shared(Arc::clone(request), params)
                .with_app(Arc::clone(&self.settings), Arc::clone(&self.services));
            run_checks(route.as_ref(), &ctx)?;

            debug!(route = index, path, "route selected");
            return route.respond(ctx).await;
        }

        if allowed.is_empty() {
            Err(HttpError::not_found())
        } else {
            Err(HttpError::method_not_allowed(allowed))
        }
    }
}

/// Runs the negotiation checks of a URL- and method-compatible route in order,
/// stopping at the first failure.
fn run_checks(route: &dyn Route, ctx: &Context) -> Result<(), HttpError> {
    if !route.check_accept(ctx) {
        return Err(HttpError::not_acceptable().with_message("HTTP 406: Unacceptable mime type."));
    }
    if !route.check_accept_charset(ctx) {
        return Err(HttpError::not_acceptable().with_message("HTTP 406: Unacceptable charset."));
    }
    if !route.check_accept_encoding(ctx) {
        return Err(HttpError::not_acceptable().with_message("HTTP 406: Unacceptable encoding."));
    }
    if !route.check_accept_language(ctx) {
        debug!(
            accept_language = ctx.request().headers().get("accept-language").unwrap_or_default(),
            "no acceptable language, responding in the default one"
        );
    }
    if !route.check_content_encoding(ctx) {
        return Err(HttpError::unsupported_media_type()
            .with_message("HTTP 415: Unsupported request body encoding."));
    }
    if !route.check_content_length(ctx) {
        return Err(HttpError::length_required().with_message("HTTP 411: Content length required."));
    }
    if !route.check_content_type(ctx) {
        return Err(HttpError::unsupported_media_type()
            .with_message("HTTP 415: Unsupported request content type."));
    }
    if !route.check_content_charset(ctx) {
        return Err(HttpError::unsupported_media_type()
            .with_message("HTTP 415: Unsupported request body charset."));
    }
    if !route.is_authorized(ctx)? {
        return Err(HttpError::forbidden());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::StatusCode;
    use crate::context::PathParams;
    use crate::error::HttpErrorKind;
    use crate::security::BearerToken;

    fn request(method: &str, path: &str, headers: &[(&str, &str)]) -> Request {
        let mut raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n");
        for (name, value) in headers {
            raw.push_str(&format!("{name}: {value}\r\n"));
        }
        raw.push_str("\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    fn ok(_ctx: Context) -> impl Future<Output = Response> + Send {
        async { Response::new(StatusCode::Ok) }
    }

    fn body(response: &Response) -> &str {
        std::str::from_utf8(response.body_ref()).unwrap()
    }

    // ── registration ──────────────────────────────────────────────────────────

    #[test]
    fn router_starts_empty() {
        assert!(Router::new().is_empty());
        assert!(Router::default().is_empty());
    }

    #[test]
    fn router_len_increments_on_add() {
        let mut router = Router::new();
        router.get("/a", ok);
        router.post("/b", ok);
        router.add_route(PatternRoute::put("/c", ok));
        assert_eq!(router.len(), 3);
    }

    // ── URL and method ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_router_returns_404() {
        let res = Router::new().handle(request("GET", "/", &[])).await;
        assert_eq!(res.status(), StatusCode::NotFound);
        assert!(res.headers().get("etag").is_some());
        assert!(res.headers().get("last-modified").is_some());
    }

    #[tokio::test]
    async fn unregistered_path_returns_404() {
        let mut router = Router::new();
        router.get("/hello", ok);
        let res = router.handle(request("GET", "/world", &[])).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn wrong_method_returns_405_with_allow() {
        let mut router = Router::new();
        router.get("/hello", ok);
        let res = router.handle(request("POST", "/hello", &[])).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
        assert_eq!(res.headers().get("allow"), Some("GET"));
    }

    #[tokio::test]
    async fn allow_lists_every_url_compatible_route() {
        let mut router = Router::new();
        router.get("/items/:id", ok);
        router.add_route(PatternRoute::new(&[Method::Put, Method::Get], "/items/:id", ok));
        router.delete("/items/:id", ok);
        router.post("/other", ok);

        let res = router.handle(request("PATCH", "/items/3", &[])).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
        assert_eq!(res.headers().get("allow"), Some("GET,PUT,DELETE"));
    }

    #[tokio::test]
    async fn later_route_with_matching_method_wins_over_405() {
        let mut router = Router::new();
        router.get("/r", ok);
        router.post("/r", |_ctx| async { Response::new(StatusCode::Created) });
        let res = router.handle(request("POST", "/r", &[])).await;
        assert_eq!(res.status(), StatusCode::Created);
    }

    #[tokio::test]
    async fn first_matching_route_wins() {
        let mut router = Router::new();
        router.get("/path", ok);
        router.get("/path", |_ctx| async { Response::new(StatusCode::Accepted) });
        let res = router.handle(request("GET", "/path", &[])).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn params_and_wildcards_reach_the_handler() {
        let mut router = Router::new();
        router.get("/users/:id", |ctx: Context| async move {
            let id = ctx.params().get("id").unwrap_or("").to_owned();
            Response::new(StatusCode::Ok).body(id)
        });
        router.get("/files/*", |ctx: Context| async move {
            let rest = ctx.params().get("wildcard").unwrap_or("").to_owned();
            Response::new(StatusCode::Ok).body(rest)
        });

        let res = router.handle(request("GET", "/users/42", &[])).await;
        assert_eq!(body(&res), "42");
        let res = router.handle(request("GET", "/files/docs/readme.txt", &[])).await;
        assert_eq!(body(&res), "/docs/readme.txt");
    }

    #[tokio::test]
    async fn method_variants_registered() {
        let mut router = Router::new();
        router.put("/r", ok);
        router.delete("/r", ok);
        router.patch("/r", ok);
        router.options("/r", ok);
        for method in ["PUT", "DELETE", "PATCH", "OPTIONS"] {
            let res = router.handle(request(method, "/r", &[])).await;
            assert_eq!(res.status(), StatusCode::Ok, "{method}");
        }
    }

    // ── negotiation ───────────────────────────────────────────────────────────

    fn json_router() -> Router {
        let mut router = Router::new();
        router.add_route(
            PatternRoute::new(&[Method::Get, Method::Post], "/api", ok)
                .with_produces(["application/json"])
                .with_consumes(["application/json"]),
        );
        router
    }

    #[tokio::test]
    async fn unacceptable_mime_type_is_406() {
        let res = json_router()
            .handle(request("GET", "/api", &[("Accept", "text/html")]))
            .await;
        assert_eq!(res.status(), StatusCode::NotAcceptable);
        assert_eq!(body(&res), "HTTP 406: Unacceptable mime type.");

        let res = json_router()
            .handle(request("GET", "/api", &[("Accept", "text/html, */*;q=0.1")]))
            .await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn unacceptable_charset_is_406() {
        let res = json_router()
            .handle(request("GET", "/api", &[("Accept-Charset", "koi8-r")]))
            .await;
        assert_eq!(res.status(), StatusCode::NotAcceptable);
        assert_eq!(body(&res), "HTTP 406: Unacceptable charset.");
    }

    #[tokio::test]
    async fn refused_identity_encoding_is_406() {
        let res = json_router()
            .handle(request("GET", "/api", &[("Accept-Encoding", "br, identity;q=0")]))
            .await;
        assert_eq!(res.status(), StatusCode::NotAcceptable);
        assert_eq!(body(&res), "HTTP 406: Unacceptable encoding.");
    }

    #[tokio::test]
    async fn accept_checks_run_in_order() {
        let res = json_router()
            .handle(request(
                "GET",
                "/api",
                &[("Accept", "text/html"), ("Accept-Charset", "koi8-r")],
            ))
            .await;
        assert_eq!(body(&res), "HTTP 406: Unacceptable mime type.");
    }

    #[tokio::test]
    async fn language_mismatch_is_not_fatal() {
        let mut router = Router::new();
        router.add_route(PatternRoute::get("/", ok).with_languages(["en"]));
        let res = router
            .handle(request("GET", "/", &[("Accept-Language", "fr")]))
            .await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn unsupported_body_encoding_is_415() {
        let res = json_router()
            .handle(request("POST", "/api", &[("Content-Encoding", "br")]))
            .await;
        assert_eq!(res.status(), StatusCode::UnsupportedMediaType);
        assert_eq!(body(&res), "HTTP 415: Unsupported request body encoding.");
    }

    #[tokio::test]
    async fn missing_content_length_is_411() {
        let mut router = Router::new();
        router.add_route(PatternRoute::post("/upload", ok).require_content_length(true));

        let res = router.handle(request("POST", "/upload", &[])).await;
        assert_eq!(res.status(), StatusCode::LengthRequired);
        assert_eq!(body(&res), "HTTP 411: Content length required.");

        let res = router
            .handle(request("POST", "/upload", &[("Content-Length", "0")]))
            .await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn unsupported_content_type_is_415() {
        let res = json_router()
            .handle(request("POST", "/api", &[("Content-Type", "text/csv")]))
            .await;
        assert_eq!(res.status(), StatusCode::UnsupportedMediaType);
        assert_eq!(body(&res), "HTTP 415: Unsupported request content type.");
    }

    #[tokio::test]
    async fn unsupported_body_charset_is_415() {
        let res = json_router()
            .handle(request(
                "POST",
                "/api",
                &[("Content-Type", "application/json; charset=koi8-r")],
            ))
            .await;
        assert_eq!(res.status(), StatusCode::UnsupportedMediaType);
        assert_eq!(body(&res), "HTTP 415: Unsupported request body charset.");
    }

    #[tokio::test]
    async fn content_checks_run_in_order() {
        let mut router = Router::new();
        router.add_route(
            PatternRoute::post("/api", ok)
                .with_consumes(["application/json"])
                .require_content_length(true),
        );
        let res = router
            .handle(request(
                "POST",
                "/api",
                &[("Content-Encoding", "br"), ("Content-Type", "text/csv")],
            ))
            .await;
        assert_eq!(body(&res), "HTTP 415: Unsupported request body encoding.");

        let res = router
            .handle(request("POST", "/api", &[("Content-Type", "text/csv")]))
            .await;
        assert_eq!(res.status(), StatusCode::LengthRequired);
    }

    // ── authorization ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn denied_authorization_is_403() {
        let mut router = Router::new();
        router.add_route(
            PatternRoute::get("/admin", ok).with_authorization(Arc::new(BearerToken::new(["t0k"]))),
        );

        let res = router
            .handle(request("GET", "/admin", &[("Authorization", "Bearer bad")]))
            .await;
        assert_eq!(res.status(), StatusCode::Forbidden);

        let res = router
            .handle(request("GET", "/admin", &[("Authorization", "Bearer t0k")]))
            .await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn authorization_errors_pass_through() {
        let mut router = Router::new();
        router.add_route(
            PatternRoute::get("/admin", ok).with_authorization(Arc::new(BearerToken::new(["t0k"]))),
        );
        let res = router.handle(request("GET", "/admin", &[])).await;
        assert_eq!(res.status(), StatusCode::Unauthorized);
        assert_eq!(res.headers().get("www-authenticate"), Some("Bearer"));
    }

    #[tokio::test]
    async fn negotiation_runs_before_authorization() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut router = Router::new();
        router.add_route(
            PatternRoute::get("/", ok)
                .with_produces(["application/json"])
                .with_authorization(Arc::new(move |_ctx: &Context| -> Result<bool, HttpError> {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(true)
                })),
        );
        let res = router
            .handle(request("GET", "/", &[("Accept", "text/html")]))
            .await;
        assert_eq!(res.status(), StatusCode::NotAcceptable);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    // ── handlers and error handling ───────────────────────────────────────────

    #[tokio::test]
    async fn handler_errors_go_through_the_error_handler() {
        let mut router = Router::new();
        router.post("/json", |ctx: Context| async move {
            let value: serde_json::Value = ctx.json()?;
            Ok::<_, HttpError>(Response::new(StatusCode::Ok).body(value.to_string()))
        });
        let res = router
            .handle(request("POST", "/json", &[("Content-Length", "0")]))
            .await;
        assert_eq!(res.status(), StatusCode::BadRequest);
    }

    struct Branded;

    impl ErrorHandler for Branded {
        fn handle(&self, request: &Request, error: HttpError) -> Response {
            let allow = match error.kind() {
                HttpErrorKind::MethodNotAllowed(methods) => methods.len(),
                _ => 0,
            };
            Response::new(error.status()).body(format!("{} {} {allow}", request.path(), error.status().as_u16()))
        }
    }

    #[tokio::test]
    async fn custom_error_handler_renders_failures() {
        let mut router = Router::new().with_error_handler(Branded);
        router.get("/a", ok);
        let res = router.handle(request("GET", "/missing", &[])).await;
        assert_eq!(body(&res), "/missing 404 0");
        let res = router.handle(request("DELETE", "/a", &[])).await;
        assert_eq!(body(&res), "/a 405 1");
    }

    #[tokio::test]
    async fn routes_see_settings_and_services() {
        let mut services = Container::new();
        services.insert_named("greeting", String::from("hi")).unwrap();
        let settings = Settings {
            default_charset: "ISO-8859-1".into(),
            ..Settings::default()
        };

        let mut router = Router::new().with_settings(settings).with_services(services);
        router.get("/", |ctx: Context| async move {
            let greeting: Arc<String> = ctx.services().get_named("greeting")?;
            Ok::<_, HttpError>(
                ctx.response(StatusCode::Ok)?
                    .content_type("text/plain")?
                    .body(greeting.as_str()),
            )
        });

        let res = router.handle(request("GET", "/", &[])).await;
        assert_eq!(body(&res), "hi");
        assert_eq!(
            res.content_type_header().as_deref(),
            Some("text/plain;charset=ISO-8859-1")
        );
        assert_eq!(router.settings().default_charset, "ISO-8859-1");
    }

    struct Fixed;

    impl Route for Fixed {
        fn matches(&self, path: &str) -> Option<PathParams> {
            path.starts_with("/fixed").then(PathParams::new)
        }

        fn respond<'a>(&'a self, _ctx: Context) -> RouteFuture<'a> {
            Box::pin(async { Ok(Response::new(StatusCode::NoContent)) })
        }
    }

    #[tokio::test]
    async fn hand_written_routes_use_default_checks() {
        let mut router = Router::new();
        router.add_route(Fixed);
        let res = router.handle(request("GET", "/fixed/anything", &[])).await;
        assert_eq!(res.status(), StatusCode::NoContent);
        let res = router.handle(request("POST", "/fixed", &[])).await;
        assert_eq!(res.headers().get("allow"), Some("GET"));
    }
}
