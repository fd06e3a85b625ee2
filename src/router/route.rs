//! The [`Route`] contract: URL predicate, negotiation checks, and handler.

use std::future::Future;
use std::pin::Pin;

use super::negotiate;
use crate::context::{Context, PathParams};
use crate::security::{Authorization, AuthorizationDisabled};
use crate::{HttpError, Method, Request, Response};

/// Boxed future returned by [`Route::respond`].
pub type RouteFuture<'a> = Pin<Box<dyn Future<Output = Result<Response, HttpError>> + Send + 'a>>;

const GET_ONLY: &[Method] = &[Method::Get];

/// A predicate + handler pair tested against incoming requests.
///
/// Only [`matches`](Self::matches) and [`respond`](Self::respond) are required.
/// Every other method has a permissive default, so a route overrides exactly
/// the constraints it cares about. The [`Router`](super::Router) calls the
/// checks in this order and stops at the first failure:
///
/// | Check                                           | Failure      |
/// |-------------------------------------------------|--------------|
/// | [`matches`](Self::matches)                      | route skipped |
/// | [`check_method`](Self::check_method)            | `405`        |
/// | [`check_accept`](Self::check_accept)            | `406`        |
/// | [`check_accept_charset`](Self::check_accept_charset) | `406`   |
/// | [`check_accept_encoding`](Self::check_accept_encoding) | `406` |
/// | [`check_accept_language`](Self::check_accept_language) | logged only |
/// | [`check_content_encoding`](Self::check_content_encoding) | `415` |
/// | [`check_content_length`](Self::check_content_length) | `411`   |
/// | [`check_content_type`](Self::check_content_type) | `415`       |
/// | [`check_content_charset`](Self::check_content_charset) | `415` |
/// | [`is_authorized`](Self::is_authorized)          | `403`        |
///
/// # Examples
///
/// ```rust
/// use haven::context::{Context, PathParams};
/// use haven::router::{Route, RouteFuture};
/// use haven::{Response, StatusCode};
///
/// struct Home;
///
/// impl Route for Home {
///     fn matches(&self, path: &str) -> Option<PathParams> {
///         (path == "/").then(PathParams::new)
///     }
///
///     fn respond<'a>(&'a self, ctx: Context) -> RouteFuture<'a> {
///         Box::pin(async move {
///             Ok(ctx
///                 .response(StatusCode::Ok)?
///                 .content_type("text/html")?
///                 .header("X-Some-Header-Example-Name", "headerValueExample")
///                 .body("<i>Home</i>"))
///         })
///     }
/// }
/// ```
pub trait Route: Send + Sync {
    /// Returns the captured path parameters when this route serves `path`.
    fn matches(&self, path: &str) -> Option<PathParams>;

    /// Methods this route serves; reported in `Allow` on a `405`.
    fn allowed_methods(&self) -> &[Method] {
        GET_ONLY
    }

    /// Media types the handler can produce. Empty means "anything".
    fn produces(&self) -> &[String] {
        &[]
    }

    /// Media ranges the handler can read from request bodies. Empty means "anything".
    fn consumes(&self) -> &[String] {
        &[]
    }

    /// Language tags the handler can produce. Empty means "any".
    fn languages(&self) -> &[String] {
        &[]
    }

    /// Content codings the handler can apply to its response besides `identity`.
    fn response_encodings(&self) -> &[String] {
        &[]
    }

    /// Whether requests must declare a `Content-Length`.
    fn requires_content_length(&self) -> bool {
        false
    }

    /// The authorization policy guarding this route.
    fn authorization(&self) -> &dyn Authorization {
        &AuthorizationDisabled
    }

    fn check_method(&self, request: &Request) -> bool {
        self.allowed_methods()
            .iter()
            .any(|method| request.is(method.as_str()))
    }

    fn check_accept(&self, ctx: &Context) -> bool {
        negotiate::accepts_media(&ctx.request().accept(), self.produces())
    }

    fn check_accept_charset(&self, ctx: &Context) -> bool {
        negotiate::accepts_charset(ctx.request().accept_charset(), ctx.settings())
    }

    fn check_accept_encoding(&self, ctx: &Context) -> bool {
        negotiate::accepts_encoding(ctx.request().accept_encoding(), self.response_encodings())
    }

    /// A mismatch here never rejects the request: the client still gets the
    /// default language rather than an error.
    fn check_accept_language(&self, ctx: &Context) -> bool {
        negotiate::accepts_language(ctx.request().accept_language(), self.languages())
    }

    fn check_content_encoding(&self, ctx: &Context) -> bool {
        negotiate::content_encoding_supported(ctx.request().content_encoding())
    }

    fn check_content_length(&self, ctx: &Context) -> bool {
        !self.requires_content_length() || ctx.request().content_length().is_some()
    }

    fn check_content_type(&self, ctx: &Context) -> bool {
        negotiate::content_type_supported(ctx.request().content_type(), self.consumes())
    }

    fn check_content_charset(&self, ctx: &Context) -> bool {
        let charset = ctx.request().content_type_charset();
        charset.is_empty() || ctx.settings().supports_charset(charset)
    }

    /// Runs the route's [`Authorization`]. An `Err` is sent as-is instead of `403`.
    fn is_authorized(&self, ctx: &Context) -> Result<bool, HttpError> {
        self.authorization().authorize(ctx)
    }

    /// Produces the response once every check passed.
    fn respond<'a>(&'a self, ctx: Context) -> RouteFuture<'a>;
}
