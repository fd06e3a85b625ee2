//! Request authorization.
//!
//! Every route consults an [`Authorization`] as the last check before its
//! handler runs. Returning `Ok(false)` makes the router answer `403 Forbidden`;
//! returning an error lets the policy pick its own response instead (e.g. a
//! `401` with a `WWW-Authenticate` challenge).
//!
//! Closures `Fn(&Context) -> Result<bool, HttpError>` implement the trait, so
//! small policies need no dedicated type:
//!
//! ```rust
//! use haven::context::Context;
//! use haven::security::Authorization;
//! use haven::HttpError;
//!
//! let admin_only = |ctx: &Context| -> Result<bool, HttpError> {
//!     Ok(ctx.request().headers().get("x-role") == Some("admin"))
//! };
//! # fn assert_policy(_: &dyn Authorization) {}
//! # assert_policy(&admin_only);
//! ```

use crate::HttpError;
use crate::context::Context;

/// Decides whether a request may reach a route's handler.
pub trait Authorization: Send + Sync {
    fn authorize(&self, ctx: &Context) -> Result<bool, HttpError>;
}

/// Policy for routes that need no authorization: every request is allowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthorizationDisabled;

impl Authorization for AuthorizationDisabled {
    fn authorize(&self, _ctx: &Context) -> Result<bool, HttpError> {
        Ok(true)
    }
}

impl<F> Authorization for F
where
    F: Fn(&Context) -> Result<bool, HttpError> + Send + Sync,
{
    fn authorize(&self, ctx: &Context) -> Result<bool, HttpError> {
        self(ctx)
    }
}

/// Requires `Authorization: Bearer <token>` with one of the configured tokens.
///
/// A missing header yields `401 Unauthorized` with a `WWW-Authenticate: Bearer`
/// challenge; a present but unknown token yields `Ok(false)` (`403`).
#[derive(Debug, Clone)]
pub struct BearerToken {
    tokens: Vec<String>,
}

impl BearerToken {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }
}

impl Authorization for BearerToken {
    fn authorize(&self, ctx: &Context) -> Result<bool, HttpError> {
        let Some(header) = ctx.request().headers().get("authorization") else {
            return Err(HttpError::unauthorized().with_header("WWW-Authenticate", "Bearer"));
        };
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .unwrap_or_default();
        Ok(!token.is_empty() && self.tokens.iter().any(|t| t == token))
    }
}
