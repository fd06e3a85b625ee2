//! # haven
//!
//! An async HTTP/1.1 application framework: ordered routes with content
//! negotiation, a typed HTTP error taxonomy rendered through one error handler,
//! a service container, and model/collection helpers for controllers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use haven::context::Context;
//! use haven::router::PatternRoute;
//! use haven::{HttpError, Response, Router, Server, Settings, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load("haven.toml").unwrap_or_default();
//!
//!     let mut router = Router::new().with_settings(settings.clone());
//!     router.get("/", |_ctx| async { Response::new(StatusCode::Ok).body("Hello, World!") });
//!     router.add_route(
//!         PatternRoute::post("/echo", |ctx: Context| async move {
//!             let value: serde_json::Value = ctx.json()?;
//!             Ok::<_, HttpError>(
//!                 ctx.response(StatusCode::Ok)?
//!                     .content_type("application/json")?
//!                     .body(value.to_string()),
//!             )
//!         })
//!         .with_produces(["application/json"])
//!         .with_consumes(["application/json"])
//!         .require_content_length(true),
//!     );
//!
//!     Server::bind_with(&settings).await?.serve(router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod http;
pub mod model;
pub mod router;
pub mod security;
pub mod server;

pub use config::Settings;
pub use error::{DefaultErrorHandler, ErrorHandler, HttpError};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::{Route, Router};
pub use server::{Server, ServerError};
