//! # ssrkit
//!
//! A minimal server-side rendering toolkit: an async markup compositor and a
//! GET-only HTTP/1.1 router with per-route response caching.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ssrkit::Router;
//! use ssrkit::markup::{Element, Props, render};
//! use ssrkit::router::RouteOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::default();
//!
//!     router.html(RouteOptions::new("/hello/:name").ttl_ms(10_000), |ctx| async move {
//!         let name = ctx.param("name").unwrap_or("world").to_owned();
//!         Ok(render("main", Props::new(), vec![Element::new("h1").child(name).into()]).await)
//!     });
//!
//!     router.not_found(|_ctx| async { Ok("<h1>Nothing here</h1>") });
//!     router.listen(8080).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod http;
pub mod markup;
pub mod router;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use context::Context;
pub use http::{ContentType, Headers, Method, Request, Response, StatusCode};
pub use router::{BoxError, HandlerError, RouteOptions, Router};
pub use server::{Server, ServerError};
