//! GET-only router with per-route response caching.
//!
//! A [`Router`] holds an ordered route table. Each route has a segmented
//! [`Pattern`], a declared [`ContentType`], an optional cache ttl and an async
//! handler that produces the response body. [`Router::dispatch`] runs the
//! whole request lifecycle:
//!
//! 1. anything but `GET` is answered with `405 METHOD_NOT_ALLOWED`;
//! 2. the first registered route whose pattern matches wins;
//! 3. a fresh cache entry is replayed without calling the handler;
//! 4. otherwise the handler renders, HTML bodies get the `<!DOCTYPE html>`
//!    preamble, and cached routes store the final body;
//! 5. no match goes to the not-found hook (or plain `404 NOT_FOUND`);
//! 6. a failure in steps 2–5 goes to the error hook (or plain
//!    `500 INTERNAL_ERROR`). A failure inside the error hook is not recovered.
//!
//! Routes are matched in registration order, not by specificity: with
//! `/a/:x` registered before `/a/fixed`, a request for `/a/fixed` reaches
//! the parameter route.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::{RouteCache, cache_key};
use crate::config::ServerConfig;
use crate::context::{Context, Parameters, ResponseHandle};
use crate::http::content_type::DOCTYPE;
use crate::server::{Server, ServerError};
use crate::{ContentType, Method, Request, Response, StatusCode};

mod error;
pub mod pattern;

pub use error::{BoxError, HandlerError};
pub use pattern::Pattern;

use pattern::split_path;

type Rendered = Result<String, BoxError>;

// Type-erased route handler / not-found hook.
type Handler<S> = Box<dyn Fn(Context<S>) -> BoxFuture<'static, Rendered> + Send + Sync>;

// Type-erased error hook.
type ErrorHandler<S> =
    Box<dyn Fn(Context<S>, HandlerError) -> BoxFuture<'static, Rendered> + Send + Sync>;

/// Path and cache policy for a route registration.
///
/// A plain `&str` converts into options without caching.
///
/// ```
/// use ssrkit::router::RouteOptions;
///
/// let opts = RouteOptions::new("/posts/:slug").ttl_ms(30_000);
/// assert_eq!(opts.path(), "/posts/:slug");
/// ```
#[derive(Debug, Clone)]
pub struct RouteOptions {
    path: String,
    ttl: Option<Duration>,
}

impl RouteOptions {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ttl: None,
        }
    }

    /// Cache rendered bodies for `ttl`. A zero duration disables caching.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Same as [`ttl`](Self::ttl), in milliseconds.
    #[must_use]
    pub fn ttl_ms(self, millis: u64) -> Self {
        self.ttl(Duration::from_millis(millis))
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl From<&str> for RouteOptions {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for RouteOptions {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

// A single registered route. Only its cache contents change after registration.
struct Route<S> {
    pattern: Pattern,
    content_type: ContentType,
    cache: Option<RouteCache>,
    handler: Handler<S>,
}

impl<S> Route<S> {
    fn ok(&self, body: String) -> Response {
        Response::new(StatusCode::Ok)
            .content_type(&self.content_type)
            .body(body)
    }
}

/// The route table plus the hooks and shared state used while dispatching.
///
/// # Examples
///
/// ```rust,no_run
/// use ssrkit::Router;
/// use ssrkit::router::RouteOptions;
///
/// struct Site {
///     title: &'static str,
/// }
///
/// # async fn run() -> Result<(), ssrkit::ServerError> {
/// let mut router = Router::new(Site { title: "Notes" });
///
/// router.html("/", |ctx| async move {
///     Ok(format!("<h1>{}</h1>", ctx.state().title))
/// });
///
/// router.html(RouteOptions::new("/notes/:id").ttl_ms(5_000), |ctx| async move {
///     Ok(format!("<p>note {}</p>", ctx.param("id").unwrap_or_default()))
/// });
///
/// router.css("/site.css", |_ctx| async { Ok("body{margin:0}") });
///
/// router.listen(3000).await
/// # }
/// ```
pub struct Router<S = ()> {
    routes: Vec<Route<S>>,
    state: Arc<S>,
    not_found: Option<Handler<S>>,
    on_error: Option<ErrorHandler<S>>,
    handler_timeout: Option<Duration>,
}

impl Default for Router<()> {
    fn default() -> Self {
        Self::new(())
    }
}

impl<S> Router<S>
where
    S: Send + Sync + 'static,
{
    /// Create an empty router around the application state every handler sees.
    pub fn new(state: S) -> Self {
        Self {
            routes: Vec::new(),
            state: Arc::new(state),
            not_found: None,
            on_error: None,
            handler_timeout: None,
        }
    }

    /// Register an HTML route. Rendered bodies are prefixed with `<!DOCTYPE html>`.
    pub fn html<H, F, B>(&mut self, opts: impl Into<RouteOptions>, handler: H)
    where
        H: Fn(Context<S>) -> F + Send + Sync + 'static,
        F: Future<Output = Result<B, BoxError>> + Send + 'static,
        B: Into<String> + 'static,
    {
        self.route(ContentType::Html, opts, handler);
    }

    /// Register a stylesheet route.
    pub fn css<H, F, B>(&mut self, opts: impl Into<RouteOptions>, handler: H)
    where
        H: Fn(Context<S>) -> F + Send + Sync + 'static,
        F: Future<Output = Result<B, BoxError>> + Send + 'static,
        B: Into<String> + 'static,
    {
        self.route(ContentType::Css, opts, handler);
    }

    /// Register a script route.
    pub fn js<H, F, B>(&mut self, opts: impl Into<RouteOptions>, handler: H)
    where
        H: Fn(Context<S>) -> F + Send + Sync + 'static,
        F: Future<Output = Result<B, BoxError>> + Send + 'static,
        B: Into<String> + 'static,
    {
        self.route(ContentType::JavaScript, opts, handler);
    }

    /// Register a route with an arbitrary content type.
    ///
    /// Appends to the route table; a non-zero ttl gives the route its own
    /// empty cache table.
    pub fn route<H, F, B>(
        &mut self,
        content_type: impl Into<ContentType>,
        opts: impl Into<RouteOptions>,
        handler: H,
    ) where
        H: Fn(Context<S>) -> F + Send + Sync + 'static,
        F: Future<Output = Result<B, BoxError>> + Send + 'static,
        B: Into<String> + 'static,
    {
        let opts = opts.into();
        let cache = opts
            .ttl
            .filter(|ttl| !ttl.is_zero())
            .map(RouteCache::new);

        debug!(path = %opts.path, cached = cache.is_some(), "route registered");

        self.routes.push(Route {
            pattern: Pattern::parse(&opts.path),
            content_type: content_type.into(),
            cache,
            handler: erase(handler),
        });
    }

    /// Set the hook rendering unmatched paths. Its output is sent as HTML with `404`.
    pub fn not_found<H, F, B>(&mut self, handler: H)
    where
        H: Fn(Context<S>) -> F + Send + Sync + 'static,
        F: Future<Output = Result<B, BoxError>> + Send + 'static,
        B: Into<String> + 'static,
    {
        self.not_found = Some(erase(handler));
    }

    /// Set the hook rendering failures. Its output is sent as HTML with `500`.
    pub fn on_error<H, F, B>(&mut self, handler: H)
    where
        H: Fn(Context<S>, HandlerError) -> F + Send + Sync + 'static,
        F: Future<Output = Result<B, BoxError>> + Send + 'static,
        B: Into<String> + 'static,
    {
        self.on_error = Some(Box::new(move |ctx: Context<S>, err: HandlerError| {
            let fut = handler(ctx, err);
            async move { fut.await.map(Into::into) }.boxed()
        }));
    }

    /// Abort any handler or hook that runs longer than `limit`.
    pub fn handler_timeout(&mut self, limit: Duration) {
        self.handler_timeout = Some(limit);
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Serve on `0.0.0.0:port` until the listener fails.
    pub async fn listen(self, port: u16) -> Result<(), ServerError> {
        let config = ServerConfig {
            port,
            ..ServerConfig::default()
        };
        self.listen_with(config).await
    }

    /// Serve with an explicit [`ServerConfig`]; its handler timeout, if set,
    /// replaces the router's.
    pub async fn listen_with(mut self, config: ServerConfig) -> Result<(), ServerError> {
        if let Some(limit) = config.handler_timeout() {
            self.handler_timeout = Some(limit);
        }
        Server::bind_with(&config).await?.serve(self).await
    }

    /// Run one request through the full lifecycle and return its response.
    ///
    /// Always produces exactly one response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let started = Instant::now();
        let method = request.method().clone();
        let path = request.path().to_owned();

        let response = if method != Method::Get {
            Response::new(StatusCode::MethodNotAllowed).body("METHOD_NOT_ALLOWED")
        } else {
            let request = Arc::new(request);
            match self.respond(&request).await {
                Ok(response) => response,
                Err(err) => self.recover(&request, err).await,
            }
        };

        info!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            elapsed = ?started.elapsed(),
            "request handled"
        );
        response
    }

    // MATCH → CACHE_HIT | RENDER, or NOT_FOUND.
    async fn respond(&self, request: &Arc<Request>) -> Result<Response, HandlerError> {
        let path = request.path();
        let Some((route, params)) = self.find(path) else {
            return self.respond_not_found(request).await;
        };

        let key = cache_key(path, &params);
        if let Some(cache) = &route.cache {
            if let Some(body) = cache.lookup(&key) {
                debug!(key = %key, "cache hit");
                return Ok(route.ok(body));
            }
            debug!(key = %key, "cache miss");
        }

        let handle = ResponseHandle::new();
        let ctx = self.context(request, handle.clone(), params);
        let mut body = self.invoke(|| (route.handler)(ctx)).await?;

        if route.content_type.wants_doctype() {
            body.insert_str(0, DOCTYPE);
        }

        if let Some(cache) = &route.cache {
            cache.store(key, body.clone());
        }

        Ok(Response::new(StatusCode::Ok)
            .headers_from(handle.take_headers())
            .content_type(&route.content_type)
            .body(body))
    }

    async fn respond_not_found(&self, request: &Arc<Request>) -> Result<Response, HandlerError> {
        let Some(hook) = &self.not_found else {
            return Ok(Response::new(StatusCode::NotFound).body("NOT_FOUND"));
        };

        let handle = ResponseHandle::new();
        let ctx = self.context(request, handle.clone(), Parameters::new());
        let html = self.invoke(|| hook(ctx)).await?;

        Ok(Response::new(StatusCode::NotFound)
            .headers_from(handle.take_headers())
            .content_type(&ContentType::Html)
            .body(html))
    }

    // ERROR: exactly one layer of recovery.
    async fn recover(&self, request: &Arc<Request>, err: HandlerError) -> Response {
        warn!(path = %request.path(), error = %err, "request failed");

        let Some(hook) = &self.on_error else {
            return Response::new(StatusCode::InternalServerError).body("INTERNAL_ERROR");
        };

        let handle = ResponseHandle::new();
        let ctx = self.context(request, handle.clone(), Parameters::new());
        match self.invoke(|| hook(ctx, err)).await {
            Ok(html) => Response::new(StatusCode::InternalServerError)
                .headers_from(handle.take_headers())
                .content_type(&ContentType::Html)
                .body(html),
            Err(hook_err) => {
                error!(path = %request.path(), error = %hook_err, "error hook failed");
                Response::new(StatusCode::InternalServerError).keep_alive(false)
            }
        }
    }

    // First route, in registration order, whose pattern accepts `path`.
    fn find(&self, path: &str) -> Option<(&Route<S>, Parameters)> {
        let segments: Vec<&str> = split_path(path).collect();
        self.routes.iter().find_map(|route| {
            route
                .pattern
                .matches(&segments)
                .map(|params| (route, params))
        })
    }

    fn context(
        &self,
        request: &Arc<Request>,
        response: ResponseHandle,
        params: Parameters,
    ) -> Context<S> {
        Context::new(
            Arc::clone(request),
            response,
            params,
            Arc::clone(&self.state),
        )
    }

    // Call a handler and await its future, turning errors, panics and timeouts
    // into `HandlerError`. The call itself runs inside the guard so a handler
    // that panics before returning its future is caught too.
    async fn invoke<C>(&self, call: C) -> Result<String, HandlerError>
    where
        C: FnOnce() -> BoxFuture<'static, Rendered> + Send,
    {
        let guarded = AssertUnwindSafe(async move { call().await }).catch_unwind();
        let outcome = match self.handler_timeout {
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .map_err(|_| HandlerError::TimedOut(limit))?,
            None => guarded.await,
        };

        match outcome {
            Ok(rendered) => rendered.map_err(HandlerError::Failed),
            Err(payload) => Err(HandlerError::from_panic(payload)),
        }
    }
}

// Erase the concrete handler type and normalise its body to `String`.
fn erase<S, H, F, B>(handler: H) -> Handler<S>
where
    S: Send + Sync + 'static,
    H: Fn(Context<S>) -> F + Send + Sync + 'static,
    F: Future<Output = Result<B, BoxError>> + Send + 'static,
    B: Into<String> + 'static,
{
    Box::new(move |ctx: Context<S>| {
        let fut = handler(ctx);
        async move { fut.await.map(Into::into) }.boxed()
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn make_request(method: &str, target: &str) -> Request {
        let raw = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    fn body(res: &Response) -> &str {
        std::str::from_utf8(res.body_ref()).unwrap()
    }

    async fn get(router: &Router<impl Send + Sync + 'static>, target: &str) -> Response {
        router.dispatch(make_request("GET", target)).await
    }

    // Counts calls and renders the running count.
    fn counting_router(ttl_ms: u64) -> (Router, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let mut router = Router::default();
        router.html(RouteOptions::new("/count/:id").ttl_ms(ttl_ms), move |ctx| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(format!("<p>{} #{n}</p>", ctx.param("id").unwrap_or_default())) }
        });
        (router, hits)
    }

    async fn failing(_ctx: Context<()>) -> Result<String, BoxError> {
        Err("database unavailable".into())
    }

    async fn panicking(_ctx: Context<()>) -> Result<String, BoxError> {
        panic!("template exploded")
    }

    // Panics while building its future, before anything is awaited.
    fn exploding(_ctx: Context<()>) -> std::future::Ready<Result<String, BoxError>> {
        panic!("exploded before rendering")
    }

    // ── registration ──────────────────────────────────────────────────────────

    #[test]
    fn router_starts_empty() {
        let router = Router::default();
        assert!(router.is_empty());
        assert_eq!(router.len(), 0);
    }

    #[test]
    fn registration_appends_and_allocates_caches() {
        let mut router = Router::default();
        router.html("/a", |_ctx| async { Ok("a") });
        router.css(RouteOptions::new("/b.css").ttl_ms(500), |_ctx| async { Ok("b") });
        router.js(RouteOptions::new("/c.js").ttl(Duration::ZERO), |_ctx| async { Ok("c") });
        router.route("image/svg+xml", "/d.svg", |_ctx| async { Ok("<svg/>") });

        assert_eq!(router.len(), 4);
        let cached: Vec<_> = router.routes.iter().map(|r| r.cache.is_some()).collect();
        assert_eq!(cached, vec![false, true, false, false]);
        assert_eq!(router.routes[1].cache.as_ref().unwrap().ttl(), Duration::from_millis(500));
    }

    // ── matching ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn first_registered_route_wins_over_literal() {
        let mut router = Router::default();
        router.html("/a/:x", |ctx| async move {
            Ok(format!("param {}", ctx.param("x").unwrap_or_default()))
        });
        router.html("/a/fixed", |_ctx| async { Ok("literal") });

        let res = get(&router, "/a/fixed").await;
        assert_eq!(body(&res), "<!DOCTYPE html>param fixed");
    }

    #[tokio::test]
    async fn literal_registered_first_wins() {
        let mut router = Router::default();
        router.html("/a/fixed", |_ctx| async { Ok("literal") });
        router.html("/a/:x", |_ctx| async { Ok("param") });

        assert_eq!(body(&get(&router, "/a/fixed").await), "<!DOCTYPE html>literal");
        assert_eq!(body(&get(&router, "/a/other").await), "<!DOCTYPE html>param");
    }

    #[tokio::test]
    async fn parameters_reach_the_handler() {
        let mut router = Router::default();
        router.css("/users/:id/:action", |ctx| async move {
            let pairs: Vec<String> = ctx.params().iter().map(|(k, v)| format!("{k}={v}")).collect();
            Ok(pairs.join(","))
        });

        let res = get(&router, "/users/42/edit").await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(body(&res), "id=42,action=edit");
    }

    #[tokio::test]
    async fn segment_count_mismatch_is_not_found() {
        let mut router = Router::default();
        router.html("/a/:b", |_ctx| async { Ok("hit") });

        assert_eq!(get(&router, "/a").await.status(), StatusCode::NotFound);
        assert_eq!(get(&router, "/a/b/c").await.status(), StatusCode::NotFound);
        assert_eq!(get(&router, "/a/b").await.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn handler_sees_request_and_state() {
        let mut router = Router::new(String::from("My Site"));
        router.html("/search", |ctx| async move {
            Ok(format!(
                "{}: {}",
                ctx.state(),
                ctx.request().query_param("q").unwrap_or_default()
            ))
        });

        let res = get(&router, "/search?q=rust").await;
        assert_eq!(body(&res), "<!DOCTYPE html>My Site: rust");
    }

    // ── response shape ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn content_types_and_preamble() {
        let mut router = Router::default();
        router.html("/", |_ctx| async { Ok("<p>hi</p>") });
        router.css("/site.css", |_ctx| async { Ok("p{}") });
        router.js("/app.js", |_ctx| async { Ok("go()") });
        router.route("text/plain", "/robots.txt", |_ctx| async { Ok("User-agent: *") });

        let html = get(&router, "/").await;
        assert_eq!(html.headers().get("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(body(&html), "<!DOCTYPE html><p>hi</p>");

        let css = get(&router, "/site.css").await;
        assert_eq!(css.headers().get("content-type"), Some("text/css; charset=utf-8"));
        assert_eq!(body(&css), "p{}");

        let js = get(&router, "/app.js").await;
        assert_eq!(
            js.headers().get("content-type"),
            Some("application/javascript; charset=utf-8")
        );
        assert_eq!(body(&js), "go()");

        let txt = get(&router, "/robots.txt").await;
        assert_eq!(txt.headers().get("content-type"), Some("text/plain"));
        assert_eq!(body(&txt), "User-agent: *");
    }

    #[tokio::test]
    async fn handler_headers_are_merged_but_content_type_is_the_routes() {
        let mut router = Router::default();
        router.css("/x.css", |ctx| async move {
            ctx.response().set_header("Cache-Control", "max-age=60");
            ctx.response().set_header("Content-Type", "text/plain");
            Ok("x{}")
        });

        let res = get(&router, "/x.css").await;
        assert_eq!(res.headers().get("cache-control"), Some("max-age=60"));
        assert_eq!(res.headers().get("content-type"), Some("text/css; charset=utf-8"));
    }

    // ── caching ───────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn cache_hit_bypasses_handler() {
        let (router, hits) = counting_router(1000);

        let first = get(&router, "/count/7").await;
        tokio::time::advance(Duration::from_millis(500)).await;
        let second = get(&router, "/count/7").await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(first.status(), StatusCode::Ok);
        assert_eq!(second.status(), StatusCode::Ok);
        assert_eq!(first.body_ref(), second.body_ref());
        assert_eq!(
            second.headers().get("content-type"),
            Some("text/html; charset=utf-8")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cache_expires_after_ttl() {
        let (router, hits) = counting_router(1000);

        let first = get(&router, "/count/7").await;
        tokio::time::advance(Duration::from_millis(1000)).await;
        let second = get(&router, "/count/7").await;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(body(&first), "<!DOCTYPE html><p>7 #1</p>");
        assert_eq!(body(&second), "<!DOCTYPE html><p>7 #2</p>");
    }

    #[tokio::test(start_paused = true)]
    async fn cached_html_is_not_prefixed_twice() {
        let mut router = Router::default();
        router.html(RouteOptions::new("/").ttl_ms(1000), |_ctx| async { Ok("<p>hi</p>") });

        let miss = get(&router, "/").await;
        let hit = get(&router, "/").await;
        assert_eq!(body(&miss), "<!DOCTYPE html><p>hi</p>");
        assert_eq!(body(&hit), "<!DOCTYPE html><p>hi</p>");
    }

    #[tokio::test(start_paused = true)]
    async fn cache_slots_are_per_parameter_value() {
        let (router, hits) = counting_router(1000);

        get(&router, "/count/1").await;
        get(&router, "/count/2").await;
        get(&router, "/count/1").await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn query_string_does_not_split_cache_slots() {
        let (router, hits) = counting_router(1000);

        let a = get(&router, "/count/1?v=a").await;
        let b = get(&router, "/count/1?v=b").await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(a.body_ref(), b.body_ref());
    }

    #[tokio::test(start_paused = true)]
    async fn dot_segments_resolve_before_matching_and_caching() {
        let (router, hits) = counting_router(1000);

        let dotted = get(&router, "/x/../count/7").await;
        let plain = get(&router, "/count/./7").await;
        assert_eq!(dotted.status(), StatusCode::Ok);
        assert_eq!(body(&dotted), "<!DOCTYPE html><p>7 #1</p>");
        assert_eq!(plain.body_ref(), dotted.body_ref());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn uncached_route_renders_every_time() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let mut router = Router::default();
        router.js("/live.js", move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok("tick()") }
        });

        get(&router, "/live.js").await;
        get(&router, "/live.js").await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_hit_skips_handler_headers() {
        let mut router = Router::default();
        router.html(RouteOptions::new("/").ttl_ms(1000), |ctx| async move {
            ctx.response().append_header("X-Rendered", "yes");
            Ok("<p>hi</p>")
        });

        let miss = get(&router, "/").await;
        let hit = get(&router, "/").await;
        assert_eq!(miss.headers().get("x-rendered"), Some("yes"));
        assert_eq!(hit.headers().get("x-rendered"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_render_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut router = Router::default();
        router.html(RouteOptions::new("/flaky").ttl_ms(1000), move |_ctx| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(BoxError::from("cold start"))
                } else {
                    Ok("<p>warm</p>")
                }
            }
        });

        assert_eq!(get(&router, "/flaky").await.status(), StatusCode::InternalServerError);
        assert_eq!(get(&router, "/flaky").await.status(), StatusCode::Ok);
        assert_eq!(get(&router, "/flaky").await.status(), StatusCode::Ok);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    // ── fallbacks ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn not_found_without_hook() {
        let mut router = Router::default();
        router.html("/home", |_ctx| async { Ok("home") });

        let res = get(&router, "/missing").await;
        assert_eq!(res.status(), StatusCode::NotFound);
        assert_eq!(body(&res), "NOT_FOUND");
    }

    #[tokio::test]
    async fn not_found_hook_renders_html_without_preamble() {
        let mut router = Router::default();
        router.not_found(|ctx| async move {
            assert!(ctx.params().is_empty());
            Ok(format!("<h1>No page at {}</h1>", ctx.request().path()))
        });

        let res = get(&router, "/nowhere").await;
        assert_eq!(res.status(), StatusCode::NotFound);
        assert_eq!(res.headers().get("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(body(&res), "<h1>No page at /nowhere</h1>");
    }

    #[tokio::test]
    async fn failing_handler_without_hook() {
        let mut router = Router::default();
        router.html("/boom", failing);

        let res = get(&router, "/boom").await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        assert_eq!(body(&res), "INTERNAL_ERROR");
        assert!(res.is_keep_alive());
    }

    #[tokio::test]
    async fn failing_handler_with_hook() {
        let mut router = Router::default();
        router.html("/boom", failing);
        router.on_error(|ctx, err| async move {
            assert!(ctx.params().is_empty());
            Ok(format!("<h1>Oops</h1><p>{err}</p>"))
        });

        let res = get(&router, "/boom").await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        assert_eq!(res.headers().get("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(
            body(&res),
            "<h1>Oops</h1><p>handler failed: database unavailable</p>"
        );
    }

    #[tokio::test]
    async fn panicking_handler_takes_error_path() {
        let mut router = Router::default();
        router.html("/panic", panicking);
        router.on_error(|_ctx, err| async move {
            let panicked = matches!(err, HandlerError::Panicked(ref m) if m == "template exploded");
            Ok(format!("panicked={panicked}"))
        });

        let res = get(&router, "/panic").await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        assert_eq!(body(&res), "panicked=true");
    }

    #[tokio::test]
    async fn handler_panicking_before_its_future_takes_error_path() {
        let mut router = Router::default();
        router.html("/explode", exploding);
        router.on_error(|_ctx, err| async move {
            let panicked = matches!(err, HandlerError::Panicked(ref m) if m == "exploded before rendering");
            Ok(format!("panicked={panicked}"))
        });

        let res = get(&router, "/explode").await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        assert_eq!(body(&res), "panicked=true");
    }

    #[tokio::test]
    async fn handler_panicking_before_its_future_without_hook() {
        let mut router = Router::default();
        router.html("/explode", exploding);

        let res = get(&router, "/explode").await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        assert_eq!(body(&res), "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn not_found_hook_panicking_before_its_future_goes_to_error_hook() {
        let mut router = Router::default();
        router.not_found(exploding);
        router.on_error(|_ctx, _err| async { Ok("<p>error page</p>") });

        let res = get(&router, "/missing").await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        assert_eq!(body(&res), "<p>error page</p>");
    }

    #[tokio::test]
    async fn error_hook_panicking_before_its_future_still_responds() {
        let mut router = Router::default();
        router.html("/boom", failing);
        router.on_error(|_ctx, _err| -> std::future::Ready<Result<String, BoxError>> {
            panic!("error page exploded")
        });

        let res = get(&router, "/boom").await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        assert!(res.body_ref().is_empty());
        assert!(!res.is_keep_alive());
    }

    #[tokio::test]
    async fn failing_not_found_hook_goes_to_error_hook() {
        let mut router = Router::default();
        router.not_found(failing);
        router.on_error(|_ctx, _err| async { Ok("<p>error page</p>") });

        let res = get(&router, "/missing").await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        assert_eq!(body(&res), "<p>error page</p>");
    }

    #[tokio::test]
    async fn failing_error_hook_is_not_recovered() {
        let mut router = Router::default();
        router.html("/boom", failing);
        router.on_error(|_ctx, _err| async { Err::<String, _>(BoxError::from("hook broke")) });

        let res = get(&router, "/boom").await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        assert!(res.body_ref().is_empty());
        assert!(!res.is_keep_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out() {
        let mut router = Router::default();
        router.handler_timeout(Duration::from_secs(1));
        router.html("/slow", |_ctx| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("late")
        });
        router.on_error(|_ctx, err| async move {
            Ok(match err {
                HandlerError::TimedOut(limit) => format!("timed out after {}s", limit.as_secs()),
                other => other.to_string(),
            })
        });

        let res = get(&router, "/slow").await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        assert_eq!(body(&res), "timed out after 1s");
    }

    // ── method restriction ────────────────────────────────────────────────────

    #[tokio::test]
    async fn non_get_methods_are_rejected() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let mut router = Router::default();
        router.html("/form", move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok("form") }
        });

        for method in ["POST", "HEAD", "PUT", "DELETE", "BREW"] {
            let res = router.dispatch(make_request(method, "/form")).await;
            assert_eq!(res.status(), StatusCode::MethodNotAllowed, "{method}");
            assert_eq!(body(&res), "METHOD_NOT_ALLOWED");
        }

        let res = router.dispatch(make_request("POST", "/unregistered")).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
