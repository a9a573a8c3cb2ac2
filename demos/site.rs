//! Small demo site: cached pages, a stylesheet, and both fallback hooks.
//!
//! ```text
//! RUST_LOG=ssrkit=debug SSRKIT_PORT=8080 cargo run --example site
//! ```

use std::time::Duration;

use ssrkit::config::ServerConfig;
use ssrkit::markup::{Child, Element, Props, component, fragment, pending, render};
use ssrkit::{BoxError, Context, RouteOptions, Router};
use tracing_subscriber::EnvFilter;

struct Site {
    name: &'static str,
    posts: Vec<(&'static str, &'static str)>,
}

async fn layout(site: &Site, title: &str, body: Vec<Child>) -> String {
    let page = component(|props: Props, children: Vec<Child>| async move {
        let heading = props.value("heading").unwrap_or_default().to_owned();
        let inner = fragment(children).await;
        format!("<header><h1>{heading}</h1></header><main>{inner}</main>")
    });

    let head = Element::new("head")
        .child(Element::new("title").child(format!("{title} · {}", site.name)))
        .child(Element::new("link").attr("rel", "stylesheet").attr("href", "/site.css"));

    render(
        "html",
        Props::new().attr("lang", "en"),
        vec![
            head.into(),
            Element::new("body")
                .child(pending(render(page, Props::new().attr("heading", title), body)))
                .into(),
        ],
    )
    .await
}

async fn index(ctx: Context<Site>) -> Result<String, BoxError> {
    let items: Vec<Child> = ctx
        .state()
        .posts
        .iter()
        .map(|(slug, title)| {
            Element::new("li")
                .child(Element::new("a").attr("href", format!("/posts/{slug}")).child(*title))
                .into()
        })
        .collect();

    Ok(layout(ctx.state(), "Posts", vec![Element::new("ul").child(items).into()]).await)
}

async fn post(ctx: Context<Site>) -> Result<String, BoxError> {
    let slug = ctx.param("slug").unwrap_or_default();
    let (_, title) = ctx
        .state()
        .posts
        .iter()
        .find(|(s, _)| *s == slug)
        .ok_or_else(|| format!("no post named {slug:?}"))?;

    // Simulate a slow data source so the ttl is visible.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let body = Element::new("article").child(Element::new("p").child(format!("Body of {title}.")));
    Ok(layout(ctx.state(), title, vec![body.into()]).await)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::default().with_env_overrides()?;

    let mut router = Router::new(Site {
        name: "ssrkit demo",
        posts: vec![("hello", "Hello, world"), ("caching", "How the cache works")],
    });

    router.html(RouteOptions::new("/").ttl_ms(5_000), index);
    router.html(RouteOptions::new("/posts/:slug").ttl_ms(30_000), post);
    router.css(RouteOptions::new("/site.css").ttl(Duration::from_secs(3600)), |_ctx| async {
        Ok("body{font-family:sans-serif;max-width:40rem;margin:auto}")
    });

    router.not_found(|ctx| async move {
        Ok(format!("<h1>404</h1><p>No page at {}</p>", ctx.request().path()))
    });
    router.on_error(|_ctx, err| async move {
        Ok(format!("<h1>Something broke</h1><pre>{err}</pre>"))
    });

    router.listen_with(config).await?;
    Ok(())
}
