//! Async markup compositor.
//!
//! [`render`] turns a tag, its attributes and its children into one finished
//! string by depth-first concatenation. Children may be text, numbers, nested
//! lists, or still-pending futures; pending children are awaited in place and
//! lists are rendered concurrently, then joined in order.
//!
//! ```
//! use ssrkit::markup::{Child, Element, Props, pending, render};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let title = pending(async { "Posts" });
//! let items: Vec<Child> = ["one", "two"]
//!     .into_iter()
//!     .map(|t| Element::new("li").child(t).into())
//!     .collect();
//!
//! let html = render(
//!     "main",
//!     Props::new().attr("id", "feed").flag("hidden", false),
//!     vec![Element::new("h1").child(title).into(), Element::new("ul").child(items).into()],
//! )
//! .await;
//!
//! assert_eq!(html, r#"<main id="feed"><h1>Posts</h1><ul><li>one</li><li>two</li></ul></main>"#);
//! # }
//! ```
//!
//! Attribute values and text are emitted verbatim; callers escape untrusted input.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};

/// Anything that can sit between an element's tags.
pub enum Child {
    /// Renders as nothing (`null`, `false`, `true` and `None` all land here).
    Empty,
    Text(String),
    List(Vec<Child>),
    Pending(BoxFuture<'static, Child>),
}

impl fmt::Debug for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Wrap a future whose output becomes a child once awaited.
pub fn pending<F, C>(fut: F) -> Child
where
    F: Future<Output = C> + Send + 'static,
    C: Into<Child> + 'static,
{
    Child::Pending(fut.map(Into::into).boxed())
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Self::Empty
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

macro_rules! numeric_child {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Child {
            fn from(n: $ty) -> Self {
                Self::Text(n.to_string())
            }
        })*
    };
}

numeric_child!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Attr {
    /// Skipped entirely.
    Absent,
    /// `true` emits the bare name, `false` is skipped.
    Flag(bool),
    Value(String),
}

/// Ordered element attributes, or the props handed to a component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    attrs: Vec<(String, Attr)>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name="value"`.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.attrs.push((name.into(), Attr::Value(value.to_string())));
        self
    }

    /// Add a boolean attribute.
    #[must_use]
    pub fn flag(mut self, name: impl Into<String>, on: bool) -> Self {
        self.attrs.push((name.into(), Attr::Flag(on)));
        self
    }

    /// Add an attribute that may be missing.
    #[must_use]
    pub fn maybe(mut self, name: impl Into<String>, value: Option<impl fmt::Display>) -> Self {
        let value = value.map_or(Attr::Absent, |v| Attr::Value(v.to_string()));
        self.attrs.push((name.into(), value));
        self
    }

    /// Look an attribute up by name; components use this to read their props.
    pub fn get(&self, name: &str) -> Option<&Attr> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// The string value of `name`, if it is a plain value.
    pub fn value(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(Attr::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attr)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn write_attrs(&self, out: &mut String) {
        for (name, value) in &self.attrs {
            match value {
                Attr::Absent | Attr::Flag(false) => {}
                Attr::Flag(true) => {
                    out.push(' ');
                    out.push_str(name);
                }
                Attr::Value(v) => {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(v);
                    out.push('"');
                }
            }
        }
    }
}

/// A composition function: receives props and children, produces markup.
pub type Component = Arc<dyn Fn(Props, Vec<Child>) -> BoxFuture<'static, String> + Send + Sync>;

/// Make a [`Component`] from an async closure.
pub fn component<H, F>(f: H) -> Component
where
    H: Fn(Props, Vec<Child>) -> F + Send + Sync + 'static,
    F: Future<Output = String> + Send + 'static,
{
    Arc::new(move |props: Props, children: Vec<Child>| f(props, children).boxed())
}

/// What [`render`] renders: a plain element name or a component.
#[derive(Clone)]
pub enum Tag {
    Element(String),
    Component(Component),
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(name) => f.debug_tuple("Element").field(name).finish(),
            Self::Component(_) => f.write_str("Component(..)"),
        }
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Self::Element(name.to_owned())
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Self::Element(name)
    }
}

impl From<Component> for Tag {
    fn from(component: Component) -> Self {
        Self::Component(component)
    }
}

/// Render `tag` with `props` around `children`.
///
/// Components get the props and children untouched. Elements render their
/// children one after another, in order.
pub async fn render(tag: impl Into<Tag>, props: Props, children: Vec<Child>) -> String {
    let name = match tag.into() {
        Tag::Component(component) => return component(props, children).await,
        Tag::Element(name) => name,
    };

    let mut html = String::with_capacity(2 * name.len() + 5);
    html.push('<');
    html.push_str(&name);
    props.write_attrs(&mut html);
    html.push('>');

    for child in children {
        html.push_str(&render_child(child).await);
    }

    html.push_str("</");
    html.push_str(&name);
    html.push('>');
    html
}

/// Concatenate rendered children without a wrapping element.
pub async fn fragment(children: Vec<Child>) -> String {
    render_child(Child::List(children)).await
}

/// Render one child to a string.
pub fn render_child(child: Child) -> BoxFuture<'static, String> {
    async move {
        match child {
            Child::Empty => String::new(),
            Child::Text(text) => text,
            Child::Pending(fut) => render_child(fut.await).await,
            Child::List(items) => join_all(items.into_iter().map(render_child))
                .await
                .concat(),
        }
    }
    .boxed()
}

/// Builder for an element that renders lazily, usable directly as a [`Child`].
#[derive(Debug)]
pub struct Element {
    tag: Tag,
    props: Props,
    children: Vec<Child>,
}

impl Element {
    pub fn new(tag: impl Into<Tag>) -> Self {
        Self {
            tag: tag.into(),
            props: Props::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.props = self.props.attr(name, value);
        self
    }

    #[must_use]
    pub fn flag(mut self, name: impl Into<String>, on: bool) -> Self {
        self.props = self.props.flag(name, on);
        self
    }

    #[must_use]
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    pub async fn render(self) -> String {
        render(self.tag, self.props, self.children).await
    }
}

impl From<Element> for Child {
    fn from(element: Element) -> Self {
        pending(element.render())
    }
}
