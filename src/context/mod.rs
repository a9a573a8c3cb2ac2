//! Per-request context handed to route handlers and hooks.
//!
//! A [`Context`] bundles the parsed request, a [`ResponseHandle`] for extra
//! response headers, the path [`Parameters`] captured by the matcher, and the
//! application state the [`Router`](crate::router::Router) was built with.

use std::sync::{Arc, Mutex, PoisonError};

use crate::Request;
use crate::http::Headers;

/// Path parameters extracted from the matched route.
///
/// Keeps the order in which the matcher recorded them. Recording a name a
/// second time overwrites the value in its original position, so
/// `/:id/:id` against `/a/b` yields a single `id = "b"`.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    entries: Vec<(String, String)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` under `name`, overwriting an earlier value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` pairs in extraction order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Sink for response headers a handler wants to add.
///
/// The dispatcher owns the actual response; it drains this handle after the
/// handler returns. Headers set here never reach cached replays, and the
/// route's declared content type overrides any `content-type` set here.
#[derive(Clone, Default, Debug)]
pub struct ResponseHandle {
    headers: Arc<Mutex<Headers>>,
}

impl ResponseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header to the eventual response.
    pub fn append_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.lock().append(name, value);
    }

    /// Set a header on the eventual response, replacing earlier values.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.lock().set(name, value);
    }

    /// Take every header recorded so far, leaving the handle empty.
    pub fn take_headers(&self) -> Headers {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Headers> {
        // A panicking handler can poison the lock; the headers are still usable.
        self.headers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-request bundle passed to handlers, the not-found hook and the error hook.
pub struct Context<S> {
    request: Arc<Request>,
    response: ResponseHandle,
    params: Parameters,
    state: Arc<S>,
}

impl<S> Context<S> {
    pub fn new(
        request: Arc<Request>,
        response: ResponseHandle,
        params: Parameters,
        state: Arc<S>,
    ) -> Self {
        Self {
            request,
            response,
            params,
            state,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &ResponseHandle {
        &self.response
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Shorthand for `self.params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// The application state shared by every request.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// A clone of the shared state handle, for moving into spawned work.
    pub fn state_arc(&self) -> Arc<S> {
        Arc::clone(&self.state)
    }
}
