//! Per-route response cache with lazy time-to-live expiry.
//!
//! Each cached route owns one [`RouteCache`]. Entries are keyed by
//! [`cache_key`], hold the final response body, and stay valid while the
//! current instant is strictly before their expiry. Stale entries are never
//! swept; they sit in the table until the next [`RouteCache::store`] for the
//! same key overwrites them. There is no size bound.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::context::Parameters;

/// A rendered body and the instant it stops being served.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    body: String,
    expires_at: Instant,
}

impl CacheEntry {
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Valid only while `now` is strictly before the expiry instant.
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// The cache table of a single route.
///
/// Guarded by its own mutex, which is never held across an `.await`.
#[derive(Debug)]
pub struct RouteCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl RouteCache {
    /// Creates an empty table whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached body for `key` if it has not expired yet.
    pub fn lookup(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.lock()
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.body.clone())
    }

    /// Returns a copy of the entry held for `key`, stale or not.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.lock().get(key).cloned()
    }

    /// Stores `body` under `key`, unconditionally replacing any previous entry.
    pub fn store(&self, key: impl Into<String>, body: impl Into<String>) {
        let entry = CacheEntry {
            body: body.into(),
            expires_at: Instant::now() + self.ttl,
        };
        self.lock().insert(key.into(), entry);
    }

    /// Number of entries held, stale ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Derives the cache key for a concrete request path and its parameters.
///
/// The format is `path?name1=val1&name2=val2`, with parameters in extraction
/// order. A route without parameters still gets the trailing `?`.
///
/// # Examples
///
/// ```
/// use ssrkit::cache::cache_key;
/// use ssrkit::context::Parameters;
///
/// let mut params = Parameters::new();
/// params.insert("id", "42");
/// params.insert("action", "edit");
/// assert_eq!(cache_key("/users/42/edit", &params), "/users/42/edit?id=42&action=edit");
/// assert_eq!(cache_key("/about", &Parameters::new()), "/about?");
/// ```
pub fn cache_key(path: &str, params: &Parameters) -> String {
    let mut key = String::with_capacity(path.len() + 1 + params.len() * 8);
    key.push_str(path);
    key.push('?');
    for (i, (name, value)) in params.iter().enumerate() {
        if i > 0 {
            key.push('&');
        }
        let _ = write!(key, "{name}={value}");
    }
    key
}
