//! Segmented path patterns and request-path matching.
//!
//! | Pattern              | Example match        | Captured params             |
//! |----------------------|----------------------|-----------------------------|
//! | `/about`             | `/about`, `/about/`  | *(none)*                    |
//! | `/users/:id`         | `/users/42`          | `id → "42"`                 |
//! | `/users/:id/:action` | `/users/42/edit`     | `id → "42"`, `action → "edit"` |
//!
//! Patterns and request paths are split on `/` with empty segments dropped,
//! so leading, trailing and repeated slashes never matter for matching.

use crate::context::Parameters;

/// Marks a pattern segment as a named parameter.
pub const PARAM_MARKER: char = ':';

// A single pattern segment, either a literal token or a named capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Static(String),
    Parameter(String),
}

/// A compiled route pattern with a fixed segment count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile a pattern string such as `"/users/:id"`.
    ///
    /// No validation is done on parameter names: `/:` declares a parameter
    /// with an empty name and a repeated name is allowed (the last capture wins).
    pub fn parse(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .map(|s| match s.strip_prefix(PARAM_MARKER) {
                Some(name) => Segment::Parameter(name.to_owned()),
                None => Segment::Static(s.to_owned()),
            })
            .collect();
        Self { segments }
    }

    /// Number of segments a request path must have to match.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// `true` for the root pattern `/`.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Match already-split request segments, returning the captured parameters.
    pub fn matches(&self, path_segments: &[&str]) -> Option<Parameters> {
        if self.segments.len() != path_segments.len() {
            return None;
        }

        let mut params = Parameters::new();
        for (seg, path_seg) in self.segments.iter().zip(path_segments) {
            match seg {
                Segment::Static(literal) => {
                    if literal != path_seg {
                        return None;
                    }
                }
                Segment::Parameter(name) => params.insert(name.as_str(), *path_seg),
            }
        }
        Some(params)
    }

    #[cfg(test)]
    fn matches_path(&self, path: &str) -> Option<Parameters> {
        let segments: Vec<&str> = split_path(path).collect();
        self.matches(&segments)
    }
}

/// Split a path on `/`, discarding empty segments.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
