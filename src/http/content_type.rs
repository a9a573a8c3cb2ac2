//! Declared response content types.

use std::fmt;

/// The document-type declaration prepended to every rendered HTML body.
pub const DOCTYPE: &str = "<!DOCTYPE html>";

/// The content type a route declares for its responses.
///
/// The three built-in groups carry a UTF-8 charset. Anything else is sent
/// verbatim through [`ContentType::Other`].
///
/// # Examples
///
/// ```
/// use ssrkit::http::ContentType;
///
/// assert_eq!(ContentType::Css.as_header(), "text/css; charset=utf-8");
/// assert!(ContentType::Html.wants_doctype());
/// assert!(!ContentType::Other("image/svg+xml".into()).wants_doctype());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentType {
    Html,
    Css,
    JavaScript,
    Other(String),
}

impl ContentType {
    /// The value written to the `Content-Type` header.
    pub fn as_header(&self) -> &str {
        match self {
            Self::Html => "text/html; charset=utf-8",
            Self::Css => "text/css; charset=utf-8",
            Self::JavaScript => "application/javascript; charset=utf-8",
            Self::Other(mime) => mime.as_str(),
        }
    }

    /// Whether rendered bodies of this type get the [`DOCTYPE`] preamble.
    pub fn wants_doctype(&self) -> bool {
        match self {
            Self::Html => true,
            Self::Css | Self::JavaScript | Self::Other(_) => false,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_header())
    }
}

impl From<&str> for ContentType {
    fn from(mime: &str) -> Self {
        Self::Other(mime.to_owned())
    }
}

impl From<String> for ContentType {
    fn from(mime: String) -> Self {
        Self::Other(mime)
    }
}
