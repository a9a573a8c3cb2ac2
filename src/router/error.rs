use std::any::Any;
use std::time::Duration;

use thiserror::Error;

/// Boxed error type handlers return, so `?` works on any error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failure while producing a body: in a route handler, the not-found hook,
/// or the error hook itself.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(#[source] BoxError),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("handler timed out after {0:?}")]
    TimedOut(Duration),
}

impl HandlerError {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        Self::Panicked(message)
    }
}

impl From<BoxError> for HandlerError {
    fn from(source: BoxError) -> Self {
        Self::Failed(source)
    }
}
