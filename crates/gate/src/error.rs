//! Gate error types.

use crate::response::{Code, Response};
use thiserror::Error;

/// Message used when a denial carries no message of its own.
pub const DEFAULT_DENIAL_MESSAGE: &str = "This action is unauthorized.";

/// Gate errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A handler reference does not have a recognized callable shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A denial raised as an error.
///
/// Handlers may return one to signal denial; the gate converts it into the
/// equivalent deny [`Response`] everywhere except [`Gate::authorize`], which
/// produces one from a denying response.
///
/// [`Gate::authorize`]: crate::Gate::authorize
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct AuthorizationFailure {
    message: String,
    code: Code,
    response: Option<Response>,
}

impl AuthorizationFailure {
    pub fn new(message: impl Into<String>, code: impl Into<Code>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            response: None,
        }
    }

    /// Build the failure for a denying response, filling in the default
    /// message and a zero code where the response has none.
    pub fn from_response(response: Response) -> Self {
        Self {
            message: response
                .message()
                .unwrap_or(DEFAULT_DENIAL_MESSAGE)
                .to_string(),
            code: response.code().cloned().unwrap_or_default(),
            response: Some(response),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> &Code {
        &self.code
    }

    /// The response this failure was raised for, if any.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Convert back into a deny response carrying the same message and code.
    pub fn into_response(self) -> Response {
        match self.response {
            Some(response) => response,
            None => Response::deny()
                .with_message(self.message)
                .with_code(self.code),
        }
    }
}

impl Default for AuthorizationFailure {
    fn default() -> Self {
        Self::new(DEFAULT_DENIAL_MESSAGE, Code::default())
    }
}
