//! Allow/deny responses.

use crate::error::AuthorizationFailure;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable code attached to a response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Code {
    Int(i64),
    Str(String),
}

impl Default for Code {
    fn default() -> Self {
        Code::Int(0)
    }
}

impl From<i64> for Code {
    fn from(code: i64) -> Self {
        Code::Int(code)
    }
}

impl From<i32> for Code {
    fn from(code: i32) -> Self {
        Code::Int(code.into())
    }
}

impl From<&str> for Code {
    fn from(code: &str) -> Self {
        Code::Str(code.to_string())
    }
}

impl From<String> for Code {
    fn from(code: String) -> Self {
        Code::Str(code)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::Int(code) => write!(f, "{code}"),
            Code::Str(code) => f.write_str(code),
        }
    }
}

/// The outcome of an authorization check.
///
/// Responses are immutable; the `with_*` builders return a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<Code>,
}

impl Response {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            message: None,
            code: None,
        }
    }

    pub fn deny() -> Self {
        Self {
            allowed: false,
            message: None,
            code: None,
        }
    }

    pub fn with_message(self, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..self
        }
    }

    pub fn with_code(self, code: impl Into<Code>) -> Self {
        Self {
            code: Some(code.into()),
            ..self
        }
    }

    pub fn allowed(&self) -> bool {
        self.allowed
    }

    pub fn denied(&self) -> bool {
        !self.allowed
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn code(&self) -> Option<&Code> {
        self.code.as_ref()
    }

    /// Return the response when allowed, or the matching failure when denied.
    pub fn authorize(self) -> Result<Self, AuthorizationFailure> {
        if self.allowed {
            Ok(self)
        } else {
            Err(AuthorizationFailure::from_response(self))
        }
    }
}

impl From<bool> for Response {
    fn from(allowed: bool) -> Self {
        if allowed { Self::allow() } else { Self::deny() }
    }
}
