//! CLI error types.

use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The configuration file could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration is invalid or inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// A rule string is not one of the known rules.
    #[error("unknown rule '{rule}'")]
    UnknownRule { rule: String },

    /// No actor with this name is configured.
    #[error("no actor named '{name}'")]
    UnknownActor { name: String },

    /// An error occurred in the gate.
    #[error(transparent)]
    Gate(#[from] gate::Error),

    /// A response could not be rendered.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
