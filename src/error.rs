//! Error types
//!
//! One error channel for the whole dispatch core: handler failures,
//! continuation-signaled failures, rendering/configuration problems and I/O.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A continuation was failed with a plain string or a non-error value
    #[error("{0}")]
    Value(String),

    /// An error that carries the HTTP status the entry handler should answer with
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Any other failure raised by a handler
    #[error(transparent)]
    Handler(Box<dyn std::error::Error + Send + Sync>),

    #[error("no application is active for this response")]
    NoApplicationActive,

    #[error("unsupported view engine: {0}")]
    UnsupportedViewEngine(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("response already finished")]
    ResponseFinished,

    #[error("invalid request body: {0}")]
    Body(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ::config::ConfigError),

    #[error("logger initialization failed: {0}")]
    Logger(String),
}

impl Error {
    /// Wrap an arbitrary error raised by a handler
    pub fn handler<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Handler(Box::new(err))
    }

    /// Build an error that maps to a specific HTTP status
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Status code used when this error escapes to the application boundary
    pub const fn status(&self) -> u16 {
        match self {
            Self::Http { status, .. } => *status,
            Self::Body(_) | Self::Json(_) => 400,
            _ => 500,
        }
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}
