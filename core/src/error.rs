//! Error types for the fetcher engine.
//!
//! # Design
//! Validation failures (`ContextValidation`, `HeaderValidation`) happen before
//! an operation runs and always reach the caller directly. Everything raised
//! while the operation runs (transport, body, shape and operation errors) is
//! what the `on_error` hook gets to see.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::http::HttpMethod;

/// Boxed error carried by transport and operation failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type alias using `FetchError`.
pub type Result<T> = std::result::Result<T, FetchError>;

/// A value did not match the schema it was parsed against.
///
/// `path` points at the offending location inside the value, e.g.
/// `items[2].content`. It is empty when the root value itself was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl SchemaError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            path: String::new(),
            message: message.into(),
        }
    }

    /// Prefix the error path with an object field.
    pub fn at_field(mut self, field: &str) -> Self {
        self.path = if self.path.is_empty() {
            field.to_string()
        } else if self.path.starts_with('[') {
            format!("{field}{}", self.path)
        } else {
            format!("{field}.{}", self.path)
        };
        self
    }

    /// Prefix the error path with an array index.
    pub fn at_index(mut self, index: usize) -> Self {
        self.path = if self.path.is_empty() || self.path.starts_with('[') {
            format!("[{index}]{}", self.path)
        } else {
            format!("[{index}].{}", self.path)
        };
        self
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl StdError for SchemaError {}

/// Errors returned by composed fetchers and executors.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The raw context did not satisfy the client's context schema.
    #[error("invalid context: {0}")]
    ContextValidation(#[source] SchemaError),

    /// The raw headers did not satisfy the declared header shape.
    #[error("invalid headers: {0}")]
    HeaderValidation(#[source] SchemaError),

    /// The response body was valid JSON but did not match the declared schema.
    #[error("unexpected response shape from {method} {url} (HTTP {status}): {source}")]
    ResponseShape {
        method: HttpMethod,
        url: String,
        status: u16,
        #[source]
        source: SchemaError,
    },

    /// The response body could not be parsed as JSON.
    #[error("response body from {url} (HTTP {status}) is not JSON: {source}")]
    InvalidBody {
        url: String,
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    /// The request payload could not be serialized to JSON.
    #[error("request body serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transport could not complete the round-trip.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// Raised by the operation's own logic.
    #[error("operation failed: {0}")]
    Operation(#[source] BoxError),

    /// The fetcher was not registered with the composed client.
    #[error("fetcher `{0}` is not part of this client")]
    UnknownFetcher(String),

    /// The recovery hook produced a value of the wrong type for the fetcher.
    #[error("recovery hook for `{fetcher}` returned a value of the wrong type")]
    RecoveryTypeMismatch { fetcher: String },
}

impl FetchError {
    /// Wrap an error raised by operation logic, e.g. an expired-token signal.
    pub fn operation(err: impl Into<BoxError>) -> Self {
        FetchError::Operation(err.into())
    }

    pub fn transport(err: impl Into<BoxError>) -> Self {
        FetchError::Transport(err.into())
    }

    /// True for errors raised before the operation ran.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FetchError::ContextValidation(_) | FetchError::HeaderValidation(_)
        )
    }

    pub fn is_operation(&self) -> bool {
        matches!(self, FetchError::Operation(_))
    }

    /// Borrow the operation error as a concrete type, if it is one.
    pub fn operation_error<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            FetchError::Operation(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}
