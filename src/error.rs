//! Crate-level error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad command-line or config-file value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A backend could not open a playback stream.
    #[error("{backend}: {message}")]
    BackendOpen {
        backend: &'static str,
        message: String,
    },

    /// Every backend in the probe order failed.
    #[error("no usable audio backend")]
    NoBackend,
}

impl Error {
    pub(crate) fn backend(backend: &'static str, err: impl std::fmt::Display) -> Self {
        Error::BackendOpen {
            backend,
            message: err.to_string(),
        }
    }
}
