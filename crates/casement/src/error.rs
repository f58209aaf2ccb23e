use std::time::Duration;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A failure reported by the native windowing library.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The native window or renderer could not be created. Only the caller
    /// that asked for the window sees this; the loop keeps serving others.
    #[error("window initialization failed: {0}")]
    Init(#[source] BackendError),

    /// The native library could not be brought up on the loop thread.
    #[error("backend startup failed: {0}")]
    Backend(#[source] BackendError),

    #[error("window loop did not answer within {0:?}")]
    Timeout(Duration),

    #[error("window loop has shut down")]
    Disconnected,

    #[error("failed to spawn window loop thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}
