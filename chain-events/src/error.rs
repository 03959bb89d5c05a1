use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum Error {
    #[error("Middleware error {0}")]
    Middleware(String),

    #[error("{method} timed out after {timeout:?}")]
    Timeout {
        method: &'static str,
        timeout: Duration,
    },

    #[error("Malformed log: {0}")]
    MalformedLog(String),
}

impl Error {
    /// Is this error worth retrying the same request for.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Middleware(_) | Error::Timeout { .. } => true,
            Error::MalformedLog(_) => false,
        }
    }
}

/// The crate result type.
pub type Result<T> = std::result::Result<T, Error>;
