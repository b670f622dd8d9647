//! Driver error types.

use open115_transfer::TransferError;

/// Errors produced by driver operations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Local read, write or hash failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The provider reported a failure. `code` is 0 when it gave none.
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    /// A response that is malformed or violates the upload handshake.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("cancelled")]
    Cancelled,

    /// An object that was not produced by this driver.
    #[error("conversion error: {0}")]
    Conversion(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DriverError {
    pub(crate) fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            code: 0,
            message: message.into(),
        }
    }

    /// Whether a part upload failing with this error may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Remote { .. })
    }
}

impl From<TransferError> for DriverError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Io(e) => Self::Io(e),
            TransferError::Cancelled => Self::Cancelled,
            e @ TransferError::RangeOutOfBounds { .. } => Self::Protocol(e.to_string()),
        }
    }
}

impl From<open115_client::Error> for DriverError {
    fn from(e: open115_client::Error) -> Self {
        use open115_client::Error as E;
        match e {
            E::Api { code, message } => Self::Remote { code, message },
            E::Status { status, body } => Self::Remote {
                code: i64::from(status),
                message: body,
            },
            other => Self::remote(other.to_string()),
        }
    }
}
