use serde::{Deserialize, Serialize};

/// Status fields shared by every API response.
///
/// The payload sits next to these fields (usually under `data`, but the
/// listing endpoint also puts `count` at the top level), so callers check
/// the envelope first and then deserialize the same body into the payload type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, with = "crate::flex::boolean")]
    pub state: bool,
    #[serde(default, with = "crate::flex::int")]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// A failure reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("remote error {code}: {message}")]
pub struct ApiError {
    pub code: i64,
    pub message: String,
}

impl Envelope {
    /// Converts a failed envelope into an [`ApiError`].
    pub fn check(&self) -> Result<(), ApiError> {
        if self.state {
            Ok(())
        } else {
            Err(ApiError {
                code: self.code,
                message: if self.message.is_empty() {
                    "request failed".into()
                } else {
                    self.message.clone()
                },
            })
        }
    }
}

/// Response shape of endpoints that wrap their payload in `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}
