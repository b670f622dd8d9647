use serde::{Deserialize, Serialize};

/// Interpretation of the `status` returned by upload init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    /// The account already holds identical content; nothing to transfer.
    InstantComplete,
    /// The service wants the digest of the range in `sign_check`.
    NeedsChallenge(i64),
    /// New content; request an upload token and transfer.
    NeedsToken(i64),
    /// Accepted but not finished server-side; proceeds like `NeedsToken`.
    Pending(i64),
    /// A code outside every configured set.
    Unknown(i64),
}

/// Maps remote status codes to [`InitStatus`].
///
/// The code sets are data, not logic: a provider adding a new challenge
/// code only needs a config change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusTable {
    pub instant: Vec<i64>,
    pub challenge: Vec<i64>,
    pub token: Vec<i64>,
    pub pending: Vec<i64>,
}

impl Default for StatusTable {
    fn default() -> Self {
        Self {
            instant: vec![2],
            challenge: vec![6, 7, 8],
            token: vec![1],
            pending: Vec::new(),
        }
    }
}

impl StatusTable {
    /// Classifies a raw status code.
    pub fn classify(&self, code: i64) -> InitStatus {
        if self.instant.contains(&code) {
            InitStatus::InstantComplete
        } else if self.challenge.contains(&code) {
            InitStatus::NeedsChallenge(code)
        } else if self.token.contains(&code) {
            InitStatus::NeedsToken(code)
        } else if self.pending.contains(&code) {
            InitStatus::Pending(code)
        } else {
            InitStatus::Unknown(code)
        }
    }
}
