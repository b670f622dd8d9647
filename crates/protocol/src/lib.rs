//! Wire types for the 115 open platform API.
//!
//! Everything here is plain serde data: request forms, response payloads
//! and the status-code tables the upload handshake is driven by. No I/O.

pub mod constants;
pub mod envelope;
pub mod flex;
pub mod messages;
pub mod status;
pub mod types;

// Re-export primary types for convenience.
pub use envelope::{ApiError, Envelope};
pub use messages::{
    CallbackInfo, GetFilesRequest, GetFilesResponse, UploadInitRequest, UploadInitResponse,
    UploadToken,
};
pub use status::{InitStatus, StatusTable};
pub use types::{FileInfo, OfflineTask, OfflineTaskList, SpaceInfo, UserInfo};
