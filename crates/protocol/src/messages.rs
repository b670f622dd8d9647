use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::FileInfo;

// ---------------------------------------------------------------------------
// Listing and entry operations
// ---------------------------------------------------------------------------

/// Query of `GET /open/ufile/files`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetFilesRequest {
    pub cid: String,
    pub limit: i64,
    pub offset: i64,
    #[serde(serialize_with = "flag")]
    pub asc: bool,
    /// Sort field (`file_name`, `file_size`, `user_utime`, `file_type`).
    pub o: String,
    #[serde(serialize_with = "flag")]
    pub show_dir: bool,
}

/// One page of a folder listing.
///
/// `count` is the total number of entries in the folder, not in this page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetFilesResponse {
    #[serde(default)]
    pub data: Vec<FileInfo>,
    #[serde(default, with = "crate::flex::int")]
    pub count: i64,
}

/// Form of `POST /open/folder/add`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MkdirRequest {
    pub pid: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MkdirResponse {
    #[serde(default)]
    pub file_name: String,
    #[serde(default, with = "crate::flex::string")]
    pub file_id: String,
}

/// Form of `POST /open/ufile/move`. `file_ids` is comma separated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveRequest {
    pub file_ids: String,
    pub to_cid: String,
}

/// Form of `POST /open/ufile/copy`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopyRequest {
    pub pid: String,
    pub file_id: String,
    /// `"1"` refuses to create a renamed duplicate in the target.
    pub nodupli: String,
}

/// Form of `POST /open/ufile/update`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateFileRequest {
    pub file_id: String,
    pub file_name: String,
}

/// Form of `POST /open/ufile/delete`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteFileRequest {
    pub file_ids: String,
    pub parent_id: String,
}

/// Form of `POST /open/ufile/downurl`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownUrlRequest {
    pub pick_code: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DownUrl {
    #[serde(default)]
    pub url: String,
}

/// A resolved download link, keyed by file id in [`DownUrlResponse`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DownUrlEntry {
    #[serde(default)]
    pub file_name: String,
    #[serde(default, with = "crate::flex::int")]
    pub file_size: i64,
    #[serde(default)]
    pub pick_code: String,
    #[serde(default)]
    pub sha1: String,
    #[serde(default)]
    pub url: DownUrl,
}

pub type DownUrlResponse = HashMap<String, DownUrlEntry>;

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Form of `POST /open/upload/init`.
///
/// Digests are upper-case hex. The second round repeats every field of the
/// first and adds `sign_key`/`sign_val`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadInitRequest {
    pub file_name: String,
    pub file_size: u64,
    pub target: String,
    #[serde(rename = "fileid")]
    pub file_id: String,
    #[serde(rename = "preid")]
    pub pre_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_val: Option<String>,
}

impl UploadInitRequest {
    /// Builds the challenge round from the first round's claims.
    pub fn with_challenge(&self, sign_key: impl Into<String>, sign_val: impl Into<String>) -> Self {
        Self {
            sign_key: Some(sign_key.into()),
            sign_val: Some(sign_val.into()),
            ..self.clone()
        }
    }
}

/// OSS completion callback attached to an init response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CallbackInfo {
    #[serde(default)]
    pub callback: String,
    #[serde(default)]
    pub callback_var: String,
}

impl CallbackInfo {
    /// Returns the `x-oss-callback` and `x-oss-callback-var` header values.
    pub fn encoded_headers(&self) -> (String, String) {
        use base64::{Engine, engine::general_purpose::STANDARD};
        (
            STANDARD.encode(self.callback.as_bytes()),
            STANDARD.encode(self.callback_var.as_bytes()),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.callback.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct UploadInitResponse {
    #[serde(default)]
    pub pick_code: String,
    #[serde(default, with = "crate::flex::int")]
    pub status: i64,
    #[serde(default)]
    pub sign_key: String,
    /// Inclusive decimal byte range, `"start-end"`.
    #[serde(default)]
    pub sign_check: String,
    #[serde(default, with = "crate::flex::string")]
    pub file_id: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub object: String,
    #[serde(default, deserialize_with = "lenient_callback")]
    pub callback: CallbackInfo,
}

/// Short-lived STS credentials from `GET /open/upload/get_token`.
#[derive(Clone, PartialEq, Deserialize)]
pub struct UploadToken {
    #[serde(default)]
    pub endpoint: String,
    #[serde(rename = "AccessKeyId", default)]
    pub access_key_id: String,
    #[serde(rename = "AccessKeySecret", default)]
    pub access_key_secret: String,
    #[serde(rename = "SecurityToken", default)]
    pub security_token: String,
    #[serde(rename = "Expiration", default)]
    pub expiration: String,
}

impl std::fmt::Debug for UploadToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadToken")
            .field("endpoint", &self.endpoint)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Form of `POST /open/refreshToken` on the passport host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Clone, PartialEq, Deserialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, with = "crate::flex::int")]
    pub expires_in: i64,
}

impl std::fmt::Debug for RefreshTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenResponse")
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Offline tasks
// ---------------------------------------------------------------------------

/// Form of `POST /open/offline/add_task_urls`. `urls` is newline separated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddOfflineTaskRequest {
    pub urls: String,
    pub wp_path_id: String,
}

/// Per-URL outcome of an offline task submission.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddOfflineTaskResult {
    #[serde(default, with = "crate::flex::boolean")]
    pub state: bool,
    #[serde(default, with = "crate::flex::int")]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub info_hash: String,
    #[serde(default)]
    pub url: String,
}

/// Form of `POST /open/offline/del_task`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteOfflineTaskRequest {
    pub info_hash: String,
    #[serde(serialize_with = "flag")]
    pub del_source_file: bool,
}

/// Query of `GET /open/offline/get_task_list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfflineTaskListRequest {
    pub page: i64,
}

/// Booleans go over the wire as `1`/`0`.
fn flag<S: serde::Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

/// The init endpoint sends `[]` instead of an object when there is no callback.
fn lenient_callback<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<CallbackInfo, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Object(_) => {
            serde_json::from_value(value).map_err(serde::de::Error::custom)
        }
        _ => Ok(CallbackInfo::default()),
    }
}
