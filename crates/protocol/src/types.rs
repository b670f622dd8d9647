use serde::{Deserialize, Serialize};

use crate::constants::CATEGORY_FOLDER;

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileInfo {
    /// Entry id.
    #[serde(default, with = "crate::flex::string")]
    pub fid: String,
    /// Parent folder id.
    #[serde(default, with = "crate::flex::string")]
    pub pid: String,
    /// Category: `"0"` folder, `"1"` file.
    #[serde(default, with = "crate::flex::string")]
    pub fc: String,
    #[serde(rename = "fn", default)]
    pub name: String,
    #[serde(rename = "fs", default, with = "crate::flex::int")]
    pub size: i64,
    #[serde(rename = "pc", default)]
    pub pick_code: String,
    #[serde(default)]
    pub sha1: String,
    /// Modified time (unix seconds).
    #[serde(default, with = "crate::flex::int")]
    pub upt: i64,
    /// Modified time as reported by the editor (unix seconds).
    #[serde(default, with = "crate::flex::int")]
    pub uet: i64,
    /// Upload time (unix seconds).
    #[serde(default, with = "crate::flex::int")]
    pub uppt: i64,
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.fc == CATEGORY_FOLDER
    }
}

/// A byte amount as reported by `user/info`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpaceAmount {
    /// Raw value; sometimes a number, sometimes a decimal string.
    #[serde(default)]
    pub size: serde_json::Value,
    #[serde(default)]
    pub size_format: String,
}

impl SpaceAmount {
    /// Parses `size` as a byte count.
    pub fn bytes(&self) -> Option<i64> {
        match &self.size {
            serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpaceInfo {
    #[serde(default)]
    pub all_total: SpaceAmount,
    #[serde(default)]
    pub all_remain: SpaceAmount,
    #[serde(default)]
    pub all_use: SpaceAmount,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, with = "crate::flex::string")]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub rt_space_info: SpaceInfo,
}

/// An offline (cloud-side) download task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OfflineTask {
    #[serde(default)]
    pub info_hash: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, with = "crate::flex::int")]
    pub size: i64,
    #[serde(default)]
    pub url: String,
    #[serde(default, with = "crate::flex::int")]
    pub add_time: i64,
    #[serde(default, with = "crate::flex::int")]
    pub last_update: i64,
    /// Completion percentage.
    #[serde(rename = "percentDone", default)]
    pub percent_done: f64,
    /// `-1` failed, `0` queued, `1` downloading, `2` done.
    #[serde(default, with = "crate::flex::int")]
    pub status: i64,
    #[serde(default, with = "crate::flex::string")]
    pub file_id: String,
    #[serde(default, with = "crate::flex::string")]
    pub wp_path_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OfflineTaskList {
    #[serde(default, with = "crate::flex::int")]
    pub page: i64,
    #[serde(default, with = "crate::flex::int")]
    pub page_count: i64,
    #[serde(default, with = "crate::flex::int")]
    pub count: i64,
    #[serde(default)]
    pub tasks: Vec<OfflineTask>,
}
