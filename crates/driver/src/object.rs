//! Objects handed out by the driver.

use std::any::Any;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use open115_protocol::FileInfo;

use crate::error::DriverError;

/// A file or folder as the host sees it.
///
/// Operations that need provider-specific data (pick code, parent id)
/// downcast through [`as_any`](Self::as_any) to [`Entry`] and fail with
/// [`DriverError::Conversion`] for anything else.
pub trait Object: Any + Send + Sync + std::fmt::Debug {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn size(&self) -> u64;
    fn is_dir(&self) -> bool;
    fn modified(&self) -> DateTime<Utc>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A listing entry produced by this driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: String,
    pub parent_id: String,
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    pub pick_code: String,
    pub sha1: String,
    pub modified: DateTime<Utc>,
    pub created: DateTime<Utc>,
}

impl Entry {
    /// A bare folder reference, e.g. the configured root.
    pub fn folder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: String::new(),
            name: String::new(),
            size: 0,
            is_dir: true,
            pick_code: String::new(),
            sha1: String::new(),
            modified: DateTime::<Utc>::UNIX_EPOCH,
            created: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

impl From<FileInfo> for Entry {
    fn from(info: FileInfo) -> Self {
        let is_dir = info.is_dir();
        Self {
            id: info.fid,
            parent_id: info.pid,
            name: info.name,
            size: u64::try_from(info.size).unwrap_or(0),
            is_dir,
            pick_code: info.pick_code,
            sha1: info.sha1,
            modified: timestamp(info.upt),
            created: timestamp(info.uppt),
        }
    }
}

impl Object for Entry {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }

    fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) fn as_entry(obj: &dyn Object) -> Result<&Entry, DriverError> {
    obj.as_any()
        .downcast_ref::<Entry>()
        .ok_or_else(|| DriverError::Conversion(format!("{} is not an open115 entry", obj.id())))
}

/// A resolved download location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    /// Headers the download request must carry.
    pub headers: BTreeMap<String, String>,
}

/// Account quota, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageDetails {
    pub total_space: u64,
    pub free_space: u64,
}

impl StorageDetails {
    pub fn used_space(&self) -> u64 {
        self.total_space.saturating_sub(self.free_space)
    }
}
