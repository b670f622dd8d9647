//! The storage driver facade.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use open115_client::{Client, TokenPair};
use open115_protocol::constants::DEFAULT_USER_AGENT;
use open115_protocol::messages::{CopyRequest, DeleteFileRequest, MoveRequest, UpdateFileRequest};
use open115_protocol::types::SpaceAmount;
use open115_protocol::{GetFilesRequest, OfflineTaskList, SpaceInfo};
use open115_transfer::{ProgressReporter, UploadSource};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::account::Account;
use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::executor::TransferExecutor;
use crate::limiter::RateLimiter;
use crate::negotiator::{Negotiator, UploadOutcome};
use crate::object::{Entry, Link, Object, StorageDetails, as_entry};
use crate::remote::{RemoteApi, Session};

/// One initialized account.
///
/// Every operation takes a [`CancellationToken`] and makes each of its
/// remote calls behind the shared [`RateLimiter`].
pub struct Open115 {
    account: Arc<Account>,
    remote: Arc<dyn RemoteApi>,
    limiter: RateLimiter,
    config: DriverConfig,
    executor: TransferExecutor,
}

impl Open115 {
    /// Builds an HTTP client from the account tokens and validates them.
    ///
    /// Rotated tokens are written back through the account.
    pub async fn init(account: Arc<Account>, cancel: &CancellationToken) -> Result<Self, DriverError> {
        let config = account.config().normalized()?;
        let rotated = Arc::clone(&account);
        let client = Client::new(TokenPair::new(config.access_token, config.refresh_token))?
            .with_on_refresh(move |tokens| rotated.update_tokens(tokens));
        Self::with_remote(account, Arc::new(client), cancel).await
    }

    /// Like [`init`](Self::init) with a caller-supplied remote.
    pub async fn with_remote(
        account: Arc<Account>,
        remote: Arc<dyn RemoteApi>,
        cancel: &CancellationToken,
    ) -> Result<Self, DriverError> {
        let config = account.config().normalized()?;
        let driver = Self {
            limiter: RateLimiter::new(config.limit_rate),
            executor: TransferExecutor::new(config.part_retry.clone(), config.part_concurrency),
            account,
            remote,
            config,
        };
        let user = driver.session(cancel).call(|r| r.user_info()).await?;
        info!(
            account = %driver.account.id(),
            user_id = %user.user_id,
            rate_limited = driver.limiter.is_enabled(),
            "driver initialized"
        );
        Ok(driver)
    }

    /// Releases the driver. There is nothing to tear down remotely.
    pub async fn close(self) -> Result<(), DriverError> {
        debug!(account = %self.account.id(), "driver closed");
        Ok(())
    }

    pub fn account(&self) -> &Arc<Account> {
        &self.account
    }

    /// Effective settings after normalization.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// The configured root folder.
    pub fn root(&self) -> Entry {
        Entry::folder(self.config.root_folder_id.clone())
    }

    fn session<'a>(&'a self, cancel: &'a CancellationToken) -> Session<'a> {
        Session {
            remote: self.remote.as_ref(),
            limiter: &self.limiter,
            cancel,
        }
    }

    /// Lists every entry of `dir`, following pagination.
    pub async fn list(&self, dir: &dyn Object, cancel: &CancellationToken) -> Result<Vec<Entry>, DriverError> {
        let session = self.session(cancel);
        let mut entries = Vec::new();
        let mut offset = 0;
        loop {
            let req = GetFilesRequest {
                cid: dir.id().to_string(),
                limit: self.config.page_size,
                offset,
                asc: self.config.ascending(),
                o: self.config.order_by.clone(),
                show_dir: true,
            };
            let page = session.call(|r| r.get_files(&req)).await?;
            let fetched = page.data.len();
            entries.extend(page.data.into_iter().map(Entry::from));
            debug!(dir = %dir.id(), offset, fetched, total = page.count, "listed page");
            if fetched == 0 || entries.len() as i64 >= page.count {
                break;
            }
            offset += fetched as i64;
        }
        Ok(entries)
    }

    /// Resolves a download URL for `file`.
    ///
    /// The returned headers carry the user agent the URL was issued for;
    /// the download must replay it.
    pub async fn link(
        &self,
        file: &dyn Object,
        user_agent: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Link, DriverError> {
        let entry = as_entry(file)?;
        let user_agent = user_agent.filter(|ua| !ua.is_empty()).unwrap_or(DEFAULT_USER_AGENT);
        let urls = self
            .session(cancel)
            .call(|r| r.down_url(&entry.pick_code, user_agent))
            .await?;
        let url = urls
            .get(&entry.id)
            .map(|found| found.url.url.clone())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| DriverError::remote("can't get link"))?;
        debug!(file = %entry.id, "download link resolved");
        Ok(Link {
            url,
            headers: BTreeMap::from([("User-Agent".to_string(), user_agent.to_string())]),
        })
    }

    pub async fn make_dir(
        &self,
        parent: &dyn Object,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Entry, DriverError> {
        let created = self
            .session(cancel)
            .call(|r| r.mkdir(parent.id(), name))
            .await?;
        let now = Utc::now();
        let name = if created.file_name.is_empty() {
            name.to_string()
        } else {
            created.file_name
        };
        debug!(parent = %parent.id(), id = %created.file_id, "folder created");
        Ok(Entry {
            id: created.file_id,
            parent_id: parent.id().to_string(),
            name,
            is_dir: true,
            modified: now,
            created: now,
            ..Entry::folder(String::new())
        })
    }

    /// Moves `src` into `dst`. A driver entry gets its parent updated.
    pub async fn move_to(
        &self,
        src: &mut dyn Object,
        dst: &dyn Object,
        cancel: &CancellationToken,
    ) -> Result<(), DriverError> {
        let req = MoveRequest {
            file_ids: src.id().to_string(),
            to_cid: dst.id().to_string(),
        };
        self.session(cancel).call(|r| r.move_files(&req)).await?;
        if let Some(entry) = src.as_any_mut().downcast_mut::<Entry>() {
            entry.parent_id = req.to_cid;
        }
        Ok(())
    }

    /// Copies `src` into `dst`, never creating a renamed duplicate.
    pub async fn copy_to(&self, src: &dyn Object, dst: &dyn Object, cancel: &CancellationToken) -> Result<(), DriverError> {
        let req = CopyRequest {
            pid: dst.id().to_string(),
            file_id: src.id().to_string(),
            nodupli: "1".to_string(),
        };
        self.session(cancel).call(|r| r.copy_files(&req)).await
    }

    /// Renames `obj`. A driver entry gets its name updated.
    pub async fn rename(
        &self,
        obj: &mut dyn Object,
        new_name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), DriverError> {
        let req = UpdateFileRequest {
            file_id: obj.id().to_string(),
            file_name: new_name.to_string(),
        };
        self.session(cancel).call(|r| r.update_file(&req)).await?;
        if let Some(entry) = obj.as_any_mut().downcast_mut::<Entry>() {
            entry.name = req.file_name;
        }
        Ok(())
    }

    /// Deletes `obj`. Only driver entries are accepted, since the remote
    /// needs the parent folder.
    pub async fn remove(&self, obj: &dyn Object, cancel: &CancellationToken) -> Result<(), DriverError> {
        let entry = as_entry(obj)?;
        let req = DeleteFileRequest {
            file_ids: entry.id.clone(),
            parent_id: entry.parent_id.clone(),
        };
        self.session(cancel).call(|r| r.delete_files(&req)).await
    }

    /// Uploads `source` into `dst`, skipping the transfer when the
    /// provider already holds the content.
    pub async fn put(
        &self,
        dst: &dyn Object,
        source: UploadSource,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, DriverError> {
        Negotiator::new(self.session(cancel), &self.config.upload_status, &self.executor)
            .upload(dst.id(), source, progress)
            .await
    }

    /// Queues offline downloads into `dst`; returns their info hashes.
    pub async fn offline_download(
        &self,
        urls: &[String],
        dst: &dyn Object,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, DriverError> {
        let hashes = self
            .session(cancel)
            .call(|r| r.add_offline_tasks(urls, dst.id()))
            .await?;
        info!(folder = %dst.id(), tasks = hashes.len(), "offline tasks queued");
        Ok(hashes)
    }

    pub async fn delete_offline_task(
        &self,
        info_hash: &str,
        delete_files: bool,
        cancel: &CancellationToken,
    ) -> Result<(), DriverError> {
        self.session(cancel)
            .call(|r| r.delete_offline_task(info_hash, delete_files))
            .await
    }

    /// First page of offline tasks.
    pub async fn offline_list(&self, cancel: &CancellationToken) -> Result<OfflineTaskList, DriverError> {
        self.session(cancel).call(|r| r.offline_task_list(1)).await
    }

    /// Account quota.
    pub async fn details(&self, cancel: &CancellationToken) -> Result<StorageDetails, DriverError> {
        let user = self.session(cancel).call(|r| r.user_info()).await?;
        storage_details(&user.rt_space_info)
    }
}

fn storage_details(space: &SpaceInfo) -> Result<StorageDetails, DriverError> {
    let bytes = |amount: &SpaceAmount, what: &str| {
        amount
            .bytes()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| DriverError::remote(format!("invalid {what} space {:?}", amount.size)))
    };
    Ok(StorageDetails {
        total_space: bytes(&space.all_total, "total")?,
        free_space: bytes(&space.all_remain, "free")?,
    })
}

impl std::fmt::Debug for Open115 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Open115")
            .field("account", &self.account.id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
