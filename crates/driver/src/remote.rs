//! Remote API abstraction used by the driver.
//!
//! [`RemoteApi`] is the seam between driver logic and the HTTP client, so
//! upload negotiation and entry operations can be tested against scripted
//! responses.

use std::future::Future;
use std::pin::Pin;

use open115_client::{Client, CompletedPart, OssTarget};
use open115_protocol::messages::{
    CopyRequest, DeleteFileRequest, DownUrlResponse, MkdirResponse, MoveRequest, UpdateFileRequest,
};
use open115_protocol::{
    CallbackInfo, GetFilesRequest, GetFilesResponse, OfflineTaskList, UploadInitRequest,
    UploadInitResponse, UploadToken, UserInfo,
};
use tokio_util::sync::CancellationToken;

use crate::error::DriverError;
use crate::limiter::RateLimiter;

/// Boxed future returned by [`RemoteApi`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DriverError>> + Send + 'a>>;

/// Every remote call the driver makes.
pub trait RemoteApi: Send + Sync {
    fn user_info(&self) -> RemoteFuture<'_, UserInfo>;

    fn get_files<'a>(&'a self, req: &'a GetFilesRequest) -> RemoteFuture<'a, GetFilesResponse>;

    fn mkdir<'a>(&'a self, parent_id: &'a str, name: &'a str) -> RemoteFuture<'a, MkdirResponse>;

    fn move_files<'a>(&'a self, req: &'a MoveRequest) -> RemoteFuture<'a, ()>;

    fn copy_files<'a>(&'a self, req: &'a CopyRequest) -> RemoteFuture<'a, ()>;

    fn update_file<'a>(&'a self, req: &'a UpdateFileRequest) -> RemoteFuture<'a, ()>;

    fn delete_files<'a>(&'a self, req: &'a DeleteFileRequest) -> RemoteFuture<'a, ()>;

    fn down_url<'a>(&'a self, pick_code: &'a str, user_agent: &'a str) -> RemoteFuture<'a, DownUrlResponse>;

    fn upload_init<'a>(&'a self, req: &'a UploadInitRequest) -> RemoteFuture<'a, UploadInitResponse>;

    fn upload_token(&self) -> RemoteFuture<'_, UploadToken>;

    /// Starts a multipart upload and returns its id.
    fn oss_initiate<'a>(&'a self, target: &'a OssTarget) -> RemoteFuture<'a, String>;

    fn oss_upload_part<'a>(
        &'a self,
        target: &'a OssTarget,
        upload_id: &'a str,
        number: u32,
        data: Vec<u8>,
    ) -> RemoteFuture<'a, CompletedPart>;

    fn oss_complete<'a>(
        &'a self,
        target: &'a OssTarget,
        upload_id: &'a str,
        parts: &'a [CompletedPart],
        callback: &'a CallbackInfo,
    ) -> RemoteFuture<'a, ()>;

    fn oss_put_empty<'a>(&'a self, target: &'a OssTarget, callback: &'a CallbackInfo) -> RemoteFuture<'a, ()>;

    /// Queues offline downloads; returns the info hash of each task.
    fn add_offline_tasks<'a>(&'a self, urls: &'a [String], folder_id: &'a str) -> RemoteFuture<'a, Vec<String>>;

    fn delete_offline_task<'a>(&'a self, info_hash: &'a str, delete_files: bool) -> RemoteFuture<'a, ()>;

    fn offline_task_list(&self, page: i64) -> RemoteFuture<'_, OfflineTaskList>;
}

impl RemoteApi for Client {
    fn user_info(&self) -> RemoteFuture<'_, UserInfo> {
        Box::pin(async move { Ok(Client::user_info(self).await?) })
    }

    fn get_files<'a>(&'a self, req: &'a GetFilesRequest) -> RemoteFuture<'a, GetFilesResponse> {
        Box::pin(async move { Ok(Client::get_files(self, req).await?) })
    }

    fn mkdir<'a>(&'a self, parent_id: &'a str, name: &'a str) -> RemoteFuture<'a, MkdirResponse> {
        Box::pin(async move { Ok(Client::mkdir(self, parent_id, name).await?) })
    }

    fn move_files<'a>(&'a self, req: &'a MoveRequest) -> RemoteFuture<'a, ()> {
        Box::pin(async move { Ok(Client::move_files(self, req).await?) })
    }

    fn copy_files<'a>(&'a self, req: &'a CopyRequest) -> RemoteFuture<'a, ()> {
        Box::pin(async move { Ok(Client::copy_files(self, req).await?) })
    }

    fn update_file<'a>(&'a self, req: &'a UpdateFileRequest) -> RemoteFuture<'a, ()> {
        Box::pin(async move { Ok(Client::update_file(self, req).await?) })
    }

    fn delete_files<'a>(&'a self, req: &'a DeleteFileRequest) -> RemoteFuture<'a, ()> {
        Box::pin(async move { Ok(Client::delete_files(self, req).await?) })
    }

    fn down_url<'a>(&'a self, pick_code: &'a str, user_agent: &'a str) -> RemoteFuture<'a, DownUrlResponse> {
        Box::pin(async move { Ok(Client::down_url(self, pick_code, user_agent).await?) })
    }

    fn upload_init<'a>(&'a self, req: &'a UploadInitRequest) -> RemoteFuture<'a, UploadInitResponse> {
        Box::pin(async move { Ok(Client::upload_init(self, req).await?) })
    }

    fn upload_token(&self) -> RemoteFuture<'_, UploadToken> {
        Box::pin(async move { Ok(Client::upload_token(self).await?) })
    }

    fn oss_initiate<'a>(&'a self, target: &'a OssTarget) -> RemoteFuture<'a, String> {
        Box::pin(async move { Ok(Client::oss_initiate(self, target).await?) })
    }

    fn oss_upload_part<'a>(
        &'a self,
        target: &'a OssTarget,
        upload_id: &'a str,
        number: u32,
        data: Vec<u8>,
    ) -> RemoteFuture<'a, CompletedPart> {
        Box::pin(async move { Ok(Client::oss_upload_part(self, target, upload_id, number, data).await?) })
    }

    fn oss_complete<'a>(
        &'a self,
        target: &'a OssTarget,
        upload_id: &'a str,
        parts: &'a [CompletedPart],
        callback: &'a CallbackInfo,
    ) -> RemoteFuture<'a, ()> {
        Box::pin(async move { Ok(Client::oss_complete(self, target, upload_id, parts, callback).await?) })
    }

    fn oss_put_empty<'a>(&'a self, target: &'a OssTarget, callback: &'a CallbackInfo) -> RemoteFuture<'a, ()> {
        Box::pin(async move { Ok(Client::oss_put_empty(self, target, callback).await?) })
    }

    fn add_offline_tasks<'a>(&'a self, urls: &'a [String], folder_id: &'a str) -> RemoteFuture<'a, Vec<String>> {
        Box::pin(async move { Ok(Client::add_offline_tasks(self, urls, folder_id).await?) })
    }

    fn delete_offline_task<'a>(&'a self, info_hash: &'a str, delete_files: bool) -> RemoteFuture<'a, ()> {
        Box::pin(async move { Ok(Client::delete_offline_task(self, info_hash, delete_files).await?) })
    }

    fn offline_task_list(&self, page: i64) -> RemoteFuture<'_, OfflineTaskList> {
        Box::pin(async move { Ok(Client::offline_task_list(self, page).await?) })
    }
}

/// A remote handle bound to the limiter and cancellation token of one
/// operation.
#[derive(Clone, Copy)]
pub struct Session<'a> {
    pub remote: &'a dyn RemoteApi,
    pub limiter: &'a RateLimiter,
    pub cancel: &'a CancellationToken,
}

impl<'a> Session<'a> {
    /// Runs one remote call behind a limiter slot. `call` is only invoked
    /// once the slot is granted and the operation is still live.
    ///
    /// A token refresh and the retried request triggered by an expired
    /// access token happen inside the client and share this slot.
    pub async fn call<T, F>(&self, call: impl FnOnce(&'a dyn RemoteApi) -> F) -> Result<T, DriverError>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        self.limiter.acquire(self.cancel).await?;
        if self.cancel.is_cancelled() {
            return Err(DriverError::Cancelled);
        }
        self.guard(call(self.remote)).await
    }

    /// Runs local work until it finishes or the operation is cancelled.
    pub async fn guard<T, E, F>(&self, work: F) -> Result<T, DriverError>
    where
        F: Future<Output = Result<T, E>>,
        DriverError: From<E>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DriverError::Cancelled),
            result = work => result.map_err(DriverError::from),
        }
    }
}
