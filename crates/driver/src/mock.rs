//! Scripted [`RemoteApi`] used by the driver tests.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use open115_client::{CompletedPart, OssTarget};
use open115_protocol::messages::{
    CopyRequest, DeleteFileRequest, DownUrlResponse, MkdirResponse, MoveRequest, UpdateFileRequest,
};
use open115_protocol::{
    CallbackInfo, GetFilesRequest, GetFilesResponse, OfflineTaskList, UploadInitRequest,
    UploadInitResponse, UploadToken, UserInfo,
};

use crate::error::DriverError;
use crate::object::Object;
use crate::remote::{RemoteApi, RemoteFuture};

pub(crate) fn init_status(status: i64) -> UploadInitResponse {
    UploadInitResponse {
        status,
        bucket: "fhnfile".into(),
        object: "abc/def".into(),
        file_id: "file-9".into(),
        pick_code: "pc-9".into(),
        callback: CallbackInfo {
            callback: r#"{"callbackUrl":"https://uplb.115.com/3.0/upload.php"}"#.into(),
            callback_var: r#"{"x:user_id":"1"}"#.into(),
        },
        ..UploadInitResponse::default()
    }
}

pub(crate) fn init_challenge(range: &str) -> UploadInitResponse {
    UploadInitResponse {
        status: 7,
        sign_key: "sign-key-1".into(),
        sign_check: range.into(),
        ..UploadInitResponse::default()
    }
}

/// An object some other driver produced.
#[derive(Debug)]
pub(crate) struct Foreign;

impl Object for Foreign {
    fn id(&self) -> &str {
        "foreign-1"
    }
    fn name(&self) -> &str {
        "foreign"
    }
    fn size(&self) -> u64 {
        0
    }
    fn is_dir(&self) -> bool {
        false
    }
    fn modified(&self) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Records every call and answers from scripted queues.
#[derive(Default)]
pub(crate) struct MockRemote {
    pub calls: Mutex<Vec<&'static str>>,
    pub user: Mutex<Option<UserInfo>>,
    pub pages: Mutex<VecDeque<GetFilesResponse>>,
    pub files_requests: Mutex<Vec<GetFilesRequest>>,
    pub mkdirs: Mutex<Vec<(String, String)>>,
    pub moves: Mutex<Vec<MoveRequest>>,
    pub copies: Mutex<Vec<CopyRequest>>,
    pub updates: Mutex<Vec<UpdateFileRequest>>,
    pub deletes: Mutex<Vec<DeleteFileRequest>>,
    pub down_urls: Mutex<DownUrlResponse>,
    pub user_agents: Mutex<Vec<String>>,
    pub init_responses: Mutex<VecDeque<UploadInitResponse>>,
    pub init_requests: Mutex<Vec<UploadInitRequest>>,
    /// Part number to the number of times it should still fail.
    pub part_failures: Mutex<HashMap<u32, u32>>,
    pub parts: Mutex<Vec<(u32, Vec<u8>)>>,
    pub completed: Mutex<Vec<CompletedPart>>,
    pub offline_added: Mutex<Vec<(Vec<String>, String)>>,
    pub offline_deleted: Mutex<Vec<(String, bool)>>,
    pub offline: Mutex<OfflineTaskList>,
}

impl MockRemote {
    pub fn with_inits(responses: impl IntoIterator<Item = UploadInitResponse>) -> Self {
        let mock = Self::default();
        mock.init_responses.lock().unwrap().extend(responses);
        mock
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

fn ready<'a, T: Send + 'a>(result: Result<T, DriverError>) -> RemoteFuture<'a, T> {
    Box::pin(async move { result })
}

impl RemoteApi for MockRemote {
    fn user_info(&self) -> RemoteFuture<'_, UserInfo> {
        self.record("user_info");
        ready(
            self.user
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| DriverError::Remote {
                    code: 40140116,
                    message: "no auth".into(),
                }),
        )
    }

    fn get_files<'a>(&'a self, req: &'a GetFilesRequest) -> RemoteFuture<'a, GetFilesResponse> {
        self.record("get_files");
        self.files_requests.lock().unwrap().push(req.clone());
        let page = self.pages.lock().unwrap().pop_front().unwrap_or(GetFilesResponse {
            data: Vec::new(),
            count: 0,
        });
        ready(Ok(page))
    }

    fn mkdir<'a>(&'a self, parent_id: &'a str, name: &'a str) -> RemoteFuture<'a, MkdirResponse> {
        self.record("mkdir");
        self.mkdirs
            .lock()
            .unwrap()
            .push((parent_id.to_string(), name.to_string()));
        ready(Ok(MkdirResponse {
            file_name: name.to_string(),
            file_id: "new-dir-1".into(),
        }))
    }

    fn move_files<'a>(&'a self, req: &'a MoveRequest) -> RemoteFuture<'a, ()> {
        self.record("move_files");
        self.moves.lock().unwrap().push(req.clone());
        ready(Ok(()))
    }

    fn copy_files<'a>(&'a self, req: &'a CopyRequest) -> RemoteFuture<'a, ()> {
        self.record("copy_files");
        self.copies.lock().unwrap().push(req.clone());
        ready(Ok(()))
    }

    fn update_file<'a>(&'a self, req: &'a UpdateFileRequest) -> RemoteFuture<'a, ()> {
        self.record("update_file");
        self.updates.lock().unwrap().push(req.clone());
        ready(Ok(()))
    }

    fn delete_files<'a>(&'a self, req: &'a DeleteFileRequest) -> RemoteFuture<'a, ()> {
        self.record("delete_files");
        self.deletes.lock().unwrap().push(req.clone());
        ready(Ok(()))
    }

    fn down_url<'a>(&'a self, _pick_code: &'a str, user_agent: &'a str) -> RemoteFuture<'a, DownUrlResponse> {
        self.record("down_url");
        self.user_agents.lock().unwrap().push(user_agent.to_string());
        ready(Ok(self.down_urls.lock().unwrap().clone()))
    }

    fn upload_init<'a>(&'a self, req: &'a UploadInitRequest) -> RemoteFuture<'a, UploadInitResponse> {
        self.record("upload_init");
        self.init_requests.lock().unwrap().push(req.clone());
        let next = self.init_responses.lock().unwrap().pop_front();
        ready(next.ok_or_else(|| DriverError::remote("unscripted upload_init")))
    }

    fn upload_token(&self) -> RemoteFuture<'_, UploadToken> {
        self.record("upload_token");
        ready(Ok(UploadToken {
            endpoint: "http://oss-cn-shenzhen.aliyuncs.com".into(),
            access_key_id: "STS.id".into(),
            access_key_secret: "secret".into(),
            security_token: "sts-token".into(),
            expiration: "2026-10-14T12:00:00Z".into(),
        }))
    }

    fn oss_initiate<'a>(&'a self, _target: &'a OssTarget) -> RemoteFuture<'a, String> {
        self.record("oss_initiate");
        ready(Ok("upload-1".into()))
    }

    fn oss_upload_part<'a>(
        &'a self,
        _target: &'a OssTarget,
        upload_id: &'a str,
        number: u32,
        data: Vec<u8>,
    ) -> RemoteFuture<'a, CompletedPart> {
        self.record("oss_upload_part");
        assert_eq!(upload_id, "upload-1");
        {
            let mut failures = self.part_failures.lock().unwrap();
            if let Some(left) = failures.get_mut(&number)
                && *left > 0
            {
                *left -= 1;
                return ready(Err(DriverError::Remote {
                    code: 503,
                    message: format!("part {number} unavailable"),
                }));
            }
        }
        self.parts.lock().unwrap().push((number, data));
        ready(Ok(CompletedPart {
            number,
            etag: format!("\"etag-{number}\""),
        }))
    }

    fn oss_complete<'a>(
        &'a self,
        _target: &'a OssTarget,
        _upload_id: &'a str,
        parts: &'a [CompletedPart],
        callback: &'a CallbackInfo,
    ) -> RemoteFuture<'a, ()> {
        self.record("oss_complete");
        assert!(!callback.is_empty());
        self.completed.lock().unwrap().extend_from_slice(parts);
        ready(Ok(()))
    }

    fn oss_put_empty<'a>(&'a self, _target: &'a OssTarget, _callback: &'a CallbackInfo) -> RemoteFuture<'a, ()> {
        self.record("oss_put_empty");
        ready(Ok(()))
    }

    fn add_offline_tasks<'a>(&'a self, urls: &'a [String], folder_id: &'a str) -> RemoteFuture<'a, Vec<String>> {
        self.record("add_offline_tasks");
        self.offline_added
            .lock()
            .unwrap()
            .push((urls.to_vec(), folder_id.to_string()));
        ready(Ok(urls.iter().enumerate().map(|(i, _)| format!("hash-{i}")).collect()))
    }

    fn delete_offline_task<'a>(&'a self, info_hash: &'a str, delete_files: bool) -> RemoteFuture<'a, ()> {
        self.record("delete_offline_task");
        self.offline_deleted
            .lock()
            .unwrap()
            .push((info_hash.to_string(), delete_files));
        ready(Ok(()))
    }

    fn offline_task_list(&self, page: i64) -> RemoteFuture<'_, OfflineTaskList> {
        self.record("offline_task_list");
        let mut list = self.offline.lock().unwrap().clone();
        list.page = page;
        ready(Ok(list))
    }
}
