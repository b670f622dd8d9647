//! 115 open platform API client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication. An
//! access token the API rejects as expired is refreshed once and the call
//! retried.

use std::sync::Arc;

use reqwest::header::USER_AGENT;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use open115_protocol::constants::{API_BASE_URL, PASSPORT_BASE_URL, is_token_expired};
use open115_protocol::envelope::{ApiError, DataResponse, Envelope};
use open115_protocol::messages::{
    AddOfflineTaskRequest, AddOfflineTaskResult, CopyRequest, DeleteFileRequest,
    DeleteOfflineTaskRequest, DownUrlRequest, DownUrlResponse, GetFilesRequest, GetFilesResponse,
    MkdirRequest, MkdirResponse, MoveRequest, OfflineTaskListRequest, RefreshTokenRequest,
    RefreshTokenResponse, UpdateFileRequest, UploadInitRequest, UploadInitResponse, UploadToken,
};
use open115_protocol::types::{OfflineTaskList, UserInfo};

const NO_QUERY: &[(&str, &str)] = &[];

/// Errors from the 115 client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid token")]
    InvalidToken,

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("OSS error {status} {code}: {message}")]
    Oss {
        status: u16,
        code: String,
        message: String,
    },
}

impl From<ApiError> for Error {
    fn from(e: ApiError) -> Self {
        Self::Api {
            code: e.code,
            message: e.message,
        }
    }
}

/// The access/refresh token pair of one account.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

fn redact(s: &str) -> &'static str {
    if s.is_empty() { "<empty>" } else { "<redacted>" }
}

/// Invoked with the new pair every time the tokens rotate.
pub type RefreshCallback = Arc<dyn Fn(&TokenPair) + Send + Sync>;

/// 115 open platform API client.
pub struct Client {
    http: reqwest::Client,
    api_base: String,
    passport_base: String,
    tokens: RwLock<TokenPair>,
    /// Held by the single task performing a refresh.
    refresh_lock: Mutex<()>,
    on_refresh: Option<RefreshCallback>,
}

impl Client {
    /// Creates a client for the given token pair.
    ///
    /// At least one of the two tokens must be set.
    pub fn new(tokens: TokenPair) -> Result<Self, Error> {
        if tokens.access_token.is_empty() && tokens.refresh_token.is_empty() {
            return Err(Error::InvalidToken);
        }
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            api_base: API_BASE_URL.to_string(),
            passport_base: PASSPORT_BASE_URL.to_string(),
            tokens: RwLock::new(tokens),
            refresh_lock: Mutex::new(()),
            on_refresh: None,
        })
    }

    /// Registers the token rotation callback.
    pub fn with_on_refresh(mut self, callback: impl Fn(&TokenPair) + Send + Sync + 'static) -> Self {
        self.on_refresh = Some(Arc::new(callback));
        self
    }

    /// Points the client at other hosts (proxies, test servers).
    pub fn with_base_urls(mut self, api: impl Into<String>, passport: impl Into<String>) -> Self {
        self.api_base = api.into();
        self.passport_base = passport.into();
        self
    }

    /// Current token pair.
    pub async fn tokens(&self) -> TokenPair {
        self.tokens.read().await.clone()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Sends one authenticated request and checks both HTTP status and envelope.
    async fn send_once<F>(
        &self,
        method: &Method,
        url: &str,
        build: &F,
        access_token: &str,
    ) -> Result<Vec<u8>, Error>
    where
        F: Fn(RequestBuilder) -> RequestBuilder + Sync,
    {
        let req = build(self.http.request(method.clone(), url)).bearer_auth(access_token);
        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?.to_vec();
        let envelope: Envelope = serde_json::from_slice(&body)?;
        envelope.check()?;
        Ok(body)
    }

    /// Performs an API call, refreshing the access token once if it was rejected.
    async fn call<F>(&self, method: Method, path: &str, build: F) -> Result<Vec<u8>, Error>
    where
        F: Fn(RequestBuilder) -> RequestBuilder + Sync,
    {
        let url = format!("{}{}", self.api_base, path);
        let token = self.tokens.read().await.access_token.clone();
        debug!(%method, path, "api call");
        match self.send_once(&method, &url, &build, &token).await {
            Err(Error::Api { code, .. }) if is_token_expired(code) => {
                debug!(path, code, "access token rejected");
                self.refresh_from(&token).await?;
                let token = self.tokens.read().await.access_token.clone();
                self.send_once(&method, &url, &build, &token).await
            }
            other => other,
        }
    }

    async fn get_data<T, Q>(&self, path: &str, query: &Q) -> Result<T, Error>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized + Sync,
    {
        let body = self.call(Method::GET, path, |r| r.query(query)).await?;
        decode_data(&body)
    }

    async fn post_data<T, B>(&self, path: &str, form: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let body = self.call(Method::POST, path, |r| r.form(form)).await?;
        decode_data(&body)
    }

    async fn post_ok<B>(&self, path: &str, form: &B) -> Result<(), Error>
    where
        B: Serialize + ?Sized + Sync,
    {
        self.call(Method::POST, path, |r| r.form(form)).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Token refresh
    // -----------------------------------------------------------------------

    /// Refreshes unless another task already replaced `stale`.
    async fn refresh_from(&self, stale: &str) -> Result<(), Error> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.tokens.read().await.clone();
        if current.access_token != stale {
            debug!("token already rotated by another call");
            return Ok(());
        }
        if current.refresh_token.is_empty() {
            return Err(Error::InvalidToken);
        }

        let pair = self
            .request_refresh(&current.refresh_token)
            .await
            .map_err(|e| {
                warn!(error = %e, "token refresh failed");
                Error::Refresh(e.to_string())
            })?;

        *self.tokens.write().await = pair.clone();
        info!("access token refreshed");
        if let Some(callback) = &self.on_refresh {
            callback(&pair);
        }
        Ok(())
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<TokenPair, Error> {
        let url = format!("{}/open/refreshToken", self.passport_base);
        let form = RefreshTokenRequest {
            refresh_token: refresh_token.to_string(),
        };
        let resp = self.http.post(&url).form(&form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        let body = resp.bytes().await?;
        let envelope: Envelope = serde_json::from_slice(&body)?;
        envelope.check()?;
        let data: RefreshTokenResponse = decode_data(&body)?;
        if data.access_token.is_empty() {
            return Err(Error::InvalidToken);
        }
        Ok(TokenPair {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
        })
    }

    // -----------------------------------------------------------------------
    // Account
    // -----------------------------------------------------------------------

    /// Returns account information including space usage.
    pub async fn user_info(&self) -> Result<UserInfo, Error> {
        self.get_data("/open/user/info", NO_QUERY).await
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    /// Lists one page of a folder.
    pub async fn get_files(&self, req: &GetFilesRequest) -> Result<GetFilesResponse, Error> {
        let body = self
            .call(Method::GET, "/open/ufile/files", |r| r.query(req))
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Creates a folder under `pid`.
    pub async fn mkdir(&self, pid: &str, name: &str) -> Result<MkdirResponse, Error> {
        let form = MkdirRequest {
            pid: pid.to_string(),
            file_name: name.to_string(),
        };
        self.post_data("/open/folder/add", &form).await
    }

    pub async fn move_files(&self, req: &MoveRequest) -> Result<(), Error> {
        self.post_ok("/open/ufile/move", req).await
    }

    pub async fn copy_files(&self, req: &CopyRequest) -> Result<(), Error> {
        self.post_ok("/open/ufile/copy", req).await
    }

    /// Renames an entry.
    pub async fn update_file(&self, req: &UpdateFileRequest) -> Result<(), Error> {
        self.post_ok("/open/ufile/update", req).await
    }

    pub async fn delete_files(&self, req: &DeleteFileRequest) -> Result<(), Error> {
        self.post_ok("/open/ufile/delete", req).await
    }

    /// Resolves download links for a pick code.
    ///
    /// The link is bound to `user_agent`; the downloader must send the same one.
    pub async fn down_url(&self, pick_code: &str, user_agent: &str) -> Result<DownUrlResponse, Error> {
        let form = DownUrlRequest {
            pick_code: pick_code.to_string(),
        };
        let body = self
            .call(Method::POST, "/open/ufile/downurl", |r| {
                r.header(USER_AGENT, user_agent).form(&form)
            })
            .await?;
        // An empty result comes back as `[]` rather than `{}`.
        let data: DataResponse<serde_json::Value> = serde_json::from_slice(&body)?;
        if data.data.is_object() {
            Ok(serde_json::from_value(data.data)?)
        } else {
            Ok(DownUrlResponse::new())
        }
    }

    // -----------------------------------------------------------------------
    // Upload
    // -----------------------------------------------------------------------

    /// Submits an upload identity claim.
    pub async fn upload_init(&self, req: &UploadInitRequest) -> Result<UploadInitResponse, Error> {
        self.post_data("/open/upload/init", req).await
    }

    /// Requests STS credentials for the object store.
    pub async fn upload_token(&self) -> Result<UploadToken, Error> {
        self.get_data("/open/upload/get_token", NO_QUERY).await
    }

    // -----------------------------------------------------------------------
    // Offline tasks
    // -----------------------------------------------------------------------

    /// Submits download URLs to be fetched into `folder_id`; returns their info hashes.
    pub async fn add_offline_tasks(&self, urls: &[String], folder_id: &str) -> Result<Vec<String>, Error> {
        let form = AddOfflineTaskRequest {
            urls: urls.join("\n"),
            wp_path_id: folder_id.to_string(),
        };
        let results: Vec<AddOfflineTaskResult> =
            self.post_data("/open/offline/add_task_urls", &form).await?;
        results
            .into_iter()
            .map(|r| {
                if r.state {
                    Ok(r.info_hash)
                } else {
                    Err(Error::Api {
                        code: r.code,
                        message: format!("{}: {}", r.url, r.message),
                    })
                }
            })
            .collect()
    }

    pub async fn delete_offline_task(&self, info_hash: &str, delete_files: bool) -> Result<(), Error> {
        let form = DeleteOfflineTaskRequest {
            info_hash: info_hash.to_string(),
            del_source_file: delete_files,
        };
        self.post_ok("/open/offline/del_task", &form).await
    }

    /// Lists offline tasks, one page at a time (1-based).
    pub async fn offline_task_list(&self, page: i64) -> Result<OfflineTaskList, Error> {
        self.get_data("/open/offline/get_task_list", &OfflineTaskListRequest { page })
            .await
    }
}

fn decode_data<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    let resp: DataResponse<T> = serde_json::from_slice(body)?;
    Ok(resp.data)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// A recorded request: request line plus headers, and the body.
    #[derive(Debug, Clone)]
    pub(crate) struct Recorded {
        pub head: String,
        pub body: String,
    }

    /// One scripted reply.
    pub(crate) struct Reply {
        pub status: u16,
        pub headers: Vec<(&'static str, String)>,
        pub body: String,
    }

    impl Reply {
        pub fn json(body: &str) -> Self {
            Self {
                status: 200,
                headers: vec![("Content-Type", "application/json".into())],
                body: body.to_string(),
            }
        }

        pub fn status(status: u16, body: &str) -> Self {
            Self {
                status,
                headers: Vec::new(),
                body: body.to_string(),
            }
        }

        pub fn header(mut self, name: &'static str, value: &str) -> Self {
            self.headers.push((name, value.to_string()));
            self
        }
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<Recorded> {
        let mut buf = Vec::new();
        let mut chunk = vec![0u8; 8192];
        let head_end = loop {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        let content_length = head
            .lines()
            .find_map(|l| {
                let (k, v) = l.split_once(':')?;
                k.eq_ignore_ascii_case("content-length")
                    .then(|| v.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buf.len() < head_end + content_length {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = String::from_utf8_lossy(&buf[head_end..]).into_owned();
        Some(Recorded { head, body })
    }

    /// Starts a mock HTTP server answering each connection with the next reply.
    pub(crate) async fn mock_server(
        replies: Vec<Reply>,
    ) -> (String, Arc<StdMutex<Vec<Recorded>>>, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let recorded = Arc::new(StdMutex::new(Vec::new()));
        let rec = Arc::clone(&recorded);

        let handle = tokio::spawn(async move {
            for reply in replies {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                if let Some(req) = read_request(&mut stream).await {
                    rec.lock().unwrap().push(req);
                }
                let mut resp = format!("HTTP/1.1 {} Mock\r\n", reply.status);
                for (k, v) in &reply.headers {
                    resp.push_str(&format!("{k}: {v}\r\n"));
                }
                resp.push_str(&format!(
                    "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.body.len(),
                    reply.body
                ));
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, recorded, handle)
    }

    fn client_for(url: &str) -> Client {
        Client::new(TokenPair::new("access-1", "refresh-1"))
            .unwrap()
            .with_base_urls(url, url)
    }

    #[test]
    fn new_requires_a_token() {
        assert!(matches!(
            Client::new(TokenPair::default()),
            Err(Error::InvalidToken)
        ));
        assert!(Client::new(TokenPair::new("", "r")).is_ok());
    }

    #[test]
    fn token_pair_debug_redacts() {
        let dbg = format!("{:?}", TokenPair::new("secret-a", "secret-r"));
        assert!(!dbg.contains("secret"));
    }

    #[tokio::test]
    async fn user_info_sends_bearer() {
        let json = r#"{"state":true,"code":0,"message":"","data":{"user_id":"7","user_name":"u",
            "rt_space_info":{"all_total":{"size":100},"all_remain":{"size":"40"},"all_use":{"size":60}}}}"#;
        let (url, recorded, handle) = mock_server(vec![Reply::json(json)]).await;

        let info = client_for(&url).user_info().await.unwrap();
        assert_eq!(info.user_id, "7");
        assert_eq!(info.rt_space_info.all_remain.bytes(), Some(40));

        let reqs = recorded.lock().unwrap();
        assert!(reqs[0].head.starts_with("GET /open/user/info"));
        assert!(reqs[0].head.to_ascii_lowercase().contains("authorization: bearer access-1"));
        handle.abort();
    }

    #[tokio::test]
    async fn get_files_query_and_count() {
        let json = r#"{"state":true,"code":0,"message":"","count":3,
            "data":[{"fid":"1","pid":"0","fc":"0","fn":"a"},{"fid":"2","pid":"0","fc":"1","fn":"b","fs":5}]}"#;
        let (url, recorded, handle) = mock_server(vec![Reply::json(json)]).await;

        let req = GetFilesRequest {
            cid: "0".into(),
            limit: 2,
            offset: 0,
            asc: true,
            o: "file_name".into(),
            show_dir: true,
        };
        let page = client_for(&url).get_files(&req).await.unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.data.len(), 2);
        assert!(page.data[0].is_dir());

        let head = &recorded.lock().unwrap()[0].head;
        assert!(head.contains("cid=0"));
        assert!(head.contains("limit=2"));
        assert!(head.contains("asc=1"));
        assert!(head.contains("show_dir=1"));
        handle.abort();
    }

    #[tokio::test]
    async fn api_failure_maps_to_api_error() {
        let json = r#"{"state":false,"code":990002,"message":"parameter error"}"#;
        let (url, _, handle) = mock_server(vec![Reply::json(json)]).await;

        let err = client_for(&url).mkdir("0", "x").await.unwrap_err();
        match err {
            Error::Api { code, message } => {
                assert_eq!(code, 990002);
                assert_eq!(message, "parameter error");
            }
            other => panic!("unexpected error: {other}"),
        }
        handle.abort();
    }

    #[tokio::test]
    async fn http_status_error() {
        let (url, _, handle) = mock_server(vec![Reply::status(502, "bad gateway")]).await;
        let err = client_for(&url).upload_token().await.unwrap_err();
        assert!(matches!(err, Error::Status { status: 502, .. }));
        handle.abort();
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_retried() {
        let (url, recorded, handle) = mock_server(vec![
            Reply::json(r#"{"state":false,"code":40140125,"message":"access token expired"}"#),
            Reply::json(
                r#"{"state":1,"code":0,"message":"","data":{"access_token":"access-2","refresh_token":"refresh-2","expires_in":7200}}"#,
            ),
            Reply::json(r#"{"state":true,"code":0,"message":"","data":{"file_name":"x","file_id":"99"}}"#),
        ])
        .await;

        let rotated = Arc::new(StdMutex::new(Vec::new()));
        let r = Arc::clone(&rotated);
        let client = client_for(&url).with_on_refresh(move |pair| r.lock().unwrap().push(pair.clone()));

        let dir = client.mkdir("0", "x").await.unwrap();
        assert_eq!(dir.file_id, "99");
        assert_eq!(client.tokens().await, TokenPair::new("access-2", "refresh-2"));
        assert_eq!(*rotated.lock().unwrap(), vec![TokenPair::new("access-2", "refresh-2")]);

        let reqs = recorded.lock().unwrap();
        assert_eq!(reqs.len(), 3);
        assert!(reqs[1].head.starts_with("POST /open/refreshToken"));
        assert!(reqs[1].body.contains("refresh_token=refresh-1"));
        assert!(reqs[2].head.to_ascii_lowercase().contains("bearer access-2"));
        handle.abort();
    }

    #[tokio::test]
    async fn refresh_failure_surfaces() {
        let (url, _, handle) = mock_server(vec![
            Reply::json(r#"{"state":false,"code":40140124,"message":"expired"}"#),
            Reply::json(r#"{"state":0,"code":40140116,"message":"refresh token invalid"}"#),
        ])
        .await;

        let err = client_for(&url).user_info().await.unwrap_err();
        assert!(matches!(err, Error::Refresh(ref m) if m.contains("refresh token invalid")));
        handle.abort();
    }

    #[tokio::test]
    async fn down_url_sends_user_agent() {
        let json = r#"{"state":true,"code":0,"message":"","data":{"123":{"file_name":"a","file_size":1,"pick_code":"pc","sha1":"S","url":{"url":"https://cdn/a"}}}}"#;
        let (url, recorded, handle) = mock_server(vec![Reply::json(json)]).await;

        let links = client_for(&url).down_url("pc", "TestAgent/1.0").await.unwrap();
        assert_eq!(links["123"].url.url, "https://cdn/a");

        let reqs = recorded.lock().unwrap();
        assert!(reqs[0].head.to_ascii_lowercase().contains("user-agent: testagent/1.0"));
        assert!(reqs[0].body.contains("pick_code=pc"));
        handle.abort();
    }

    #[tokio::test]
    async fn down_url_empty_array() {
        let json = r#"{"state":true,"code":0,"message":"","data":[]}"#;
        let (url, _, handle) = mock_server(vec![Reply::json(json)]).await;
        let links = client_for(&url).down_url("pc", "ua").await.unwrap();
        assert!(links.is_empty());
        handle.abort();
    }

    #[tokio::test]
    async fn upload_init_form() {
        let json = r#"{"state":true,"code":0,"message":"","data":{"status":2,"pick_code":"p","file_id":"5"}}"#;
        let (url, recorded, handle) = mock_server(vec![Reply::json(json)]).await;

        let req = UploadInitRequest {
            file_name: "a b.txt".into(),
            file_size: 3,
            target: "U_1_0".into(),
            file_id: "A9993E364706816ABA3E25717850C26C9CD0D89D".into(),
            pre_id: "A9993E364706816ABA3E25717850C26C9CD0D89D".into(),
            sign_key: None,
            sign_val: None,
        };
        let resp = client_for(&url).upload_init(&req).await.unwrap();
        assert_eq!(resp.status, 2);

        let body = &recorded.lock().unwrap()[0].body;
        assert!(body.contains("file_name=a+b.txt"));
        assert!(body.contains("target=U_1_0"));
        assert!(body.contains("fileid=A9993E"));
        assert!(!body.contains("sign_key"));
        handle.abort();
    }

    #[tokio::test]
    async fn offline_add_collects_hashes() {
        let json = r#"{"state":true,"code":0,"message":"","data":[
            {"state":true,"code":0,"message":"","info_hash":"h1","url":"magnet:1"},
            {"state":true,"code":0,"message":"","info_hash":"h2","url":"magnet:2"}]}"#;
        let (url, recorded, handle) = mock_server(vec![Reply::json(json)]).await;

        let hashes = client_for(&url)
            .add_offline_tasks(&["magnet:1".into(), "magnet:2".into()], "42")
            .await
            .unwrap();
        assert_eq!(hashes, vec!["h1", "h2"]);
        assert!(recorded.lock().unwrap()[0].body.contains("wp_path_id=42"));
        handle.abort();
    }

    #[tokio::test]
    async fn offline_add_rejected_url() {
        let json = r#"{"state":true,"code":0,"message":"","data":[
            {"state":false,"code":10008,"message":"task exists","info_hash":"","url":"magnet:1"}]}"#;
        let (url, _, handle) = mock_server(vec![Reply::json(json)]).await;
        let err = client_for(&url)
            .add_offline_tasks(&["magnet:1".into()], "0")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api { code: 10008, .. }));
        handle.abort();
    }
}
