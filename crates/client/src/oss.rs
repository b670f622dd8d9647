//! Multipart upload to the object store behind 115 uploads.
//!
//! Requests are signed with the OSS header scheme: HMAC-SHA1 over the verb,
//! `Content-MD5`, `Content-Type`, `Date`, the sorted `x-oss-*` headers and the
//! canonical resource, keyed by the STS secret from the upload token.

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, DATE, ETAG};
use sha1::Sha1;
use tracing::debug;

use open115_protocol::envelope::Envelope;
use open115_protocol::messages::{CallbackInfo, UploadInitResponse, UploadToken};

use crate::client::{Client, Error};

type HmacSha1 = Hmac<Sha1>;

/// Characters escaped in object keys; `/` separates key segments.
const OBJECT_KEY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Where and with which credentials an upload's bytes go.
#[derive(Clone)]
pub struct OssTarget {
    pub endpoint: String,
    pub bucket: String,
    pub object: String,
    access_key_id: String,
    access_key_secret: String,
    security_token: String,
}

impl OssTarget {
    /// Combines the STS token with the bucket/object named by upload init.
    pub fn new(token: &UploadToken, init: &UploadInitResponse) -> Self {
        Self {
            endpoint: token.endpoint.clone(),
            bucket: init.bucket.clone(),
            object: init.object.clone(),
            access_key_id: token.access_key_id.clone(),
            access_key_secret: token.access_key_secret.clone(),
            security_token: token.security_token.clone(),
        }
    }

    /// Request URL for `sub_resource` (e.g. `?uploads`).
    ///
    /// Buckets are addressed as a host prefix, except on IP or localhost
    /// endpoints where path style is the only option.
    fn url(&self, sub_resource: &str) -> String {
        let (scheme, host) = match self.endpoint.split_once("://") {
            Some((scheme, host)) => (scheme, host.trim_end_matches('/')),
            None => ("https", self.endpoint.trim_end_matches('/')),
        };
        let key = utf8_percent_encode(&self.object, OBJECT_KEY);
        let hostname = host.rsplit_once(':').map_or(host, |(h, _)| h);
        if hostname == "localhost" || hostname.parse::<std::net::IpAddr>().is_ok() {
            format!("{scheme}://{host}/{}/{key}{sub_resource}", self.bucket)
        } else {
            format!("{scheme}://{}.{host}/{key}{sub_resource}", self.bucket)
        }
    }

    fn canonical_resource(&self, sub_resource: &str) -> String {
        format!("/{}/{}{sub_resource}", self.bucket, self.object)
    }
}

impl std::fmt::Debug for OssTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OssTarget")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("object", &self.object)
            .finish_non_exhaustive()
    }
}

/// A confirmed part, as listed in the completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub number: u32,
    pub etag: String,
}

/// Computes the `Authorization` signature.
fn sign(
    secret: &str,
    verb: &str,
    content_md5: &str,
    content_type: &str,
    date: &str,
    oss_headers: &[(String, String)],
    resource: &str,
) -> Result<String, Error> {
    let mut string_to_sign = format!("{verb}\n{content_md5}\n{content_type}\n{date}\n");
    for (k, v) in oss_headers {
        string_to_sign.push_str(k);
        string_to_sign.push(':');
        string_to_sign.push_str(v);
        string_to_sign.push('\n');
    }
    string_to_sign.push_str(resource);

    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| Error::InvalidToken)?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Returns the text of the first `<tag>...</tag>` in `xml`.
fn extract_xml_tag<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    let text = xml[start..end].trim();
    (!text.is_empty()).then_some(text)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn complete_body(parts: &[CompletedPart]) -> String {
    let mut xml = String::from("<CompleteMultipartUpload>");
    for part in parts {
        xml.push_str(&format!(
            "<Part><PartNumber>{}</PartNumber><ETag>{}</ETag></Part>",
            part.number,
            escape_xml(&part.etag)
        ));
    }
    xml.push_str("</CompleteMultipartUpload>");
    xml
}

/// Interprets the body relayed from the 115 upload callback.
fn check_callback_body(body: &[u8]) -> Result<(), Error> {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => {
            debug!(len = body.len(), "callback body is not JSON");
            return Ok(());
        }
    };
    if value.get("state").is_none() {
        return Ok(());
    }
    let envelope: Envelope = serde_json::from_value(value)?;
    Ok(envelope.check()?)
}

fn oss_error(status: u16, body: &str) -> Error {
    Error::Oss {
        status,
        code: extract_xml_tag(body, "Code").unwrap_or("Unknown").to_string(),
        message: extract_xml_tag(body, "Message")
            .map(str::to_string)
            .unwrap_or_else(|| body.chars().take(200).collect()),
    }
}

impl Client {
    async fn oss_send(
        &self,
        target: &OssTarget,
        method: Method,
        sub_resource: &str,
        content_type: &str,
        body: Vec<u8>,
        mut oss_headers: Vec<(String, String)>,
    ) -> Result<reqwest::Response, Error> {
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        let content_md5 = if body.is_empty() {
            String::new()
        } else {
            STANDARD.encode(Md5::digest(&body))
        };
        if !target.security_token.is_empty() {
            oss_headers.push(("x-oss-security-token".into(), target.security_token.clone()));
        }
        oss_headers.sort();

        let signature = sign(
            &target.access_key_secret,
            method.as_str(),
            &content_md5,
            content_type,
            &date,
            &oss_headers,
            &target.canonical_resource(sub_resource),
        )?;

        let mut req = self
            .http()
            .request(method, target.url(sub_resource))
            .header(DATE, &date)
            .header(
                AUTHORIZATION,
                format!("OSS {}:{signature}", target.access_key_id),
            );
        if !content_type.is_empty() {
            req = req.header(CONTENT_TYPE, content_type);
        }
        if !content_md5.is_empty() {
            req = req.header("Content-MD5", content_md5);
        }
        for (k, v) in oss_headers {
            req = req.header(k, v);
        }

        let resp = req.body(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(oss_error(status.as_u16(), &body));
        }
        Ok(resp)
    }

    /// Starts a multipart upload; returns the upload id.
    pub async fn oss_initiate(&self, target: &OssTarget) -> Result<String, Error> {
        let resp = self
            .oss_send(target, Method::POST, "?uploads", "", Vec::new(), Vec::new())
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        let upload_id = extract_xml_tag(&body, "UploadId")
            .ok_or_else(|| oss_error(status, &body))?
            .to_string();
        debug!(bucket = %target.bucket, upload_id = %upload_id, "multipart upload initiated");
        Ok(upload_id)
    }

    /// Uploads one part (1-based `number`).
    pub async fn oss_upload_part(
        &self,
        target: &OssTarget,
        upload_id: &str,
        number: u32,
        data: Vec<u8>,
    ) -> Result<CompletedPart, Error> {
        let sub = format!("?partNumber={number}&uploadId={upload_id}");
        let resp = self
            .oss_send(target, Method::PUT, &sub, "", data, Vec::new())
            .await?;
        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::Oss {
                status: resp.status().as_u16(),
                code: "MissingETag".into(),
                message: format!("no ETag for part {number}"),
            })?;
        Ok(CompletedPart { number, etag })
    }

    /// Finishes a multipart upload, triggering the 115 callback.
    pub async fn oss_complete(
        &self,
        target: &OssTarget,
        upload_id: &str,
        parts: &[CompletedPart],
        callback: &CallbackInfo,
    ) -> Result<(), Error> {
        let mut sorted = parts.to_vec();
        sorted.sort_by_key(|p| p.number);
        let sub = format!("?uploadId={upload_id}");
        let resp = self
            .oss_send(
                target,
                Method::POST,
                &sub,
                "application/xml",
                complete_body(&sorted).into_bytes(),
                callback_headers(callback),
            )
            .await?;
        finish_callback(resp).await
    }

    /// Stores an empty object; used for zero-length files.
    pub async fn oss_put_empty(&self, target: &OssTarget, callback: &CallbackInfo) -> Result<(), Error> {
        let resp = self
            .oss_send(target, Method::PUT, "", "", Vec::new(), callback_headers(callback))
            .await?;
        finish_callback(resp).await
    }
}

fn callback_headers(callback: &CallbackInfo) -> Vec<(String, String)> {
    if callback.is_empty() {
        return Vec::new();
    }
    let (cb, var) = callback.encoded_headers();
    let mut headers = vec![("x-oss-callback".to_string(), cb)];
    if !callback.callback_var.is_empty() {
        headers.push(("x-oss-callback-var".to_string(), var));
    }
    headers
}

/// OSS answers 203 when the object was stored but the callback failed.
async fn finish_callback(resp: reqwest::Response) -> Result<(), Error> {
    let status = resp.status().as_u16();
    let body = resp.bytes().await?;
    if status == 203 {
        let text = String::from_utf8_lossy(&body);
        return Err(Error::Oss {
            status,
            code: extract_xml_tag(&text, "Code")
                .unwrap_or("CallbackFailed")
                .to_string(),
            message: extract_xml_tag(&text, "Message")
                .unwrap_or("upload callback failed")
                .to_string(),
        });
    }
    check_callback_body(&body)
}
