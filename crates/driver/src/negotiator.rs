//! Upload negotiation against the deduplicating storage service.
//!
//! Every upload starts by describing its content with two SHA-1 digests
//! (whole content and the prefix). The service answers with a status:
//!
//! - instant: identical content already exists, no bytes are sent;
//! - challenge: digest the byte range in `sign_check` and ask again;
//! - token: fetch transfer credentials and upload the bytes.
//!
//! A single challenge is answered per upload. The status sets come from
//! [`StatusTable`] so codes can change without code changes.

use open115_protocol::constants::upload_target;
use open115_protocol::{InitStatus, StatusTable, UploadInitRequest, UploadInitResponse};
use open115_transfer::{
    ByteSource, ProgressReporter, UploadSource, digest_full, digest_prefix, digest_range,
    materialize,
};
use tracing::{debug, info};

use crate::error::DriverError;
use crate::executor::TransferExecutor;
use crate::remote::Session;

/// Progress reached once the content is captured and hashed.
pub const HASHED_PERCENT: u8 = 40;
/// Progress reached once every part is confirmed, before completion.
pub const TRANSFERRED_PERCENT: u8 = 99;

/// Inclusive byte range named by a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignRange {
    pub start: u64,
    pub end: u64,
}

impl SignRange {
    /// Number of bytes in the range.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parses a `"start-end"` challenge range.
pub fn parse_sign_check(value: &str) -> Result<SignRange, DriverError> {
    let malformed = || DriverError::Protocol(format!("malformed sign_check {value:?}"));
    let (start, end) = value.trim().split_once('-').ok_or_else(malformed)?;
    let start: u64 = start.trim().parse().map_err(|_| malformed())?;
    let end: u64 = end.trim().parse().map_err(|_| malformed())?;
    if end < start {
        return Err(malformed());
    }
    Ok(SignRange { start, end })
}

/// How an upload ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The service already held the content.
    Deduplicated,
    /// Bytes were transferred in `parts` parts (zero for an empty file).
    Transferred { parts: usize },
}

/// Drives one upload from hashing to completion.
pub struct Negotiator<'a> {
    session: Session<'a>,
    statuses: &'a StatusTable,
    executor: &'a TransferExecutor,
}

impl<'a> Negotiator<'a> {
    pub fn new(session: Session<'a>, statuses: &'a StatusTable, executor: &'a TransferExecutor) -> Self {
        Self {
            session,
            statuses,
            executor,
        }
    }

    /// Uploads `source` into `folder_id`.
    ///
    /// `progress` receives non-decreasing values and exactly one 100 on
    /// success. Single-pass streams are captured to a temporary file first;
    /// the file is removed when this returns.
    pub async fn upload(
        &self,
        folder_id: &str,
        source: UploadSource,
        progress: &ProgressReporter,
    ) -> Result<UploadOutcome, DriverError> {
        let name = source.name().to_string();
        let size = source.size();
        let hashing = progress.scaled(0, HASHED_PERCENT);

        let (source, digest) = match source {
            UploadSource::Stream(stream) => {
                let (captured, digest) =
                    materialize(stream, |n| hashing.update(n, size), self.session.cancel).await?;
                let captured: Box<dyn ByteSource> = Box::new(captured);
                (captured, digest)
            }
            UploadSource::Seekable(source) => {
                let digest = self
                    .session
                    .guard(digest_full(source.as_ref(), |n| hashing.update(n, size)))
                    .await?;
                (source, digest)
            }
        };
        hashing.finish();
        let prefix = self.session.guard(digest_prefix(source.as_ref())).await?;

        let request = UploadInitRequest {
            file_name: name.clone(),
            file_size: size,
            target: upload_target(folder_id),
            file_id: digest.to_upper_hex(),
            pre_id: prefix.to_upper_hex(),
            sign_key: None,
            sign_val: None,
        };
        debug!(file = %name, size, sha1 = %digest, "upload init");
        let mut init = self.session.call(|r| r.upload_init(&request)).await?;

        match self.statuses.classify(init.status) {
            InitStatus::InstantComplete => return Ok(self.deduplicated(&name, size, progress)),
            InitStatus::NeedsChallenge(code) => {
                init = self.answer_challenge(&request, &init, source.as_ref(), code).await?;
                match self.statuses.classify(init.status) {
                    InitStatus::InstantComplete => return Ok(self.deduplicated(&name, size, progress)),
                    InitStatus::NeedsChallenge(code) => {
                        return Err(DriverError::Protocol(format!(
                            "second challenge (status {code}) after answering one"
                        )));
                    }
                    InitStatus::Unknown(code) => return Err(unknown_status(code)),
                    InitStatus::NeedsToken(_) | InitStatus::Pending(_) => {}
                }
            }
            InitStatus::NeedsToken(_) | InitStatus::Pending(_) => {}
            InitStatus::Unknown(code) => return Err(unknown_status(code)),
        }

        let token = self.session.call(|r| r.upload_token()).await?;
        debug!(file = %name, bucket = %init.bucket, object = %init.object, "transfer credentials issued");
        let transfer = progress.scaled(HASHED_PERCENT, TRANSFERRED_PERCENT);
        let parts = self
            .executor
            .run(self.session, source.as_ref(), &token, &init, &transfer)
            .await?;
        progress.complete();
        info!(file = %name, size, parts, "upload complete");
        Ok(UploadOutcome::Transferred { parts })
    }

    async fn answer_challenge(
        &self,
        request: &UploadInitRequest,
        init: &UploadInitResponse,
        source: &dyn ByteSource,
        code: i64,
    ) -> Result<UploadInitResponse, DriverError> {
        let range = parse_sign_check(&init.sign_check)?;
        if range.end >= source.size() {
            return Err(DriverError::Protocol(format!(
                "sign_check {}-{} outside file of {} bytes",
                range.start,
                range.end,
                source.size()
            )));
        }
        let value = self
            .session
            .guard(digest_range(source, range.start, range.length()))
            .await?;
        debug!(
            file = %request.file_name,
            status = code,
            start = range.start,
            end = range.end,
            "answering upload challenge"
        );
        let retry = request.with_challenge(init.sign_key.clone(), value.to_upper_hex());
        self.session.call(|r| r.upload_init(&retry)).await
    }

    fn deduplicated(&self, name: &str, size: u64, progress: &ProgressReporter) -> UploadOutcome {
        progress.complete();
        info!(file = %name, size, "upload dedup hit");
        UploadOutcome::Deduplicated
    }
}

fn unknown_status(code: i64) -> DriverError {
    DriverError::Protocol(format!("unexpected upload status {code}"))
}
