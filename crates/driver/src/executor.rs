//! Chunked transfer of upload bytes to the object store.

use std::fmt::Display;
use std::future::Future;

use futures_util::StreamExt;
use futures_util::stream;
use open115_client::{CompletedPart, OssTarget};
use open115_protocol::{UploadInitResponse, UploadToken};
use open115_transfer::{ByteSource, Part, ScaledProgress, SpeedCalculator, part_size_for, plan_parts, read_range};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::error::DriverError;
use crate::remote::Session;

/// Uploads a source in parts and finishes the multipart upload.
#[derive(Debug, Clone)]
pub struct TransferExecutor {
    retry: RetryConfig,
    concurrency: usize,
    part_size: Option<u64>,
}

impl TransferExecutor {
    pub fn new(retry: RetryConfig, concurrency: usize) -> Self {
        Self {
            retry,
            concurrency: concurrency.max(1),
            part_size: None,
        }
    }

    /// Uses a fixed part size instead of the size table.
    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = Some(part_size.max(1));
        self
    }

    /// Transfers `source` to the destination described by `token` and
    /// `init`, reporting into `progress`. Returns the number of parts sent.
    pub async fn run(
        &self,
        session: Session<'_>,
        source: &dyn ByteSource,
        token: &UploadToken,
        init: &UploadInitResponse,
        progress: &ScaledProgress,
    ) -> Result<usize, DriverError> {
        let target = OssTarget::new(token, init);
        let size = source.size();

        if size == 0 {
            session
                .call(|r| r.oss_put_empty(&target, &init.callback))
                .await?;
            progress.finish();
            info!(file = %source.name(), bucket = %target.bucket, "empty object stored");
            return Ok(0);
        }

        let part_size = self.part_size.unwrap_or_else(|| part_size_for(size));
        let parts = plan_parts(size, part_size);
        let upload_id = session.call(|r| r.oss_initiate(&target)).await?;
        debug!(
            file = %source.name(),
            size,
            part_size,
            parts = parts.len(),
            concurrency = self.concurrency,
            "multipart upload started"
        );

        let speed = SpeedCalculator::new(None, None);
        let mut completed: Vec<CompletedPart> = Vec::with_capacity(parts.len());
        let mut uploaded: u64 = 0;
        {
            let mut pending = stream::iter(parts.iter().copied())
                .map(|part| self.upload_part(session, source, &target, &upload_id, part))
                .buffer_unordered(self.concurrency);
            while let Some(result) = pending.next().await {
                let (part, done) = result?;
                uploaded += part.length;
                speed.add_sample(part.length);
                progress.update(uploaded, size);
                debug!(
                    part = done.number,
                    uploaded,
                    size,
                    bytes_per_sec = speed.bytes_per_second() as u64,
                    "part confirmed"
                );
                completed.push(done);
            }
        }

        completed.sort_by_key(|p| p.number);
        session
            .call(|r| r.oss_complete(&target, &upload_id, &completed, &init.callback))
            .await?;
        progress.finish();
        info!(file = %source.name(), size, parts = completed.len(), "multipart upload complete");
        Ok(completed.len())
    }

    async fn upload_part(
        &self,
        session: Session<'_>,
        source: &dyn ByteSource,
        target: &OssTarget,
        upload_id: &str,
        part: Part,
    ) -> Result<(Part, CompletedPart), DriverError> {
        let done = self
            .retrying(session.cancel, part.number, move || async move {
                let data = session.guard(read_range(source, part.offset, part.length)).await?;
                session
                    .call(|r| r.oss_upload_part(target, upload_id, part.number, data))
                    .await
            })
            .await?;
        Ok((part, done))
    }

    /// Runs `op` until it succeeds, fails permanently or runs out of attempts.
    async fn retrying<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        label: impl Display,
        mut op: F,
    ) -> Result<T, DriverError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DriverError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && e.is_retryable() => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        part = %label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "part upload failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(DriverError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use open115_transfer::{MemorySource, ProgressReporter};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::limiter::RateLimiter;
    use crate::mock::{MockRemote, init_status};

    fn token() -> UploadToken {
        UploadToken {
            endpoint: "http://oss-cn-shenzhen.aliyuncs.com".into(),
            access_key_id: "id".into(),
            access_key_secret: "secret".into(),
            security_token: "sts".into(),
            expiration: String::new(),
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            backoff_factor: 2.0,
        }
    }

    fn recorder() -> (ProgressReporter, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(move |p| sink.lock().unwrap().push(p));
        (reporter, seen)
    }

    async fn run(
        executor: &TransferExecutor,
        mock: &MockRemote,
        data: Vec<u8>,
        progress: &ScaledProgress,
    ) -> Result<usize, DriverError> {
        let limiter = RateLimiter::disabled();
        let cancel = CancellationToken::new();
        let session = Session {
            remote: mock,
            limiter: &limiter,
            cancel: &cancel,
        };
        let source = MemorySource::new("big.bin", data);
        executor
            .run(session, &source, &token(), &init_status(1), progress)
            .await
    }

    #[tokio::test]
    async fn parts_cover_source_in_order() {
        let mock = MockRemote::default();
        let data: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
        let (reporter, seen) = recorder();
        let executor = TransferExecutor::new(fast_retry(3), 1).with_part_size(1000);

        let parts = run(&executor, &mock, data.clone(), &reporter.scaled(40, 99))
            .await
            .unwrap();

        assert_eq!(parts, 3);
        let sent = mock.parts.lock().unwrap().clone();
        let lengths: Vec<usize> = sent.iter().map(|(_, d)| d.len()).collect();
        assert_eq!(lengths, vec![1000, 1000, 500]);
        let joined: Vec<u8> = sent.into_iter().flat_map(|(_, d)| d).collect();
        assert_eq!(joined, data);

        let completed = mock.completed.lock().unwrap().clone();
        let numbers: Vec<u32> = completed.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(mock.calls().first(), Some(&"oss_initiate"));
        assert_eq!(mock.calls().last(), Some(&"oss_complete"));

        let seen = seen.lock().unwrap().clone();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&99));
        assert!(seen.iter().all(|p| (40..=99).contains(p)));
    }

    #[tokio::test]
    async fn parallel_parts_complete_sorted() {
        let mock = MockRemote::default();
        let data = vec![7u8; 10 * 64];
        let executor = TransferExecutor::new(fast_retry(3), 4).with_part_size(64);

        let parts = run(&executor, &mock, data, &ProgressReporter::noop().scaled(40, 99))
            .await
            .unwrap();

        assert_eq!(parts, 10);
        assert_eq!(mock.count("oss_upload_part"), 10);
        let numbers: Vec<u32> = mock.completed.lock().unwrap().iter().map(|p| p.number).collect();
        assert_eq!(numbers, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_part_is_retried() {
        let mock = MockRemote::default();
        mock.part_failures.lock().unwrap().insert(2, 2);
        let executor = TransferExecutor::new(fast_retry(3), 1).with_part_size(10);

        let parts = run(&executor, &mock, vec![1u8; 30], &ProgressReporter::noop().scaled(40, 99))
            .await
            .unwrap();

        assert_eq!(parts, 3);
        assert_eq!(mock.count("oss_upload_part"), 5);
        assert_eq!(mock.count("oss_complete"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let mock = MockRemote::default();
        mock.part_failures.lock().unwrap().insert(1, 10);
        let executor = TransferExecutor::new(fast_retry(3), 1).with_part_size(10);

        let err = run(&executor, &mock, vec![1u8; 10], &ProgressReporter::noop().scaled(40, 99))
            .await
            .unwrap_err();

        assert!(matches!(err, DriverError::Remote { code: 503, .. }));
        assert_eq!(mock.count("oss_upload_part"), 3);
        assert_eq!(mock.count("oss_complete"), 0);
    }

    #[tokio::test]
    async fn empty_source_puts_empty_object() {
        let mock = MockRemote::default();
        let (reporter, seen) = recorder();
        let executor = TransferExecutor::new(fast_retry(3), 2);

        let parts = run(&executor, &mock, Vec::new(), &reporter.scaled(40, 99))
            .await
            .unwrap();

        assert_eq!(parts, 0);
        assert_eq!(mock.calls(), vec!["oss_put_empty"]);
        assert_eq!(*seen.lock().unwrap(), vec![99]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff() {
        let mock = MockRemote::default();
        mock.part_failures.lock().unwrap().insert(1, 10);
        let executor = TransferExecutor::new(
            RetryConfig {
                initial_delay: Duration::from_secs(30),
                max_delay: Duration::from_secs(30),
                ..fast_retry(5)
            },
            1,
        )
        .with_part_size(10);
        let limiter = RateLimiter::disabled();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let session = Session {
            remote: &mock,
            limiter: &limiter,
            cancel: &cancel,
        };
        let source = MemorySource::new("a", vec![0u8; 10]);

        let err = executor
            .run(
                session,
                &source,
                &token(),
                &init_status(1),
                &ProgressReporter::noop().scaled(40, 99),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DriverError::Cancelled));
        assert_eq!(mock.count("oss_upload_part"), 1);
    }
}
