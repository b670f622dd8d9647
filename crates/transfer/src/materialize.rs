use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use sha1::{Digest, Sha1};
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::TransferError;
use crate::hash::{ContentDigest, HASH_BUF_SIZE};
use crate::source::{ByteSource, RangeReader, StreamSource, check_range, open_file_range};

/// A captured stream backed by a local temporary file.
///
/// The file is removed when this value is dropped.
#[derive(Debug)]
pub struct MaterializedSource {
    name: String,
    size: u64,
    file: NamedTempFile,
}

impl MaterializedSource {
    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl ByteSource for MaterializedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn range_read(
        &self,
        offset: u64,
        length: u64,
    ) -> Pin<Box<dyn Future<Output = Result<RangeReader, TransferError>> + Send + '_>> {
        Box::pin(async move {
            check_range(offset, length, self.size)?;
            open_file_range(self.file.path(), offset, length).await
        })
    }
}

/// Captures a single-pass stream into a temporary file, hashing as it goes.
///
/// Consumes the stream. `on_read` receives the running byte count. The
/// stream must yield exactly its declared size.
pub async fn materialize<F>(
    stream: StreamSource,
    mut on_read: F,
    cancel: &CancellationToken,
) -> Result<(MaterializedSource, ContentDigest), TransferError>
where
    F: FnMut(u64),
{
    let (name, size, mut reader) = stream.into_parts();
    let file = tempfile::Builder::new().prefix("open115-").tempfile()?;
    let mut out = tokio::fs::File::from_std(file.as_file().try_clone()?);
    debug!(file = %name, size, path = %file.path().display(), "materializing stream");

    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];
    let mut total: u64 = 0;
    loop {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            n = reader.read(&mut buf) => n?,
        };
        if n == 0 {
            break;
        }
        if total + n as u64 > size {
            return Err(size_mismatch(total + n as u64, size));
        }
        hasher.update(&buf[..n]);
        out.write_all(&buf[..n]).await?;
        total += n as u64;
        on_read(total);
    }
    out.flush().await?;

    if total != size {
        return Err(size_mismatch(total, size));
    }

    let digest = ContentDigest::from_hasher(hasher);
    debug!(file = %name, size, sha1 = %digest, "stream materialized");
    Ok((MaterializedSource { name, size, file }, digest))
}

fn size_mismatch(seen: u64, size: u64) -> TransferError {
    std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("stream yielded {seen} bytes, expected {size}"),
    )
    .into()
}
