use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

use crate::TransferError;

/// A lazy byte sequence produced by [`ByteSource::range_read`].
pub type RangeReader = Pin<Box<dyn AsyncRead + Send>>;

/// A named, sized blob that supports repeatable random-range reads.
///
/// Identical range reads must return identical bytes.
pub trait ByteSource: Send + Sync {
    fn name(&self) -> &str;

    /// Size in bytes, known in advance.
    fn size(&self) -> u64;

    /// Opens a reader over `[offset, offset + length)`.
    fn range_read(
        &self,
        offset: u64,
        length: u64,
    ) -> Pin<Box<dyn Future<Output = Result<RangeReader, TransferError>> + Send + '_>>;
}

/// Fails with [`TransferError::RangeOutOfBounds`] unless `offset + length <= size`.
pub fn check_range(offset: u64, length: u64, size: u64) -> Result<(), TransferError> {
    match offset.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(TransferError::RangeOutOfBounds {
            offset,
            length,
            size,
        }),
    }
}

/// Opens `path`, seeks to `offset` and limits the reader to `length` bytes.
pub(crate) async fn open_file_range(
    path: &Path,
    offset: u64,
    length: u64,
) -> Result<RangeReader, TransferError> {
    let mut file = tokio::fs::File::open(path).await?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }
    Ok(Box::pin(file.take(length)))
}

// ---------------------------------------------------------------------------
// FileSource
// ---------------------------------------------------------------------------

/// A local file.
#[derive(Debug, Clone)]
pub struct FileSource {
    name: String,
    path: PathBuf,
    size: u64,
}

impl FileSource {
    /// Opens `path`, taking the name from its file name and the size from metadata.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, TransferError> {
        let path = path.into();
        let size = tokio::fs::metadata(&path).await?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, path, size })
    }

    /// Replaces the remote file name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
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
            open_file_range(&self.path, offset, length).await
        })
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// An in-memory blob.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl ByteSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn range_read(
        &self,
        offset: u64,
        length: u64,
    ) -> Pin<Box<dyn Future<Output = Result<RangeReader, TransferError>> + Send + '_>> {
        Box::pin(async move {
            check_range(offset, length, self.size())?;
            let start = offset as usize;
            let end = start + length as usize;
            let slice = self.data[start..end].to_vec();
            Ok(Box::pin(std::io::Cursor::new(slice)) as RangeReader)
        })
    }
}

// ---------------------------------------------------------------------------
// StreamSource
// ---------------------------------------------------------------------------

/// A single-pass stream of known size, such as a live network body.
///
/// It cannot be range-read; it must go through
/// [`materialize`](crate::materialize) first, which consumes it.
pub struct StreamSource {
    name: String,
    size: u64,
    reader: RangeReader,
}

impl StreamSource {
    pub fn new(name: impl Into<String>, size: u64, reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            name: name.into(),
            size,
            reader: Box::pin(reader),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn into_parts(self) -> (String, u64, RangeReader) {
        (self.name, self.size, self.reader)
    }
}

impl std::fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSource")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// What a caller hands to an upload.
pub enum UploadSource {
    /// Already supports repeatable range reads.
    Seekable(Box<dyn ByteSource>),
    /// Must be materialized before any range read.
    Stream(StreamSource),
}

impl UploadSource {
    pub fn name(&self) -> &str {
        match self {
            Self::Seekable(s) => s.name(),
            Self::Stream(s) => s.name(),
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Self::Seekable(s) => s.size(),
            Self::Stream(s) => s.size(),
        }
    }
}

impl<S: ByteSource + 'static> From<S> for UploadSource {
    fn from(source: S) -> Self {
        Self::Seekable(Box::new(source))
    }
}

impl From<StreamSource> for UploadSource {
    fn from(source: StreamSource) -> Self {
        Self::Stream(source)
    }
}

/// Reads a whole range into memory.
pub async fn read_range(
    source: &dyn ByteSource,
    offset: u64,
    length: u64,
) -> Result<Vec<u8>, TransferError> {
    let mut reader = source.range_read(offset, length).await?;
    let mut buf = Vec::with_capacity(length as usize);
    reader.read_to_end(&mut buf).await?;
    if buf.len() as u64 != length {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("short read: expected {length} bytes, got {}", buf.len()),
        )
        .into());
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_bounds() {
        assert!(check_range(0, 0, 0).is_ok());
        assert!(check_range(0, 10, 10).is_ok());
        assert!(check_range(9, 1, 10).is_ok());
        assert!(matches!(
            check_range(5, 6, 10),
            Err(TransferError::RangeOutOfBounds { offset: 5, length: 6, size: 10 })
        ));
        assert!(check_range(u64::MAX, 2, 10).is_err());
    }

    #[tokio::test]
    async fn memory_source_ranges() {
        let src = MemorySource::new("m.bin", b"0123456789".to_vec());
        assert_eq!(src.size(), 10);
        assert_eq!(read_range(&src, 2, 3).await.unwrap(), b"234");
        assert_eq!(read_range(&src, 0, 0).await.unwrap(), b"");
        assert!(src.range_read(8, 4).await.is_err());
    }

    #[tokio::test]
    async fn file_source_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let data: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        std::fs::write(&path, &data).unwrap();

        let src = FileSource::open(&path).await.unwrap();
        assert_eq!(src.name(), "data.bin");
        assert_eq!(src.size(), 5000);
        assert_eq!(read_range(&src, 4000, 1000).await.unwrap(), &data[4000..]);
        assert_eq!(read_range(&src, 10, 20).await.unwrap(), &data[10..30]);

        let renamed = src.with_name("remote.bin");
        assert_eq!(renamed.name(), "remote.bin");
    }

    #[tokio::test]
    async fn file_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource::open(dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
    }

    #[test]
    fn upload_source_conversions() {
        let seek: UploadSource = MemorySource::new("a", vec![1, 2, 3]).into();
        assert_eq!(seek.name(), "a");
        assert_eq!(seek.size(), 3);

        let stream: UploadSource = StreamSource::new("b", 4, std::io::Cursor::new(vec![0; 4])).into();
        assert!(matches!(stream, UploadSource::Stream(_)));
        assert_eq!(stream.size(), 4);
    }
}
