use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt};

use open115_protocol::constants::PREHASH_SIZE;

use crate::TransferError;
use crate::source::ByteSource;

/// Read buffer used while hashing.
pub(crate) const HASH_BUF_SIZE: usize = 64 * 1024;

/// A 160-bit SHA-1 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 20]);

impl ContentDigest {
    pub(crate) fn from_hasher(hasher: Sha1) -> Self {
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Upper-case hex, the form the API expects.
    pub fn to_upper_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_upper_hex())
    }
}

impl std::fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentDigest({})", self.to_upper_hex())
    }
}

/// Hashes `reader` to EOF, calling `on_read` with the running byte count.
///
/// Returns the digest and the number of bytes read.
pub async fn digest_reader<R, F>(
    mut reader: R,
    mut on_read: F,
) -> Result<(ContentDigest, u64), TransferError>
where
    R: AsyncRead + Unpin,
    F: FnMut(u64),
{
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];
    let mut total: u64 = 0;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
        on_read(total);
    }
    Ok((ContentDigest::from_hasher(hasher), total))
}

/// Digests the whole source in one ordered pass with bounded memory.
pub async fn digest_full<F>(source: &dyn ByteSource, on_read: F) -> Result<ContentDigest, TransferError>
where
    F: FnMut(u64),
{
    digest_range_with(source, 0, source.size(), on_read).await
}

/// Digests exactly `[offset, offset + length)`.
pub async fn digest_range(
    source: &dyn ByteSource,
    offset: u64,
    length: u64,
) -> Result<ContentDigest, TransferError> {
    digest_range_with(source, offset, length, |_| {}).await
}

/// Digests the first `min(size, 128 KiB)` bytes.
pub async fn digest_prefix(source: &dyn ByteSource) -> Result<ContentDigest, TransferError> {
    digest_range(source, 0, source.size().min(PREHASH_SIZE)).await
}

async fn digest_range_with<F>(
    source: &dyn ByteSource,
    offset: u64,
    length: u64,
    on_read: F,
) -> Result<ContentDigest, TransferError>
where
    F: FnMut(u64),
{
    let reader = source.range_read(offset, length).await?;
    let (digest, read) = digest_reader(reader, on_read).await?;
    if read != length {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("source ended after {read} of {length} bytes"),
        )
        .into());
    }
    Ok(digest)
}

/// Digest of an in-memory buffer.
pub fn digest_bytes(data: &[u8]) -> ContentDigest {
    let mut hasher = Sha1::new();
    hasher.update(data);
    ContentDigest::from_hasher(hasher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    const EMPTY_SHA1: &str = "DA39A3EE5E6B4B0D3255BFEF95601890AFD80709";
    const ABC_SHA1: &str = "A9993E364706816ABA3E25717850C26C9CD0D89D";

    #[test]
    fn known_vectors() {
        assert_eq!(digest_bytes(b"").to_upper_hex(), EMPTY_SHA1);
        assert_eq!(digest_bytes(b"abc").to_upper_hex(), ABC_SHA1);
        assert_eq!(digest_bytes(b"abc").to_string(), ABC_SHA1);
    }

    #[tokio::test]
    async fn full_digest_is_deterministic() {
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        let src = MemorySource::new("d", data.clone());
        let a = digest_full(&src, |_| {}).await.unwrap();
        let b = digest_full(&src, |_| {}).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a, digest_bytes(&data));
    }

    #[tokio::test]
    async fn full_digest_reports_running_count() {
        let src = MemorySource::new("d", vec![7u8; HASH_BUF_SIZE * 2 + 10]);
        let mut seen = Vec::new();
        digest_full(&src, |n| seen.push(n)).await.unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last().copied(), Some((HASH_BUF_SIZE * 2 + 10) as u64));
    }

    #[tokio::test]
    async fn range_digest_matches_slice() {
        let data = b"0123456789abcdefghij".to_vec();
        let src = MemorySource::new("d", data.clone());
        let got = digest_range(&src, 10, 10).await.unwrap();
        assert_eq!(got, digest_bytes(&data[10..20]));
    }

    #[tokio::test]
    async fn prefix_digest_small_and_large() {
        let small = MemorySource::new("s", b"abc".to_vec());
        assert_eq!(digest_prefix(&small).await.unwrap().to_upper_hex(), ABC_SHA1);

        let data = vec![1u8; PREHASH_SIZE as usize + 4096];
        let large = MemorySource::new("l", data.clone());
        assert_eq!(
            digest_prefix(&large).await.unwrap(),
            digest_bytes(&data[..PREHASH_SIZE as usize])
        );
    }

    #[tokio::test]
    async fn empty_source_digests() {
        let src = MemorySource::new("e", Vec::new());
        assert_eq!(digest_full(&src, |_| {}).await.unwrap().to_upper_hex(), EMPTY_SHA1);
        assert_eq!(digest_prefix(&src).await.unwrap().to_upper_hex(), EMPTY_SHA1);
    }

    #[tokio::test]
    async fn out_of_range_fails() {
        let src = MemorySource::new("d", vec![0; 10]);
        assert!(matches!(
            digest_range(&src, 5, 10).await,
            Err(TransferError::RangeOutOfBounds { .. })
        ));
    }
}
