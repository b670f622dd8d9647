//! Upload-side data handling: byte sources, SHA-1 content digests,
//! stream materialization, part planning and progress reporting.

mod hash;
mod materialize;
mod parts;
mod progress;
mod source;

pub use hash::{ContentDigest, digest_bytes, digest_full, digest_prefix, digest_range, digest_reader};
pub use materialize::{MaterializedSource, materialize};
pub use parts::{DEFAULT_PART_SIZE, MAX_PART_COUNT, Part, part_size_for, plan_parts};
pub use progress::{ProgressCallback, ProgressReporter, ScaledProgress, SpeedCalculator};
pub use source::{
    ByteSource, FileSource, MemorySource, RangeReader, StreamSource, UploadSource, check_range,
    read_range,
};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("range {offset}+{length} outside source of {size} bytes")]
    RangeOutOfBounds { offset: u64, length: u64, size: u64 },

    #[error("cancelled")]
    Cancelled,
}
