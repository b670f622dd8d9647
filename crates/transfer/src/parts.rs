const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;
const TIB: u64 = 1024 * GIB;

/// Part size used below 128 GiB.
pub const DEFAULT_PART_SIZE: u64 = 20 * MIB;

/// Upper bound on the number of parts of one multipart upload.
pub const MAX_PART_COUNT: u64 = 10_000;

/// Chooses the part size for a file of `size` bytes.
///
/// Larger files get larger parts so the count stays within [`MAX_PART_COUNT`].
pub fn part_size_for(size: u64) -> u64 {
    if size > TIB {
        5 * GIB
    } else if size > 768 * GIB {
        109_951_163
    } else if size > 512 * GIB {
        82_463_373
    } else if size > 384 * GIB {
        54_975_582
    } else if size > 256 * GIB {
        41_231_687
    } else if size > 128 * GIB {
        27_487_791
    } else {
        DEFAULT_PART_SIZE
    }
}

/// One part of a multipart upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part {
    /// 1-based part number.
    pub number: u32,
    pub offset: u64,
    pub length: u64,
}

/// Splits `size` bytes into consecutive parts of `part_size`.
///
/// Returns no parts for an empty source.
pub fn plan_parts(size: u64, part_size: u64) -> Vec<Part> {
    let part_size = part_size.max(1);
    let mut parts = Vec::with_capacity(size.div_ceil(part_size) as usize);
    let mut offset = 0;
    let mut number = 1;
    while offset < size {
        let length = part_size.min(size - offset);
        parts.push(Part {
            number,
            offset,
            length,
        });
        offset += length;
        number += 1;
    }
    parts
}
