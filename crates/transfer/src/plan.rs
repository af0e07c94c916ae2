use vdrlink_protocol::constants::{CHUNK_SIZE, SINGLE_SHOT_THRESHOLD};

/// One contiguous byte range of a file, sent as a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// 1-based sequential index.
    pub number: u32,
    /// Byte offset within the file.
    pub offset: u64,
    /// Size of this chunk in bytes.
    pub length: u64,
}

impl ChunkDescriptor {
    /// Offset one past the last byte of this chunk.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Ordered chunks covering `[0, total_size)` with no gaps or overlaps.
///
/// Never empty: a zero-byte file still has one zero-length chunk so the
/// service receives exactly one call for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunks: Vec<ChunkDescriptor>,
}

impl ChunkPlan {
    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total file size the plan covers.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// `true` when the whole file travels in one request.
    pub fn is_single_shot(&self) -> bool {
        self.chunks.len() == 1
    }

    /// Number of the final chunk (equal to the chunk count).
    pub fn last_number(&self) -> u32 {
        self.chunks.last().map_or(0, |c| c.number)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChunkDescriptor> {
        self.chunks.iter()
    }

    pub fn as_slice(&self) -> &[ChunkDescriptor] {
        &self.chunks
    }
}

impl<'a> IntoIterator for &'a ChunkPlan {
    type Item = &'a ChunkDescriptor;
    type IntoIter = std::slice::Iter<'a, ChunkDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}

/// Plans a file of `total_size` bytes with the protocol's single-shot threshold.
///
/// If `chunk_size` is 0, [`CHUNK_SIZE`] (20 MiB) is used.
pub fn plan(total_size: u64, chunk_size: u64) -> ChunkPlan {
    plan_with_threshold(total_size, chunk_size, SINGLE_SHOT_THRESHOLD)
}

/// Plans a file with an explicit single-shot threshold.
///
/// Files at or below `threshold` get one chunk; larger files are split
/// greedily into `chunk_size` pieces with the last one truncated.
pub fn plan_with_threshold(total_size: u64, chunk_size: u64, threshold: u64) -> ChunkPlan {
    let chunk_size = if chunk_size == 0 {
        CHUNK_SIZE
    } else {
        chunk_size
    };

    if total_size <= threshold {
        return ChunkPlan {
            total_size,
            chunks: vec![ChunkDescriptor {
                number: 1,
                offset: 0,
                length: total_size,
            }],
        };
    }

    let count = total_size.div_ceil(chunk_size);
    let mut chunks = Vec::with_capacity(count as usize);
    let mut offset = 0u64;
    let mut number = 1u32;
    while offset < total_size {
        let length = chunk_size.min(total_size - offset);
        chunks.push(ChunkDescriptor {
            number,
            offset,
            length,
        });
        offset += length;
        number += 1;
    }

    ChunkPlan { total_size, chunks }
}
