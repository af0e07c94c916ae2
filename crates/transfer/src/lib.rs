//! Chunk planning and byte-range file access for chunked VDR uploads.
//!
//! [`plan`] partitions a file length into the numbered chunks the wire
//! protocol expects. [`FileHandle`] is the read-only source the uploader
//! pulls those byte ranges from.

mod chunked;
mod plan;
mod progress;

pub use chunked::{FileHandle, LocalFile, MemoryFile, checksum_bytes};
pub use plan::{ChunkDescriptor, ChunkPlan, plan, plan_with_threshold};
pub use progress::SpeedCalculator;

pub use vdrlink_protocol::constants::{CHUNK_SIZE, SINGLE_SHOT_THRESHOLD};
