use std::future::Future;
use std::io::{self, SeekFrom};
use std::path::Path;
use std::pin::Pin;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Read-only source of the bytes being uploaded.
///
/// The uploader only ever asks for one chunk-sized range at a time, so
/// implementations need not hold the whole file in memory.
pub trait FileHandle: Send + Sync {
    /// File name reported to the service.
    fn name(&self) -> &str;

    /// Total length in bytes.
    fn total_size(&self) -> u64;

    /// Reads exactly `[offset, offset + length)`.
    ///
    /// A range past the end of the file is an `UnexpectedEof` error.
    fn read_range(
        &self,
        offset: u64,
        length: u64,
    ) -> Pin<Box<dyn Future<Output = io::Result<Vec<u8>>> + Send + '_>>;
}

fn check_range(offset: u64, length: u64, total: u64) -> io::Result<usize> {
    let end = offset
        .checked_add(length)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "range overflows u64"))?;
    if end > total {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("range {offset}..{end} exceeds file size {total}"),
        ));
    }
    usize::try_from(length)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "range too large for memory"))
}

// ---------------------------------------------------------------------------
// LocalFile
// ---------------------------------------------------------------------------

/// A file on disk, read range by range.
pub struct LocalFile {
    file: Mutex<tokio::fs::File>,
    name: String,
    size: u64,
}

impl LocalFile {
    /// Opens `path`. The reported name is the last path component.
    pub async fn open(path: &Path) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self {
            file: Mutex::new(file),
            name,
            size,
        })
    }

    /// Overrides the name sent to the service.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl FileHandle for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn total_size(&self) -> u64 {
        self.size
    }

    fn read_range(
        &self,
        offset: u64,
        length: u64,
    ) -> Pin<Box<dyn Future<Output = io::Result<Vec<u8>>> + Send + '_>> {
        Box::pin(async move {
            let len = check_range(offset, length, self.size)?;
            let mut buf = vec![0u8; len];
            if len == 0 {
                return Ok(buf);
            }

            let mut file = self.file.lock().await;
            file.seek(SeekFrom::Start(offset)).await?;
            file.read_exact(&mut buf).await?;
            Ok(buf)
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryFile
// ---------------------------------------------------------------------------

/// Bytes already in memory.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    data: Vec<u8>,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl FileHandle for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn total_size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(
        &self,
        offset: u64,
        length: u64,
    ) -> Pin<Box<dyn Future<Output = io::Result<Vec<u8>>> + Send + '_>> {
        let result = check_range(offset, length, self.total_size()).map(|len| {
            let start = offset as usize;
            self.data[start..start + len].to_vec()
        });
        Box::pin(async move { result })
    }
}
