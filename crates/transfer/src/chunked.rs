use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::TransferError;

/// Byte offset of `part_number` (1-based) for a fixed `chunk_size`.
pub fn part_offset(part_number: u32, chunk_size: u64) -> u64 {
    u64::from(part_number.saturating_sub(1)) * chunk_size
}

// ---------------------------------------------------------------------------
// PartReader
// ---------------------------------------------------------------------------

/// Shared random-access reader over one source file.
///
/// Clones share the same OS handle; reads are positional so concurrent
/// parts never contend on a cursor. The handle closes when the last clone
/// is dropped.
#[derive(Debug, Clone)]
pub struct PartReader {
    file: Arc<File>,
    file_size: u64,
    chunk_size: u64,
}

impl PartReader {
    /// Opens `path` for part reads of `chunk_size` bytes.
    pub fn open(path: &Path, chunk_size: u64) -> Result<Self, TransferError> {
        let file = File::open(path)?;
        Self::from_file(file, chunk_size)
    }

    /// Wraps an already-open file.
    pub fn from_file(file: File, chunk_size: u64) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize(chunk_size));
        }
        let file_size = file.metadata()?.len();
        Ok(Self {
            file: Arc::new(file),
            file_size,
            chunk_size,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Number of parts needed to cover the file.
    pub fn part_count(&self) -> u32 {
        self.file_size.div_ceil(self.chunk_size) as u32
    }

    /// Reads the bytes of `part_number`. The final part may be short.
    pub fn read_part(&self, part_number: u32) -> Result<Vec<u8>, TransferError> {
        if part_number == 0 {
            return Err(TransferError::InvalidParts("part numbers start at 1".into()));
        }
        let offset = part_offset(part_number, self.chunk_size);
        if offset >= self.file_size {
            return Err(TransferError::PartOutOfRange(part_number));
        }

        let len = self.chunk_size.min(self.file_size - offset) as usize;
        let mut buf = vec![0u8; len];
        let n = read_up_to_at(&self.file, &mut buf, offset)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Reads `part_number` on the blocking pool.
    pub async fn read_part_async(&self, part_number: u32) -> Result<Vec<u8>, TransferError> {
        let reader = self.clone();
        tokio::task::spawn_blocking(move || reader.read_part(part_number))
            .await
            .map_err(|e| TransferError::Join(e.to_string()))?
    }
}

/// Fills `buf` from `offset` until it is full or the file ends.
fn read_up_to_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match read_at(file, &mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}
