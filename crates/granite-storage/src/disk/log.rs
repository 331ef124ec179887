//! Append-only log manager.
//!
//! The buffer pool holds a reference to the log manager so that a later
//! write-ahead-log integration can flush log records before dirty pages are
//! written back. The core itself never appends; the surface here is the
//! smallest one that is real: buffered appends with explicit flush and LSN
//! accounting.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use granite_common::constants::MAX_LOG_RECORD_SIZE;
use granite_common::types::Lsn;
use parking_lot::Mutex;

use super::error::{IoError, IoResult};

/// In-memory tail of the log: bytes not yet on disk and the LSN of the last
/// record among them.
struct LogBuffer {
    bytes: Vec<u8>,
    last_lsn: Lsn,
}

/// Write-ahead log manager.
///
/// Records are length-prefixed and assigned monotonically increasing LSNs at
/// append time. [`LogManager::flush`] writes the buffered tail to the log
/// file and fsyncs it.
pub struct LogManager {
    /// The log file.
    file: Mutex<std::fs::File>,
    /// Path of the log file.
    path: PathBuf,
    /// Buffered records awaiting flush.
    buffer: Mutex<LogBuffer>,
    /// Next LSN to assign.
    next_lsn: AtomicU64,
    /// Highest LSN known to be on disk.
    flushed_lsn: AtomicU64,
}

impl LogManager {
    /// Creates a log manager appending to the file at `path`.
    pub fn new(path: impl AsRef<Path>) -> IoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| IoError::from_io_with_path(e, &path))?;

        Ok(Self {
            file: Mutex::new(file),
            path,
            buffer: Mutex::new(LogBuffer {
                bytes: Vec::new(),
                last_lsn: Lsn::INVALID,
            }),
            next_lsn: AtomicU64::new(Lsn::FIRST.as_u64()),
            flushed_lsn: AtomicU64::new(Lsn::INVALID.as_u64()),
        })
    }

    /// Returns the path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a record to the log buffer and returns its LSN.
    ///
    /// The record is not durable until [`LogManager::flush`] returns.
    pub fn append(&self, record: &[u8]) -> IoResult<Lsn> {
        if record.len() > MAX_LOG_RECORD_SIZE {
            return Err(IoError::RecordTooLarge {
                size: record.len(),
                max: MAX_LOG_RECORD_SIZE,
            });
        }

        let mut buffer = self.buffer.lock();
        let lsn = Lsn::new(self.next_lsn.fetch_add(1, Ordering::SeqCst));
        buffer.bytes.extend_from_slice(&(record.len() as u32).to_le_bytes());
        buffer.bytes.extend_from_slice(record);
        buffer.last_lsn = lsn;
        Ok(lsn)
    }

    /// Writes all buffered records to the log file and fsyncs it.
    pub fn flush(&self) -> IoResult<()> {
        let (bytes, last_lsn) = {
            let mut buffer = self.buffer.lock();
            if buffer.bytes.is_empty() {
                return Ok(());
            }
            (std::mem::take(&mut buffer.bytes), buffer.last_lsn)
        };

        let mut file = self.file.lock();
        file.write_all(&bytes)?;
        file.sync_data()?;
        self.flushed_lsn.store(last_lsn.as_u64(), Ordering::SeqCst);
        tracing::debug!(lsn = %last_lsn, bytes = bytes.len(), "flushed log records");
        Ok(())
    }

    /// Returns the next LSN that will be assigned.
    pub fn next_lsn(&self) -> Lsn {
        Lsn::new(self.next_lsn.load(Ordering::SeqCst))
    }

    /// Returns the highest LSN known to be on disk.
    pub fn flushed_lsn(&self) -> Lsn {
        Lsn::new(self.flushed_lsn.load(Ordering::SeqCst))
    }
}

impl std::fmt::Debug for LogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogManager")
            .field("path", &self.path)
            .field("next_lsn", &self.next_lsn())
            .field("flushed_lsn", &self.flushed_lsn())
            .finish()
    }
}
