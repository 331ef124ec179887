//! Page-granular disk I/O.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use granite_common::types::PageId;
use parking_lot::Mutex;

use super::error::{IoError, IoResult};

/// Manages page reads and writes against a single data file.
///
/// Pages live at `page_id * page_size` offsets. Page ids are issued
/// monotonically by [`DiskManager::allocate_page`]; deallocated ids are
/// recycled before the cursor advances.
///
/// The underlying file sits behind a mutex, so the manager is safe to share
/// between threads at its own interface.
pub struct DiskManager {
    /// The data file, guarded for seek + read/write pairs.
    file: Mutex<File>,
    /// Path of the data file.
    path: PathBuf,
    /// Page size in bytes. All I/O happens in units of this size.
    page_size: usize,
    /// Next page id to issue when the free set is empty.
    next_page_id: AtomicU64,
    /// Deallocated page ids available for reuse.
    free_pages: Mutex<Vec<PageId>>,
}

impl DiskManager {
    /// Creates a new data file at `path`, truncating any existing one.
    pub fn create(path: impl AsRef<Path>, page_size: usize) -> IoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| IoError::from_io_with_path(e, &path))?;

        Ok(Self {
            file: Mutex::new(file),
            path,
            page_size,
            next_page_id: AtomicU64::new(0),
            free_pages: Mutex::new(Vec::new()),
        })
    }

    /// Opens an existing data file, deriving the allocation cursor from the
    /// file length.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> IoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| IoError::from_io_with_path(e, &path))?;

        let len = file.metadata()?.len();
        let next = len.div_ceil(page_size as u64);

        Ok(Self {
            file: Mutex::new(file),
            path,
            page_size,
            next_page_id: AtomicU64::new(next),
            free_pages: Mutex::new(Vec::new()),
        })
    }

    /// Returns the path of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the page size this manager was configured with.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fills `buf` with the on-disk contents of `page_id`.
    ///
    /// A page that was allocated but never written reads back as zeroes:
    /// reads past the current end of file zero-fill the remainder of the
    /// buffer.
    pub fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> IoResult<()> {
        if buf.len() != self.page_size {
            return Err(IoError::buffer_size(self.page_size, buf.len()));
        }
        let offset = self.page_offset(page_id);

        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        if offset >= len {
            buf.fill(0);
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        let readable = ((len - offset) as usize).min(self.page_size);
        file.read_exact(&mut buf[..readable])?;
        buf[readable..].fill(0);
        Ok(())
    }

    /// Durably writes `buf` as the contents of `page_id`.
    pub fn write_page(&self, page_id: PageId, buf: &[u8]) -> IoResult<()> {
        if buf.len() != self.page_size {
            return Err(IoError::buffer_size(self.page_size, buf.len()));
        }
        let offset = self.page_offset(page_id);

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        file.sync_data()?;
        Ok(())
    }

    /// Reserves and returns a fresh page id.
    ///
    /// Recycles the most recently deallocated id when one is available.
    pub fn allocate_page(&self) -> IoResult<PageId> {
        if let Some(page_id) = self.free_pages.lock().pop() {
            return Ok(page_id);
        }
        Ok(PageId::new(self.next_page_id.fetch_add(1, Ordering::SeqCst)))
    }

    /// Releases a page id; its storage may be reused by a later allocation.
    pub fn deallocate_page(&self, page_id: PageId) {
        self.free_pages.lock().push(page_id);
    }

    /// Returns the number of page ids issued so far (the allocation cursor).
    pub fn allocated_pages(&self) -> u64 {
        self.next_page_id.load(Ordering::SeqCst)
    }

    /// Flushes all file data and metadata to stable storage.
    pub fn sync(&self) -> IoResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn page_offset(&self, page_id: PageId) -> u64 {
        page_id.as_u64() * self.page_size as u64
    }
}

impl std::fmt::Debug for DiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskManager")
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .field("next_page_id", &self.allocated_pages())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE_SIZE: usize = 4096;

    fn create_test_manager(dir: &tempfile::TempDir) -> DiskManager {
        DiskManager::create(dir.path().join("test.db"), PAGE_SIZE).unwrap()
    }

    #[test]
    fn test_write_read_round_trip() {
        let dir = tempdir().unwrap();
        let disk = create_test_manager(&dir);

        let mut page = vec![0u8; PAGE_SIZE];
        page[0..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        disk.write_page(PageId::new(3), &page).unwrap();

        let mut out = vec![0u8; PAGE_SIZE];
        disk.read_page(PageId::new(3), &mut out).unwrap();
        assert_eq!(out, page);
    }

    #[test]
    fn test_unwritten_page_reads_zeroes() {
        let dir = tempdir().unwrap();
        let disk = create_test_manager(&dir);

        let mut out = vec![0xffu8; PAGE_SIZE];
        disk.read_page(PageId::new(10), &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_buffer_size_mismatch() {
        let dir = tempdir().unwrap();
        let disk = create_test_manager(&dir);

        let mut small = vec![0u8; 16];
        let err = disk.read_page(PageId::new(0), &mut small).unwrap_err();
        assert!(matches!(err, IoError::BufferSize { .. }));

        let err = disk.write_page(PageId::new(0), &small).unwrap_err();
        assert!(matches!(err, IoError::BufferSize { .. }));
    }

    #[test]
    fn test_allocate_is_monotonic() {
        let dir = tempdir().unwrap();
        let disk = create_test_manager(&dir);

        let a = disk.allocate_page().unwrap();
        let b = disk.allocate_page().unwrap();
        assert_eq!(a, PageId::new(0));
        assert_eq!(b, PageId::new(1));
        assert_eq!(disk.allocated_pages(), 2);
    }

    #[test]
    fn test_deallocate_recycles_id() {
        let dir = tempdir().unwrap();
        let disk = create_test_manager(&dir);

        let a = disk.allocate_page().unwrap();
        let _b = disk.allocate_page().unwrap();
        disk.deallocate_page(a);

        let c = disk.allocate_page().unwrap();
        assert_eq!(c, a);
        // Cursor did not advance for the recycled id
        assert_eq!(disk.allocated_pages(), 2);
    }

    #[test]
    fn test_open_existing_derives_cursor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let disk = DiskManager::create(&path, PAGE_SIZE).unwrap();
            let page = vec![7u8; PAGE_SIZE];
            disk.write_page(PageId::new(4), &page).unwrap();
            disk.sync().unwrap();
        }

        let disk = DiskManager::open(&path, PAGE_SIZE).unwrap();
        assert_eq!(disk.allocated_pages(), 5);

        let mut out = vec![0u8; PAGE_SIZE];
        disk.read_page(PageId::new(4), &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 7));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let err = DiskManager::open(dir.path().join("missing.db"), PAGE_SIZE).unwrap_err();
        assert!(err.is_not_found());
    }
}
