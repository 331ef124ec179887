//! Buffer pool manager for GraniteDB.
//!
//! The buffer pool manages a fixed-size pool of in-memory page frames:
//!
//! - **Page caching**: page-table lookup from page id to frame
//! - **Pin/unpin**: reference counting of live client handles
//! - **Dirty tracking**: modified pages are written back before their
//!   frame is reused
//! - **LRU eviction**: the least-recently-unpinned frame is the next
//!   victim when the free list is empty
//!
//! A single mutex serializes every public pool operation, including the
//! disk I/O performed during eviction and loading.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use granite_storage::buffer::{BufferPool, BufferPoolConfig};
//! use granite_storage::disk::{DiskManager, LogManager};
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let disk = Arc::new(DiskManager::create("data.db", 8192)?);
//!     let log = Arc::new(LogManager::new("data.log")?);
//!     let pool = BufferPool::new(BufferPoolConfig::new(64), disk, log)?;
//!
//!     let mut page = pool.new_page()?;
//!     let page_id = page.page_id();
//!     page.data_mut()[0..5].copy_from_slice(b"hello");
//!     drop(page);
//!
//!     // Every successful fetch or new-page call is unpinned exactly once.
//!     pool.unpin_page(page_id, true)?;
//!     pool.flush_page(page_id)?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod frame;
mod handle;
mod pool;
mod replacer;

pub use config::BufferPoolConfig;
pub use error::{BufferError, BufferResult};
pub use frame::{BufferFrame, FrameId};
pub use handle::PageHandle;
pub use pool::BufferPool;
pub use replacer::{LruReplacer, Replacer};

/// Statistics for buffer pool monitoring.
#[derive(Debug, Clone, Default)]
pub struct BufferPoolStats {
    /// Total number of page fetches.
    pub fetches: u64,
    /// Number of fetches served from memory.
    pub hits: u64,
    /// Number of fetches that required a disk read.
    pub misses: u64,
    /// Number of pages evicted from their frame.
    pub evictions: u64,
    /// Number of dirty pages written back.
    pub flushes: u64,
    /// Current number of pinned frames.
    pub pinned_frames: usize,
    /// Current number of dirty frames.
    pub dirty_frames: usize,
}

impl BufferPoolStats {
    /// Returns the cache hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        if self.fetches == 0 {
            0.0
        } else {
            self.hits as f64 / self.fetches as f64
        }
    }
}
