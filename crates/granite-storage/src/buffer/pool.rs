//! Buffer pool implementation.
//!
//! The buffer pool manages a fixed-size cache of pages in memory,
//! mediating every page access: fetch, allocation, write-back, and
//! deletion. A single mutex over the page table and free list serializes
//! all public operations end to end, including the disk I/O performed
//! during eviction and loading.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use granite_common::types::PageId;
use parking_lot::Mutex;

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::frame::{BufferFrame, FrameId};
use super::handle::PageHandle;
use super::replacer::{LruReplacer, Replacer};
use super::BufferPoolStats;
use crate::disk::{DiskManager, LogManager};

/// Mutable pool state guarded by the coarse lock.
///
/// The page table holds exactly one entry per resident frame; a frame is on
/// the free list iff it is absent from the page table.
struct PoolState {
    /// Maps resident page ids to their frames.
    page_table: HashMap<PageId, FrameId>,
    /// Unbound frames immediately available for binding.
    free_list: VecDeque<FrameId>,
}

/// The buffer pool manager.
///
/// Owns the frame array, the page table, the free list, and coordinates
/// with the replacer and disk manager to satisfy page requests. Clients
/// request pages by id; the pool serves from memory or transparently loads
/// from disk, evicting the least-recently-unpinned victim when no frame is
/// free. Dirty frames are written back before their slot is reused.
///
/// Handles returned by [`fetch_page`](Self::fetch_page) and
/// [`new_page`](Self::new_page) keep the frame pinned; clients must call
/// [`unpin_page`](Self::unpin_page) exactly once per handle.
pub struct BufferPool {
    /// Configuration.
    config: BufferPoolConfig,
    /// Array of buffer frames, exactly `num_frames` slots.
    frames: Vec<Arc<BufferFrame>>,
    /// Page table and free list, guarded by the pool's single lock.
    state: Mutex<PoolState>,
    /// Victim-selection policy over unpinned frames.
    replacer: Box<dyn Replacer>,
    /// Disk manager for page I/O and id allocation.
    disk: Arc<DiskManager>,
    /// Log manager, held so a later write-ahead integration can flush log
    /// records before dirty pages are written back. Not invoked here.
    log: Arc<LogManager>,
    /// Fetch counter for statistics.
    fetch_count: AtomicU64,
    /// Hit counter for statistics.
    hit_count: AtomicU64,
    /// Miss counter for statistics.
    miss_count: AtomicU64,
    /// Eviction counter for statistics.
    eviction_count: AtomicU64,
    /// Flush counter for statistics.
    flush_count: AtomicU64,
}

impl BufferPool {
    /// Creates a buffer pool with an LRU replacer of matching size.
    pub fn new(
        config: BufferPoolConfig,
        disk: Arc<DiskManager>,
        log: Arc<LogManager>,
    ) -> BufferResult<Self> {
        let replacer = Box::new(LruReplacer::new(config.num_frames));
        Self::with_replacer(config, replacer, disk, log)
    }

    /// Creates a buffer pool with a caller-supplied replacement policy.
    pub fn with_replacer(
        config: BufferPoolConfig,
        replacer: Box<dyn Replacer>,
        disk: Arc<DiskManager>,
        log: Arc<LogManager>,
    ) -> BufferResult<Self> {
        config.validate().map_err(BufferError::config)?;
        if disk.page_size() != config.page_size {
            return Err(BufferError::config(
                "disk manager page size does not match pool page size",
            ));
        }

        let num_frames = config.num_frames;
        let frames: Vec<Arc<BufferFrame>> = (0..num_frames)
            .map(|i| Arc::new(BufferFrame::new(FrameId::new(i), config.page_size)))
            .collect();

        // Initially, every frame is on the free list.
        Ok(Self {
            config,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(num_frames),
                free_list: (0..num_frames).map(FrameId::new).collect(),
            }),
            replacer,
            disk,
            log,
            fetch_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        })
    }

    /// Fetches the page with the given id, pinning its frame.
    ///
    /// Serves from memory when the page is resident (a resident page with
    /// pin count zero is pinned back in); otherwise loads it from disk
    /// into a frame taken from the free list or, failing that, evicted
    /// from the replacer. Returns [`BufferError::NoFreeFrames`] when every
    /// frame is pinned, with no state mutated.
    pub fn fetch_page(&self, page_id: PageId) -> BufferResult<PageHandle> {
        if !page_id.is_valid() {
            return Err(BufferError::InvalidPageId { page_id });
        }

        let mut state = self.state.lock();
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            let frame = &self.frames[frame_id.index()];
            frame.pin();
            self.replacer.pin(frame_id);
            tracing::trace!(%page_id, frame_id = frame_id.index(), "fetch hit");
            return Ok(PageHandle::new(Arc::clone(frame)));
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let frame_id = self
            .take_frame(&mut state)
            .ok_or(BufferError::NoFreeFrames)?;
        let frame = &self.frames[frame_id.index()];

        self.write_back_old_page(&mut state, frame)?;

        frame.set_page_id(page_id);
        state.page_table.insert(page_id, frame_id);
        {
            let mut data = frame.write_data();
            self.disk.read_page(page_id, &mut data)?;
        }
        self.replacer.pin(frame_id);
        frame.pin();
        tracing::trace!(%page_id, frame_id = frame_id.index(), "fetch miss, loaded from disk");

        Ok(PageHandle::new(Arc::clone(frame)))
    }

    /// Releases one pin on the page, optionally marking it dirty.
    ///
    /// `is_dirty` is ORed into the frame's dirty flag; an unpin never
    /// clears it. Unpinning a page that is not resident is a benign no-op.
    /// Returns [`BufferError::NotPinned`] when the pin count was already
    /// zero, which indicates a caller bug.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> BufferResult<()> {
        let state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            tracing::trace!(%page_id, "unpin of non-resident page ignored");
            return Ok(());
        };
        let frame = &self.frames[frame_id.index()];

        if is_dirty {
            frame.set_dirty(true);
        }

        if frame.pin_count() == 0 {
            tracing::warn!(%page_id, "unpin of page with zero pin count");
            return Err(BufferError::NotPinned { page_id });
        }

        if frame.unpin() == 0 {
            self.replacer.unpin(frame_id);
        }
        Ok(())
    }

    /// Writes the page's contents to disk and clears its dirty flag.
    ///
    /// Pin state is untouched. Returns [`BufferError::PageNotFound`] when
    /// the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<()> {
        if !page_id.is_valid() {
            return Err(BufferError::InvalidPageId { page_id });
        }

        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Err(BufferError::page_not_found(page_id));
        };
        let frame = &self.frames[frame_id.index()];

        let data = frame.read_data();
        self.disk.write_page(page_id, &data)?;
        frame.set_dirty(false);
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Allocates a fresh page and pins it in a frame with zeroed contents.
    ///
    /// Returns [`BufferError::NoFreeFrames`] when every frame is pinned.
    /// The saturation check runs before the disk manager allocates an id,
    /// so a rejected call leaks no identifier.
    pub fn new_page(&self) -> BufferResult<PageHandle> {
        let mut state = self.state.lock();

        if self.frames.iter().all(|frame| frame.pin_count() > 0) {
            return Err(BufferError::NoFreeFrames);
        }

        let frame_id = self
            .take_frame(&mut state)
            .ok_or(BufferError::NoFreeFrames)?;
        let frame = &self.frames[frame_id.index()];

        self.write_back_old_page(&mut state, frame)?;

        let page_id = self.disk.allocate_page()?;
        frame.set_page_id(page_id);
        frame.zero();
        frame.pin();
        self.replacer.pin(frame_id);
        state.page_table.insert(page_id, frame_id);
        tracing::trace!(%page_id, frame_id = frame_id.index(), "allocated new page");

        Ok(PageHandle::new(Arc::clone(frame)))
    }

    /// Removes the page from the pool and releases its disk page id.
    ///
    /// A page that is not resident deletes successfully; a pinned page
    /// returns [`BufferError::PagePinned`]. The freed frame is reset and
    /// returned to the free list.
    pub fn delete_page(&self, page_id: PageId) -> BufferResult<()> {
        let mut state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(());
        };
        let frame = &self.frames[frame_id.index()];

        if frame.pin_count() != 0 {
            return Err(BufferError::PagePinned { page_id });
        }

        if frame.is_dirty() {
            let data = frame.read_data();
            self.disk.write_page(page_id, &data)?;
            frame.set_dirty(false);
            self.flush_count.fetch_add(1, Ordering::Relaxed);
        }

        state.page_table.remove(&page_id);
        self.disk.deallocate_page(page_id);
        // Drop the frame's replacer eligibility before recycling the slot.
        self.replacer.pin(frame_id);
        frame.reset();
        frame.zero();
        state.free_list.push_back(frame_id);
        tracing::debug!(%page_id, frame_id = frame_id.index(), "deleted page");
        Ok(())
    }

    /// Writes back every resident dirty page and clears its dirty flag.
    ///
    /// Pin state and the replacer are untouched. Returns the number of
    /// pages written.
    pub fn flush_all(&self) -> BufferResult<usize> {
        let _state = self.state.lock();
        let mut flushed = 0;

        for frame in &self.frames {
            let page_id = frame.page_id();
            if page_id.is_valid() && frame.is_dirty() {
                let data = frame.read_data();
                self.disk.write_page(page_id, &data)?;
                frame.set_dirty(false);
                flushed += 1;
            }
        }

        self.flush_count.fetch_add(flushed as u64, Ordering::Relaxed);
        Ok(flushed)
    }

    /// Returns true if the page is resident in the pool.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Returns the number of frames in the buffer pool.
    pub fn num_frames(&self) -> usize {
        self.config.num_frames
    }

    /// Returns the page size.
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Returns the log manager held for write-ahead-log integration.
    pub fn log_manager(&self) -> &Arc<LogManager> {
        &self.log
    }

    /// Returns the number of frames currently tracked by the replacer.
    pub fn replacer_len(&self) -> usize {
        self.replacer.len()
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned = 0;
        let mut dirty = 0;

        for frame in &self.frames {
            if frame.is_pinned() {
                pinned += 1;
            }
            if frame.is_dirty() {
                dirty += 1;
            }
        }

        BufferPoolStats {
            fetches: self.fetch_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
            pinned_frames: pinned,
            dirty_frames: dirty,
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Chooses a target frame: free list first, else a replacer victim.
    ///
    /// Mutates nothing when neither can supply one.
    fn take_frame(&self, state: &mut PoolState) -> Option<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Some(frame_id);
        }
        self.replacer.victim()
    }

    /// Tears down a chosen frame's previous binding: writes the old page
    /// back if dirty and removes its page-table entry.
    fn write_back_old_page(&self, state: &mut PoolState, frame: &BufferFrame) -> BufferResult<()> {
        let old_page_id = frame.page_id();
        if !old_page_id.is_valid() {
            return Ok(());
        }

        if frame.is_dirty() {
            let data = frame.read_data();
            self.disk.write_page(old_page_id, &data)?;
            frame.set_dirty(false);
            self.flush_count.fetch_add(1, Ordering::Relaxed);
        }
        state.page_table.remove(&old_page_id);
        self.eviction_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(page_id = %old_page_id, frame_id = frame.frame_id().index(), "evicted page");
        Ok(())
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("num_frames", &self.config.num_frames)
            .field("page_size", &self.config.page_size)
            .field("pages_resident", &self.state.lock().page_table.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
impl BufferPool {
    /// Asserts the structural invariants that must hold after every public
    /// operation.
    fn assert_invariants(&self) {
        let state = self.state.lock();

        for (&page_id, &frame_id) in &state.page_table {
            let frame = &self.frames[frame_id.index()];
            assert_eq!(frame.page_id(), page_id, "page table maps to wrong frame");
            assert!(
                !state.free_list.contains(&frame_id),
                "resident frame on free list"
            );
        }

        for &frame_id in &state.free_list {
            let frame = &self.frames[frame_id.index()];
            assert!(frame.is_free(), "free-list frame has a bound page");
            assert_eq!(frame.pin_count(), 0, "free-list frame is pinned");
            assert!(!frame.is_dirty(), "free-list frame is dirty");
        }

        assert_eq!(
            state.free_list.len() + state.page_table.len(),
            self.config.num_frames,
            "free list and page table must partition the frame array"
        );
        assert!(self.replacer.len() <= self.config.num_frames);
    }
}
