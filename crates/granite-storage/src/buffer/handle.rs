//! Page handles: borrowed references to pinned frames.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use granite_common::types::PageId;

use super::frame::{BufferFrame, FrameId};

/// A borrowed reference to a pinned page in the buffer pool.
///
/// The handle is valid until the holder unpins the page id through
/// [`BufferPool::unpin_page`](super::BufferPool::unpin_page); every
/// successful fetch or new-page call must be unpinned exactly once.
/// Modifications are signalled through the `is_dirty` argument of that
/// unpin, not through data access.
pub struct PageHandle {
    frame: Arc<BufferFrame>,
}

impl PageHandle {
    pub(crate) fn new(frame: Arc<BufferFrame>) -> Self {
        Self { frame }
    }

    /// Returns the page ID this handle refers to.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.frame.page_id()
    }

    /// Returns the frame ID backing this handle.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Returns the current pin count of the backing frame.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.frame.pin_count()
    }

    /// Returns a read guard over the page data.
    #[inline]
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame.read_data(),
        }
    }

    /// Returns a write guard over the page data.
    ///
    /// Remember to pass `is_dirty = true` when unpinning a page whose
    /// contents were modified.
    #[inline]
    pub fn data_mut(&mut self) -> impl DerefMut<Target = [u8]> + '_ {
        PageDataMut {
            guard: self.frame.write_data(),
        }
    }
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("page_id", &self.page_id())
            .field("frame_id", &self.frame_id())
            .field("pin_count", &self.pin_count())
            .finish()
    }
}

/// Helper struct to provide Deref for page data.
struct PageDataRef<'a> {
    guard: parking_lot::RwLockReadGuard<'a, Vec<u8>>,
}

impl Deref for PageDataRef<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Helper struct to provide DerefMut for page data.
struct PageDataMut<'a> {
    guard: parking_lot::RwLockWriteGuard<'a, Vec<u8>>,
}

impl Deref for PageDataMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for PageDataMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
