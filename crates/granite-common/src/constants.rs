//! System-wide constants for GraniteDB.

// =============================================================================
// Page Constants
// =============================================================================

/// Default page size in bytes (8 KB).
///
/// Balances I/O efficiency with memory usage and matches the typical SSD
/// block size.
pub const DEFAULT_PAGE_SIZE: usize = 8 * 1024;

/// Minimum page size in bytes (4 KB).
pub const MIN_PAGE_SIZE: usize = 4 * 1024;

/// Maximum page size in bytes (64 KB).
pub const MAX_PAGE_SIZE: usize = 64 * 1024;

// =============================================================================
// Buffer Pool Constants
// =============================================================================

/// Default number of frames in the buffer pool.
pub const DEFAULT_POOL_FRAMES: usize = 1024;

/// Minimum buffer pool size in bytes (16 MB).
pub const MIN_BUFFER_POOL_SIZE: usize = 16 * 1024 * 1024;

// =============================================================================
// Log Constants
// =============================================================================

/// Log record length prefix size in bytes.
pub const LOG_RECORD_PREFIX_SIZE: usize = 4;

/// Maximum log record size (10 MB).
pub const MAX_LOG_RECORD_SIZE: usize = 10 * 1024 * 1024;
