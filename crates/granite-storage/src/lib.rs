//! # granite-storage
//!
//! Storage layer for GraniteDB: the disk manager and the buffer pool.
//!
//! The buffer pool caches a fixed number of page frames in memory and
//! mediates all page access; the disk layer provides synchronous
//! page-granular I/O underneath it.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Buffer pool manager and eviction policies
pub mod buffer;

/// Disk and log managers
pub mod disk;
