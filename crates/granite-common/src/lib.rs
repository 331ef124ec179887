//! # granite-common
//!
//! Common types and constants for GraniteDB.
//!
//! This crate provides the foundational pieces shared by the storage
//! components:
//!
//! - **Types**: Core identifiers (`PageId`, `Lsn`)
//! - **Constants**: Page and buffer pool sizing
//!
//! ## Example
//!
//! ```rust
//! use granite_common::types::{Lsn, PageId};
//!
//! let page_id = PageId::new(42);
//! assert!(page_id.is_valid());
//! assert!(!Lsn::INVALID.is_valid());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use types::{Lsn, PageId};
