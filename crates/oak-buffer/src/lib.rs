//! Buffer pool management for OakDB.
//!
//! This crate provides in-memory extent caching with:
//! - Fixed-size buffer pool with configurable frame count
//! - Clock eviction restricted to unpinned frames
//! - Pin counting and dirty tracking per frame
//! - Write-back through the owned extent store

mod frame;
mod pool;
mod replacer;
mod table;

pub use frame::{BufferFrame, FrameId};
pub use pool::{BufferHandle, BufferPool, BufferPoolConfig, BufferPoolStats};
pub use replacer::{ClockReplacer, Replacer};
pub use table::ExtentTable;
