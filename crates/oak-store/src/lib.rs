//! Extent-addressed file storage for OakDB.
//!
//! This crate provides the lowest storage layer: a single file divided
//! into fixed-size extents, with append-style reservation and random
//! extent I/O. Extent 0 is reserved for the storage header.

mod store;

pub use store::ExtentStore;
