//! OakDB common types, errors, and configuration.
//!
//! This crate provides shared definitions used across all OakDB storage
//! components.

pub mod codec;
pub mod config;
pub mod error;
pub mod extent;

pub use codec::FixedCodec;
pub use config::StorageConfig;
pub use error::{OakError, Result};
pub use extent::ExtentId;
