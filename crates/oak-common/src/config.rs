//! Configuration structures for OakDB storage.

use crate::error::{OakError, Result};
use serde::{Deserialize, Serialize};

/// Magic bytes identifying an OakDB storage file ("OAKS").
const STORAGE_MAGIC: u32 = 0x534b_414f;

/// On-disk format version.
const STORAGE_VERSION: u16 = 1;

/// Storage configuration persisted in the header extent.
///
/// The extent size is fixed at database creation and never renegotiated;
/// every other component derives its page geometry from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Extent size in KiB. Typical values are powers of two: 4, 16, 64.
    pub extent_size_kb: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { extent_size_kb: 4 }
    }
}

impl StorageConfig {
    /// Serialized size of the configuration in the header extent.
    pub const ENCODED_SIZE: usize = 16;

    /// Creates a configuration with the given extent size in KiB.
    pub fn new(extent_size_kb: u32) -> Self {
        Self { extent_size_kb }
    }

    /// Returns the extent size in bytes.
    pub fn extent_size(&self) -> usize {
        self.extent_size_kb as usize * 1024
    }

    /// Checks that the configuration describes a usable storage file.
    pub fn validate(&self) -> Result<()> {
        if self.extent_size_kb == 0 {
            return Err(OakError::Config(
                "extent size must be at least 1 KiB".to_string(),
            ));
        }
        Ok(())
    }

    /// Serializes the configuration to its header layout.
    ///
    /// Layout (16 bytes):
    /// - magic: 4 bytes
    /// - version: 2 bytes
    /// - reserved: 2 bytes
    /// - extent_size_kb: 4 bytes
    /// - reserved: 4 bytes
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_SIZE] {
        let mut buf = [0u8; Self::ENCODED_SIZE];
        buf[0..4].copy_from_slice(&STORAGE_MAGIC.to_le_bytes());
        buf[4..6].copy_from_slice(&STORAGE_VERSION.to_le_bytes());
        buf[8..12].copy_from_slice(&self.extent_size_kb.to_le_bytes());
        buf
    }

    /// Deserializes the configuration from the header extent.
    ///
    /// Fails with `CorruptedPage` for extent 0 when the magic or version
    /// does not match, or the stored size is unusable.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let corrupted = |reason: &str| OakError::CorruptedPage {
            extent_id: 0,
            reason: reason.to_string(),
        };

        if buf.len() < Self::ENCODED_SIZE {
            return Err(corrupted("header extent too short"));
        }

        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != STORAGE_MAGIC {
            return Err(corrupted("bad magic"));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != STORAGE_VERSION {
            return Err(corrupted("unsupported format version"));
        }

        let extent_size_kb = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let config = Self { extent_size_kb };
        config
            .validate()
            .map_err(|_| corrupted("stored extent size is zero"))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.extent_size_kb, 4);
        assert_eq!(config.extent_size(), 4096);
    }

    #[test]
    fn test_storage_config_extent_size() {
        assert_eq!(StorageConfig::new(4).extent_size(), 4 * 1024);
        assert_eq!(StorageConfig::new(16).extent_size(), 16 * 1024);
        assert_eq!(StorageConfig::new(64).extent_size(), 64 * 1024);
    }

    #[test]
    fn test_storage_config_validate() {
        assert!(StorageConfig::new(4).validate().is_ok());
        assert!(matches!(
            StorageConfig::new(0).validate(),
            Err(OakError::Config(_))
        ));
    }

    #[test]
    fn test_storage_config_bytes_roundtrip() {
        for kb in [1, 4, 16, 64, 1024] {
            let original = StorageConfig::new(kb);
            let bytes = original.to_bytes();
            let decoded = StorageConfig::from_bytes(&bytes).unwrap();
            assert_eq!(original, decoded);
        }
    }

    #[test]
    fn test_storage_config_bad_magic() {
        let mut bytes = StorageConfig::default().to_bytes();
        bytes[0] ^= 0xFF;
        let err = StorageConfig::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, OakError::CorruptedPage { extent_id: 0, .. }));
    }

    #[test]
    fn test_storage_config_bad_version() {
        let mut bytes = StorageConfig::default().to_bytes();
        bytes[4] = 0xFF;
        bytes[5] = 0xFF;
        assert!(StorageConfig::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_storage_config_zero_size_rejected() {
        let bytes = StorageConfig::new(0).to_bytes();
        assert!(StorageConfig::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_storage_config_short_buffer() {
        let bytes = StorageConfig::default().to_bytes();
        assert!(StorageConfig::from_bytes(&bytes[..8]).is_err());
    }

    #[test]
    fn test_storage_config_serde_roundtrip() {
        let original = StorageConfig::new(64);
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: StorageConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(original, deserialized);
    }
}
