//! Extent addressing for OakDB storage.

use serde::{Deserialize, Serialize};

/// Identifier of an extent within a storage file.
///
/// Extents are addressed densely starting at 0; extent 0 is reserved for
/// the storage header and is never handed out by `reserve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExtentId(pub u64);

impl ExtentId {
    /// Sentinel for "no extent". Used for empty child slots and the tail
    /// of the leaf chain.
    pub const INVALID: ExtentId = ExtentId(u64::MAX);

    /// The reserved header extent.
    pub const HEADER: ExtentId = ExtentId(0);

    /// Returns true if this id refers to an actual extent.
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Returns the raw id.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ExtentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "extent:{}", self.0)
        } else {
            write!(f, "extent:invalid")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_id_validity() {
        assert!(ExtentId(0).is_valid());
        assert!(ExtentId(1).is_valid());
        assert!(!ExtentId::INVALID.is_valid());
    }

    #[test]
    fn test_extent_id_header() {
        assert_eq!(ExtentId::HEADER, ExtentId(0));
        assert_eq!(ExtentId::HEADER.as_u64(), 0);
    }

    #[test]
    fn test_extent_id_display() {
        assert_eq!(ExtentId(42).to_string(), "extent:42");
        assert_eq!(ExtentId::INVALID.to_string(), "extent:invalid");
    }

    #[test]
    fn test_extent_id_ordering() {
        assert!(ExtentId(1) < ExtentId(2));
        // The invalid sentinel sorts above every real id.
        assert!(ExtentId(u64::MAX - 1) < ExtentId::INVALID);
    }

    #[test]
    fn test_extent_id_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(ExtentId(1));
        set.insert(ExtentId(2));
        set.insert(ExtentId(1));

        assert_eq!(set.len(), 2);
    }
}
