//! Fixed-width binary encoding for page-resident scalars.

use crate::extent::ExtentId;

/// A value with a compile-time-known encoded size that can be placed in a
/// page slot.
///
/// Index pages store keys and values as packed arrays of fixed-width
/// encodings; this trait is the boundary between typed values and page
/// bytes. Keys additionally require `Ord`; comparisons are always made on
/// decoded values, never on raw bytes.
pub trait FixedCodec: Copy {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Writes the value into `buf`, which is exactly `SIZE` bytes.
    fn encode(&self, buf: &mut [u8]);

    /// Reads a value from `buf`, which is exactly `SIZE` bytes.
    fn decode(buf: &[u8]) -> Self;
}

macro_rules! impl_fixed_codec_int {
    ($($t:ty),*) => {
        $(
            impl FixedCodec for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                #[inline]
                fn encode(&self, buf: &mut [u8]) {
                    buf[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode(buf: &[u8]) -> Self {
                    <$t>::from_le_bytes(buf[..Self::SIZE].try_into().unwrap())
                }
            }
        )*
    };
}

impl_fixed_codec_int!(i32, i64, u32, u64);

impl FixedCodec for ExtentId {
    const SIZE: usize = 8;

    #[inline]
    fn encode(&self, buf: &mut [u8]) {
        self.0.encode(buf);
    }

    #[inline]
    fn decode(buf: &[u8]) -> Self {
        ExtentId(u64::decode(buf))
    }
}
