use std::fmt::Debug;

use crate::sketch::hyperloglog::estimators::{clz128, clz32, clz64};

/// A hash value of a fixed width, as fed into a HyperLogLog.
///
/// The width is a compile-time choice: `u32`, `u64` and `u128` are supported.
/// Every implementation is built from the 64-bit words emitted by
/// [`nthash_rs::NtHash`], taking [`HashWord::NUM_HASHES`] of them.
pub trait HashWord: Copy + Debug + PartialEq {
    /// Width of the hash, W.
    const BITS: u32;

    /// Number of ntHash words needed per k-mer.
    const NUM_HASHES: u8;

    fn from_hashes(hashes: &[u64]) -> Self;

    /// `(1 << shift) - 1`, for `0 < shift < BITS`.
    fn low_mask(shift: u32) -> Self;

    /// Bucket index: the bits above `shift`.
    fn bucket(self, shift: u32) -> usize;

    fn and(self, mask: Self) -> Self;

    /// Count of leading zeros over `BITS` bits; zero maps to `BITS`.
    fn clz(self) -> u32;
}

macro_rules! impl_hash_word {
    ($t:ty, $from:path, $clz:path) => {
        impl HashWord for $t {
            const BITS: u32 = <$t>::BITS;
            const NUM_HASHES: u8 = ((<$t>::BITS + 63) / 64) as u8;

            #[inline]
            fn from_hashes(hashes: &[u64]) -> Self {
                $from(hashes)
            }

            #[inline]
            fn low_mask(shift: u32) -> Self {
                ((1 as $t) << shift) - 1
            }

            #[inline]
            fn bucket(self, shift: u32) -> usize {
                (self >> shift) as usize
            }

            #[inline]
            fn and(self, mask: Self) -> Self {
                self & mask
            }

            #[inline]
            fn clz(self) -> u32 {
                $clz(self)
            }
        }
    };
}

// 32-bit hashes keep the upper half of the first word.
#[inline]
fn upper_half(words: &[u64]) -> u32 {
    (words[0] >> 32) as u32
}

#[inline]
fn first_word(words: &[u64]) -> u64 {
    words[0]
}

// 128-bit hashes are the concatenation of two consecutive words.
#[inline]
fn two_words(words: &[u64]) -> u128 {
    (u128::from(words[0]) << 64) | u128::from(words[1])
}

impl_hash_word!(u32, upper_half, clz32);
impl_hash_word!(u64, first_word, clz64);
impl_hash_word!(u128, two_words, clz128);
