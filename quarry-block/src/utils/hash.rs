//! Utils for hash

use std::hash::{BuildHasher, Hash};

/// Default hash builder
pub type BuildHasherDefault = ahash::RandomState;

/// Constant build hasher default. Seeds are fixed, hash values are stable across
/// processes built from the same source
pub const BUILD_HASHER_DEFAULT: BuildHasherDefault = BuildHasherDefault::with_seeds(9, 7, 9, 8);

/// Hash a single value with [`BUILD_HASHER_DEFAULT`]
#[inline]
pub fn hash_one<T: Hash>(value: T) -> u64 {
    BUILD_HASHER_DEFAULT.hash_one(value)
}

/// Combine the hash of the group with the hash of a value
#[inline]
pub fn combine_hash(group_hash: u64, value_hash: u64) -> u64 {
    group_hash.wrapping_mul(31).wrapping_add(value_hash)
}

/// Extension for float
pub trait FloatExt: num_traits::Float {
    /// Normalize the float, make `NaN`/`-Nan` and `-0.0`/`0.0` consistent
    #[inline]
    fn normalize(self) -> Self {
        if self.is_nan() {
            Self::nan()
        } else if self.is_zero() {
            Self::zero()
        } else {
            self
        }
    }
}

impl FloatExt for f32 {}
impl FloatExt for f64 {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_one(42_i64), hash_one(42_i64));
        assert_ne!(hash_one(42_i64), hash_one(43_i64));
    }

    #[test]
    fn test_normalize() {
        assert_eq!((-0.0_f64).normalize().to_bits(), 0.0_f64.to_bits());
        assert_eq!((-f32::NAN).normalize().to_bits(), f32::NAN.to_bits());
    }
}
