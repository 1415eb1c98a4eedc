//! Native kernels shared by the boxed and the positional calling conventions. Both
//! conventions decode the value into the native representation and call the methods
//! here, hence they always agree

use std::cmp::Ordering;
use std::marker::PhantomData;

use crate::array::{ArrayImpl, PrimitiveType};
use crate::element::ElementImplRef;
use crate::element::timestamp::{LongTimestampTz, unpack_millis_utc};
use crate::utils::hash::{FloatExt, hash_one};

/// Operators on the native representation of a value
pub(crate) trait NativeOperators: Copy {
    /// SQL `=`
    fn native_equal(self, other: Self) -> bool;

    /// Negation of SQL `IS DISTINCT FROM` for non-null values
    #[inline]
    fn native_not_distinct(self, other: Self) -> bool {
        self.native_equal(other)
    }

    fn native_hash(self) -> u64;

    /// Total order
    fn native_compare(self, other: Self) -> Ordering;
}

macro_rules! impl_ord_native {
    ($($ty:ty),+) => {
        $(
            impl NativeOperators for $ty {
                #[inline]
                fn native_equal(self, other: Self) -> bool {
                    self == other
                }

                #[inline]
                fn native_hash(self) -> u64 {
                    hash_one(self)
                }

                #[inline]
                fn native_compare(self, other: Self) -> Ordering {
                    self.cmp(&other)
                }
            }
        )+
    };
}

impl_ord_native!(bool, i8, i16, i32, i64, i128, &[u8]);

macro_rules! impl_float_native {
    ($($ty:ty),+) => {
        $(
            impl NativeOperators for $ty {
                /// IEEE equality: `NaN != NaN` and `-0.0 == 0.0`
                #[inline]
                fn native_equal(self, other: Self) -> bool {
                    self == other
                }

                #[inline]
                fn native_not_distinct(self, other: Self) -> bool {
                    (self.is_nan() && other.is_nan()) || self == other
                }

                #[inline]
                fn native_hash(self) -> u64 {
                    hash_one(self.normalize().to_bits())
                }

                /// `NaN` is greater than all of the other values and `-0.0 == 0.0`
                #[inline]
                fn native_compare(self, other: Self) -> Ordering {
                    self.normalize().total_cmp(&other.normalize())
                }
            }
        )+
    };
}

impl_float_native!(f32, f64);

/// The zone key does not take part in the operators
impl NativeOperators for LongTimestampTz {
    #[inline]
    fn native_equal(self, other: Self) -> bool {
        self.epoch_millis() == other.epoch_millis()
            && self.picos_of_milli() == other.picos_of_milli()
    }

    #[inline]
    fn native_hash(self) -> u64 {
        hash_one((self.epoch_millis(), self.picos_of_milli()))
    }

    #[inline]
    fn native_compare(self, other: Self) -> Ordering {
        self.epoch_millis()
            .cmp(&other.epoch_millis())
            .then(self.picos_of_milli().cmp(&other.picos_of_milli()))
    }
}

/// Decode the values of a logical type into the native representation
pub(crate) trait ValueAccess: 'static {
    type Native<'a>: NativeOperators;

    /// Name shown in the errors
    const NAME: &'static str;

    /// Returns `None` if the element has another physical type
    fn from_element(element: ElementImplRef<'_>) -> Option<Self::Native<'_>>;

    /// Read the value in the flat array. Outer `None` means the array has another
    /// physical type, inner `None` means the value is null
    fn from_flat(array: &ArrayImpl, index: usize) -> Option<Option<Self::Native<'_>>>;
}

/// Values stored in [`PrimitiveArray`](crate::array::PrimitiveArray) as is
pub(crate) struct PrimitiveAccess<T>(PhantomData<fn() -> T>);

impl<T: PrimitiveType + NativeOperators> ValueAccess for PrimitiveAccess<T> {
    type Native<'a> = T;

    const NAME: &'static str = T::NAME;

    #[inline]
    fn from_element(element: ElementImplRef<'_>) -> Option<T> {
        T::from_element(element)
    }

    #[inline]
    fn from_flat(array: &ArrayImpl, index: usize) -> Option<Option<T>> {
        T::downcast(array).map(|array| array.get(index))
    }
}

/// Short timestamp with time zone, operators work on the unpacked millis
pub(crate) enum PackedTimestampTzAccess {}

impl ValueAccess for PackedTimestampTzAccess {
    type Native<'a> = i64;

    const NAME: &'static str = "PackedTimestampTz";

    #[inline]
    fn from_element(element: ElementImplRef<'_>) -> Option<i64> {
        i64::from_element(element).map(unpack_millis_utc)
    }

    #[inline]
    fn from_flat(array: &ArrayImpl, index: usize) -> Option<Option<i64>> {
        i64::downcast(array).map(|array| array.get(index).map(unpack_millis_utc))
    }
}

/// Variable width values, compared lexicographically
pub(crate) enum BinaryAccess {}

impl ValueAccess for BinaryAccess {
    type Native<'a> = &'a [u8];

    const NAME: &'static str = "Binary";

    #[inline]
    fn from_element(element: ElementImplRef<'_>) -> Option<&[u8]> {
        match element {
            ElementImplRef::Binary(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    fn from_flat(array: &ArrayImpl, index: usize) -> Option<Option<&[u8]>> {
        match array {
            ArrayImpl::Binary(array) => Some(array.get(index)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_total_order() {
        let mut values = vec![f64::NAN, 1.0, -0.0, f64::INFINITY, 0.0, -f64::NAN, -1.0];
        values.sort_by(|a, b| a.native_compare(*b));
        assert_eq!(&values[..3], &[-1.0, -0.0, 0.0]);
        assert_eq!(values[4], f64::INFINITY);
        assert!(values[5].is_nan() && values[6].is_nan());
        assert_eq!(f64::NAN.native_compare(-f64::NAN), Ordering::Equal);
    }

    #[test]
    fn test_float_distinct() {
        assert!(!f32::NAN.native_equal(f32::NAN));
        assert!(f32::NAN.native_not_distinct(f32::NAN));
        assert!((-0.0_f32).native_equal(0.0));
        assert_eq!((-0.0_f32).native_hash(), 0.0_f32.native_hash());
        assert_eq!(f32::NAN.native_hash(), (-f32::NAN).native_hash());
    }

    #[test]
    fn test_long_timestamp_tz_ignores_zone() {
        let lhs = LongTimestampTz::try_new(1_000, 5, 1).unwrap();
        let rhs = LongTimestampTz::try_new(1_000, 5, 2000).unwrap();
        assert!(lhs.native_equal(rhs));
        assert_eq!(lhs.native_hash(), rhs.native_hash());

        let later = LongTimestampTz::try_new(1_000, 6, 0).unwrap();
        assert_eq!(lhs.native_compare(later), Ordering::Less);
        let earlier = LongTimestampTz::try_new(999, 999_999_999, 0).unwrap();
        assert_eq!(lhs.native_compare(earlier), Ordering::Greater);
    }
}
