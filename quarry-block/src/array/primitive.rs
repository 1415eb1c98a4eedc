//! [`PrimitiveArray`] that stores fixed byte-width data

use std::fmt::{Debug, Display};
use std::marker::PhantomData;

use bytes::{BufMut, Bytes, BytesMut};
use snafu::ensure;

use super::{
    ArrayImpl, InvalidLogicalTypeSnafu, InvalidValuesLengthSnafu, Result, ValidityLengthSnafu,
};
use crate::bitmap::{Bitmap, MutableBitmap};
use crate::element::ElementImplRef;
use crate::element::timestamp::LongTimestampTz;
use crate::macros::{for_all_native_numbers, for_all_primitive_types};
use crate::private::Sealed;
use crate::types::{LogicalType, PhysicalType};

/// Trait for types that can be placed on the [`PrimitiveArray`]. Values are stored in
/// little endian with [`PrimitiveType::WIDTH`] bytes
pub trait PrimitiveType:
    Sealed + Copy + Debug + Display + PartialEq + Default + Send + Sync + 'static
{
    /// Physical type of the values
    const PHYSICAL_TYPE: PhysicalType;
    /// Number of bytes of a single value
    const WIDTH: usize;
    /// Unique name of the type
    const NAME: &'static str;
    /// Default logical type of this primitive type
    const LOGICAL_TYPE: LogicalType;

    /// Read a value from exactly [`PrimitiveType::WIDTH`] bytes
    fn read_le(bytes: &[u8]) -> Self;

    /// Append the value into the buffer
    fn write_le(self, buf: &mut BytesMut);

    /// Convert the value into element
    fn to_element(self) -> ElementImplRef<'static>;

    /// Extract the value from element, returns `None` if the element has different
    /// physical type
    fn from_element(element: ElementImplRef<'_>) -> Option<Self>;

    /// Integer value of the type, `None` for types that are not integers
    fn as_i128(self) -> Option<i128>;

    /// Downcast the array into the [`PrimitiveArray`] of this type
    fn downcast(array: &ArrayImpl) -> Option<&PrimitiveArray<Self>>;

    /// Wrap the array into [`ArrayImpl`]
    fn wrap(array: PrimitiveArray<Self>) -> ArrayImpl;
}

macro_rules! impl_number_type {
    ($({$variant:ident, $ty:ty, $lt:expr, $is_integer:expr}),+) => {
        $(
            impl Sealed for $ty {}

            impl PrimitiveType for $ty {
                const PHYSICAL_TYPE: PhysicalType = PhysicalType::$variant;
                const WIDTH: usize = std::mem::size_of::<$ty>();
                const NAME: &'static str = stringify!($variant);
                const LOGICAL_TYPE: LogicalType = $lt;

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }

                #[inline]
                fn write_le(self, buf: &mut BytesMut) {
                    buf.put_slice(&self.to_le_bytes());
                }

                #[inline]
                fn to_element(self) -> ElementImplRef<'static> {
                    ElementImplRef::$variant(self)
                }

                #[inline]
                fn from_element(element: ElementImplRef<'_>) -> Option<Self> {
                    match element {
                        ElementImplRef::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                #[inline]
                fn as_i128(self) -> Option<i128> {
                    if $is_integer {
                        Some(self as i128)
                    } else {
                        None
                    }
                }

                #[inline]
                fn downcast(array: &ArrayImpl) -> Option<&PrimitiveArray<Self>> {
                    match array {
                        ArrayImpl::$variant(array) => Some(array),
                        _ => None,
                    }
                }

                #[inline]
                fn wrap(array: PrimitiveArray<Self>) -> ArrayImpl {
                    ArrayImpl::$variant(array)
                }
            }
        )+
    };
}

for_all_native_numbers!(impl_number_type);

impl Sealed for bool {}

impl PrimitiveType for bool {
    const PHYSICAL_TYPE: PhysicalType = PhysicalType::Boolean;
    const WIDTH: usize = 1;
    const NAME: &'static str = "Boolean";
    const LOGICAL_TYPE: LogicalType = LogicalType::Boolean;

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    #[inline]
    fn write_le(self, buf: &mut BytesMut) {
        buf.put_u8(self as u8);
    }

    #[inline]
    fn to_element(self) -> ElementImplRef<'static> {
        ElementImplRef::Boolean(self)
    }

    #[inline]
    fn from_element(element: ElementImplRef<'_>) -> Option<Self> {
        match element {
            ElementImplRef::Boolean(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    fn as_i128(self) -> Option<i128> {
        None
    }

    #[inline]
    fn downcast(array: &ArrayImpl) -> Option<&PrimitiveArray<Self>> {
        match array {
            ArrayImpl::Boolean(array) => Some(array),
            _ => None,
        }
    }

    #[inline]
    fn wrap(array: PrimitiveArray<Self>) -> ArrayImpl {
        ArrayImpl::Boolean(array)
    }
}

impl Sealed for LongTimestampTz {}

/// Stored as the packed millis with zone (`i64`) followed by the picos of milli (`u32`)
impl PrimitiveType for LongTimestampTz {
    const PHYSICAL_TYPE: PhysicalType = PhysicalType::Int96;
    const WIDTH: usize = 12;
    const NAME: &'static str = "Int96";
    const LOGICAL_TYPE: LogicalType = LogicalType::TimestampWithTimeZone { precision: 12 };

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        let mut packed = [0; 8];
        packed.copy_from_slice(&bytes[..8]);
        let mut picos = [0; 4];
        picos.copy_from_slice(&bytes[8..12]);
        LongTimestampTz::from_packed(i64::from_le_bytes(packed), u32::from_le_bytes(picos))
    }

    #[inline]
    fn write_le(self, buf: &mut BytesMut) {
        buf.put_i64_le(self.packed());
        buf.put_u32_le(self.picos_of_milli());
    }

    #[inline]
    fn to_element(self) -> ElementImplRef<'static> {
        ElementImplRef::Int96(self)
    }

    #[inline]
    fn from_element(element: ElementImplRef<'_>) -> Option<Self> {
        match element {
            ElementImplRef::Int96(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    fn as_i128(self) -> Option<i128> {
        None
    }

    #[inline]
    fn downcast(array: &ArrayImpl) -> Option<&PrimitiveArray<Self>> {
        match array {
            ArrayImpl::Int96(array) => Some(array),
            _ => None,
        }
    }

    #[inline]
    fn wrap(array: PrimitiveArray<Self>) -> ArrayImpl {
        ArrayImpl::Int96(array)
    }
}

/// [`PrimitiveArray`] that stores fixed byte-width data, such as `i32` or `f64`.
///
/// Values are stored in a reference counted [`Bytes`], cloning and slicing the array
/// never copy the values
pub struct PrimitiveArray<T: PrimitiveType> {
    logical_type: LogicalType,
    values: Bytes,
    /// `None` means all of the values are valid
    validity: Option<Bitmap>,
    /// Size of the allocation that backs the values
    retained_bytes: usize,
    _phantom: PhantomData<T>,
}

impl<T: PrimitiveType> Clone for PrimitiveArray<T> {
    fn clone(&self) -> Self {
        Self {
            logical_type: self.logical_type,
            values: self.values.clone(),
            validity: self.validity.clone(),
            retained_bytes: self.retained_bytes,
            _phantom: PhantomData,
        }
    }
}

impl<T: PrimitiveType> PrimitiveArray<T> {
    /// Create a new [`PrimitiveArray`] from the little endian values and the validity
    pub fn try_new(
        logical_type: LogicalType,
        values: Bytes,
        validity: Option<Bitmap>,
    ) -> Result<Self> {
        ensure!(
            logical_type.physical_type() == T::PHYSICAL_TYPE,
            InvalidLogicalTypeSnafu {
                array_name: format!("{}Array", T::NAME),
                array_physical_type: T::PHYSICAL_TYPE,
                logical_type,
            }
        );
        ensure!(
            values.len() % T::WIDTH == 0,
            InvalidValuesLengthSnafu {
                values_len: values.len(),
                width: T::WIDTH,
            }
        );
        let len = values.len() / T::WIDTH;
        if let Some(validity) = &validity {
            ensure!(
                validity.len() == len,
                ValidityLengthSnafu {
                    validity_len: validity.len(),
                    len,
                }
            );
        }
        let retained_bytes = values.len();
        Ok(Self::from_parts(logical_type, values, validity, retained_bytes))
    }

    /// Caller should guarantee the invariants checked in [`Self::try_new`]
    #[inline]
    pub(crate) fn from_parts(
        logical_type: LogicalType,
        values: Bytes,
        validity: Option<Bitmap>,
        retained_bytes: usize,
    ) -> Self {
        debug_assert_eq!(logical_type.physical_type(), T::PHYSICAL_TYPE);
        debug_assert_eq!(values.len() % T::WIDTH, 0);
        Self {
            logical_type,
            values,
            validity: validity.filter(|validity| !validity.all_valid()),
            retained_bytes,
            _phantom: PhantomData,
        }
    }

    /// Create a new empty [`PrimitiveArray`]
    #[inline]
    pub fn new_empty(logical_type: LogicalType) -> Result<Self> {
        Self::try_new(logical_type, Bytes::new(), None)
    }

    /// Construct [`Self`] from iterator of values, the logical type is
    /// [`PrimitiveType::LOGICAL_TYPE`]
    pub fn from_values_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        iter.into_iter().map(Some).collect()
    }

    /// Change the logical type of the array, the new logical type should have same
    /// physical type
    pub fn with_logical_type(mut self, logical_type: LogicalType) -> Result<Self> {
        ensure!(
            logical_type.physical_type() == T::PHYSICAL_TYPE,
            InvalidLogicalTypeSnafu {
                array_name: format!("{}Array", T::NAME),
                array_physical_type: T::PHYSICAL_TYPE,
                logical_type,
            }
        );
        self.logical_type = logical_type;
        Ok(self)
    }

    /// Get the logical type of the array
    #[inline]
    pub fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    /// Number of elements in the array
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len() / T::WIDTH
    }

    /// Returns true if the array contains no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Little endian bytes of the values
    #[inline]
    pub fn values_bytes(&self) -> &Bytes {
        &self.values
    }

    /// Get the validity, `None` if all of the values are valid
    #[inline]
    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_ref()
    }

    /// Number of nulls in the array
    #[inline]
    pub fn null_count(&self) -> usize {
        self.validity.as_ref().map_or(0, |validity| validity.count_zeros())
    }

    /// Returns true if the element with given index is null. It will panic if the index
    /// out of bounds
    #[inline]
    pub fn is_null(&self, index: usize) -> bool {
        assert!(index < self.len());
        self.validity
            .as_ref()
            .is_some_and(|validity| !validity.get(index))
    }

    /// Get the value with given index, ignoring the validity. It will panic if the index
    /// out of bounds
    #[inline]
    pub fn value(&self, index: usize) -> T {
        let start = index * T::WIDTH;
        T::read_le(&self.values[start..start + T::WIDTH])
    }

    /// Get the element with given index. It will panic if the index out of bounds
    #[inline]
    pub fn get(&self, index: usize) -> Option<T> {
        if self.is_null(index) {
            None
        } else {
            Some(self.value(index))
        }
    }

    /// Iterator of the values, ignoring the validity
    pub fn values_iter(&self) -> impl ExactSizeIterator<Item = T> + '_ {
        self.values.chunks_exact(T::WIDTH).map(T::read_le)
    }

    /// Iterator of the elements
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Option<T>> + '_ {
        (0..self.len()).map(|index| self.get(index))
    }

    /// Zero copy slice. It will panic if `offset + len > self.len()`
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        assert!(offset + len <= self.len());
        Self {
            logical_type: self.logical_type,
            values: self
                .values
                .slice(offset * T::WIDTH..(offset + len) * T::WIDTH),
            validity: self
                .validity
                .as_ref()
                .map(|validity| validity.slice(offset, len))
                .filter(|validity| !validity.all_valid()),
            retained_bytes: self.retained_bytes,
            _phantom: PhantomData,
        }
    }

    /// Number of bytes of the live values and validity
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.values.len()
            + self
                .validity
                .as_ref()
                .map_or(0, |validity| validity.size_in_bytes())
    }

    /// Number of bytes of the allocations referenced by the array
    #[inline]
    pub fn retained_size_in_bytes(&self) -> usize {
        self.retained_bytes
            + self
                .validity
                .as_ref()
                .map_or(0, |validity| validity.retained_size_in_bytes())
    }

    #[inline]
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        self.values.as_ptr() == other.values.as_ptr()
            && self.values.len() == other.values.len()
            && match (&self.validity, &other.validity) {
                (None, None) => true,
                (Some(lhs), Some(rhs)) => lhs.ptr_eq(rhs),
                _ => false,
            }
    }
}

impl<T: PrimitiveType> FromIterator<Option<T>> for PrimitiveArray<T> {
    fn from_iter<I: IntoIterator<Item = Option<T>>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let (low, _) = iter.size_hint();
        let mut values = BytesMut::with_capacity(low * T::WIDTH);
        let mut validity = MutableBitmap::with_capacity(low);
        iter.for_each(|element| {
            validity.push(element.is_some());
            element.unwrap_or_default().write_le(&mut values);
        });
        let retained_bytes = values.capacity();
        Self::from_parts(
            T::LOGICAL_TYPE,
            values.freeze(),
            Some(validity.split_freeze()),
            retained_bytes,
        )
    }
}

macro_rules! alias {
    ($({$_:ident, $ty:ty, $alias:ident, $__:ident}),*) => {
        $(
            #[doc = concat!("A [`PrimitiveArray`] of [`", stringify!($ty), "`]")]
            pub type $alias = PrimitiveArray<$ty>;
        )*
    };
}

for_all_primitive_types!(alias);

impl<T: PrimitiveType> Debug for PrimitiveArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}Array {{ logical_type: {:?}, len: {}, data: ",
            T::NAME,
            self.logical_type,
            self.len()
        )?;
        f.debug_list().entries(self.iter()).finish()?;
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_array_from_iter() {
        let array = Int64Array::from_iter([Some(1), None, Some(3)]);
        assert_eq!(array.len(), 3);
        assert_eq!(array.null_count(), 1);
        assert_eq!(array.get(1), None);
        assert_eq!(array.get(2), Some(3));
        assert_eq!(array.size_in_bytes(), 3 * 8 + 1);

        let expect = expect_test::expect![
            "Int64Array { logical_type: BigInt, len: 3, data: [Some(1), None, Some(3)]}"
        ];
        expect.assert_eq(&format!("{:?}", array));
    }

    #[test]
    fn test_slice_is_zero_copy() {
        let array = Int32Array::from_values_iter(0..100);
        let sliced = array.slice(10, 5);
        assert_eq!(sliced.values_iter().collect::<Vec<_>>(), vec![10, 11, 12, 13, 14]);
        assert_eq!(
            sliced.values_bytes().as_ptr(),
            array.values_bytes()[40..].as_ptr()
        );
        assert!(sliced.validity().is_none());
        assert_eq!(sliced.retained_size_in_bytes(), array.retained_size_in_bytes());
    }

    #[test]
    fn test_try_new_validates_layout() {
        assert!(Int32Array::try_new(LogicalType::BigInt, Bytes::new(), None).is_err());
        assert!(Int32Array::try_new(LogicalType::Date, Bytes::from_static(&[0; 6]), None).is_err());

        let dates = Int32Array::try_new(LogicalType::Date, Bytes::from_static(&[1, 0, 0, 0]), None)
            .unwrap();
        assert_eq!(dates.get(0), Some(1));
        assert_eq!(dates.logical_type(), &LogicalType::Date);
    }

    #[test]
    fn test_long_timestamp_tz_layout() {
        let ts = LongTimestampTz::try_new(-5, 999, 3).unwrap();
        let array = Int96Array::from_values_iter([ts]);
        assert_eq!(array.values_bytes().len(), 12);
        assert_eq!(array.value(0), ts);
    }
}
