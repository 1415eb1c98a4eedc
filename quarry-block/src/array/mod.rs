//! [`ArrayImpl`] is the memory format of a column.
//!
//! Arrays are immutable once built and cheap to clone: the buffers are reference
//! counted, slices and clones share them. Four encodings exist:
//!
//! - flat fixed width: [`PrimitiveArray`]
//!
//! - flat variable width: [`BinaryArray`]
//!
//! - dictionary: [`DictionaryArray`], ids into a shared flat dictionary
//!
//! - run length: [`RunLengthArray`], a single flat value repeated
//!
//! Builders in [`builder`] produce the flat encodings.

pub mod binary;
pub mod builder;
pub mod dictionary;
pub mod primitive;
pub mod run_length;

use std::iter::FusedIterator;
use std::sync::Arc;

use bytes::Bytes;
use snafu::{Snafu, ensure};

pub use self::binary::BinaryArray;
pub use self::builder::*;
pub use self::dictionary::DictionaryArray;
pub use self::primitive::*;
pub use self::run_length::RunLengthArray;
use crate::element::ElementImplRef;
use crate::macros::for_all_primitive_types;
use crate::types::{LogicalType, PhysicalType};

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ArrayError {
    #[snafu(display("Value `{value}` is out of the range of `{logical_type}`"))]
    OutOfRange {
        value: i128,
        logical_type: LogicalType,
    },
    #[snafu(display("Value `{value}` is out of the range of `{logical_type}`"))]
    FloatOutOfRange {
        value: f64,
        logical_type: LogicalType,
    },
    #[snafu(display("Time zone key {zone_key} can not be packed"))]
    InvalidTimeZoneKey { zone_key: u16 },
    #[snafu(display(
        "Invalid logical type `{:?}({})` passed to creating a new array `{}` that has `{}`",
        logical_type,
        logical_type.physical_type(),
        array_name,
        array_physical_type
    ))]
    InvalidLogicalType {
        array_name: String,
        array_physical_type: PhysicalType,
        logical_type: LogicalType,
    },
    #[snafu(display(
        "Region [{offset}, {offset} + {len}) is out of the bounds of the array with length {array_len}"
    ))]
    IndexOutOfBounds {
        offset: usize,
        len: usize,
        array_len: usize,
    },
    #[snafu(display("Can not convert `ArrayImpl::{array}` array into `{target}` array"))]
    Convert {
        array: &'static str,
        target: &'static str,
    },
    #[snafu(display("Invalid dictionary: {reason}"))]
    InvalidDictionary { reason: String },
    #[snafu(display("`{outer}` requires a flat array, found `{inner}`"))]
    NestedEncoding {
        outer: &'static str,
        inner: &'static str,
    },
    #[snafu(display("RunLengthArray requires a single value, found {value_len} values"))]
    InvalidRunLength { value_len: usize },
    #[snafu(display("Can not append element `{element}` to the array of `{logical_type}`"))]
    ElementTypeMismatch {
        element: &'static str,
        logical_type: LogicalType,
    },
    #[snafu(display("Can not append the element of `{actual}` to the array of `{expect}`"))]
    LogicalTypeMismatch {
        expect: LogicalType,
        actual: LogicalType,
    },
    #[snafu(display("`{method}` is not supported by the array of `{logical_type}`"))]
    WriteNotSupported {
        method: &'static str,
        logical_type: LogicalType,
    },
    #[snafu(display("Values with {values_len} bytes is not multiple of the width {width}"))]
    InvalidValuesLength { values_len: usize, width: usize },
    #[snafu(display("Validity has {validity_len} bits, the array has {len} elements"))]
    ValidityLength { validity_len: usize, len: usize },
    #[snafu(display("Invalid offsets: {reason}"))]
    InvalidOffsets { reason: String },
    #[snafu(display(
        "Variable width array can not hold {size} bytes, the limit is {}",
        u32::MAX
    ))]
    BinaryTooLarge { size: usize },
}

type Result<T> = std::result::Result<T, ArrayError>;

/// Memory layout of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayEncoding {
    /// [`PrimitiveArray`]
    FixedWidth,
    /// [`BinaryArray`]
    VariableWidth,
    /// [`DictionaryArray`]
    Dictionary,
    /// [`RunLengthArray`]
    RunLength,
}

macro_rules! array_impl {
    ($({$variant:ident, $element_ty:ty, $array_ty:ident, $builder_ty:ident}),+) => {
        /// Implementations of the array, enum dispatch
        #[derive(Debug, Clone)]
        pub enum ArrayImpl {
            $(
                #[doc = concat!("Array of `", stringify!($element_ty), "`")]
                $variant($array_ty),
            )+
            /// Array of variable length bytes
            Binary(BinaryArray),
            /// Dictionary encoded array
            Dictionary(DictionaryArray),
            /// Run length encoded array
            RunLength(RunLengthArray),
        }

        impl ArrayImpl {
            /// Create a new empty flat [`ArrayImpl`] based on the [`LogicalType`]
            pub fn new_empty(logical_type: LogicalType) -> Self {
                match logical_type.physical_type() {
                    $(
                        PhysicalType::$variant => {
                            Self::$variant(PrimitiveArray::from_parts(logical_type, Bytes::new(), None, 0))
                        }
                    )+
                    PhysicalType::Binary => Self::Binary(BinaryArray::from_parts(
                        logical_type,
                        Bytes::from_static(&[0; binary::OFFSET_WIDTH]),
                        Bytes::new(),
                        None,
                        binary::OFFSET_WIDTH,
                    )),
                }
            }

            /// Get the number of elements in the Array
            pub fn len(&self) -> usize {
                match self {
                    $(
                        Self::$variant(array) => array.len(),
                    )+
                    Self::Binary(array) => array.len(),
                    Self::Dictionary(array) => array.len(),
                    Self::RunLength(array) => array.len(),
                }
            }

            /// Get ident of the array
            pub fn ident(&self) -> &'static str {
                match self {
                    $(
                        Self::$variant(_) => stringify!($array_ty),
                    )+
                    Self::Binary(_) => "BinaryArray",
                    Self::Dictionary(_) => "DictionaryArray",
                    Self::RunLength(_) => "RunLengthArray",
                }
            }

            /// Return the [`LogicalType`] of the array
            pub fn logical_type(&self) -> &LogicalType {
                match self {
                    $(
                        Self::$variant(array) => array.logical_type(),
                    )+
                    Self::Binary(array) => array.logical_type(),
                    Self::Dictionary(array) => array.logical_type(),
                    Self::RunLength(array) => array.logical_type(),
                }
            }

            /// Memory layout of the array
            pub fn encoding(&self) -> ArrayEncoding {
                match self {
                    $(
                        Self::$variant(_) => ArrayEncoding::FixedWidth,
                    )+
                    Self::Binary(_) => ArrayEncoding::VariableWidth,
                    Self::Dictionary(_) => ArrayEncoding::Dictionary,
                    Self::RunLength(_) => ArrayEncoding::RunLength,
                }
            }

            /// Returns true if the element with given index is null. It will panic if
            /// the index out of bounds
            pub fn is_null(&self, index: usize) -> bool {
                match self {
                    $(
                        Self::$variant(array) => array.is_null(index),
                    )+
                    Self::Binary(array) => array.is_null(index),
                    Self::Dictionary(array) => array.dictionary().is_null(array.id(index)),
                    Self::RunLength(array) => {
                        assert!(index < array.len());
                        array.is_null()
                    }
                }
            }

            /// Get element ref. It will panic if the index out of bounds
            pub fn get(&self, index: usize) -> Option<ElementImplRef<'_>> {
                match self {
                    $(
                        Self::$variant(array) => array.get(index).map(PrimitiveType::to_element),
                    )+
                    Self::Binary(array) => array.get(index).map(ElementImplRef::Binary),
                    Self::Dictionary(array) => array.dictionary().get(array.id(index)),
                    Self::RunLength(array) => {
                        assert!(index < array.len());
                        array.value().get(0)
                    }
                }
            }

            /// Number of nulls in the array
            pub fn null_count(&self) -> usize {
                match self {
                    $(
                        Self::$variant(array) => array.null_count(),
                    )+
                    Self::Binary(array) => array.null_count(),
                    Self::Dictionary(array) => (0..array.len())
                        .filter(|&index| array.dictionary().is_null(array.id(index)))
                        .count(),
                    Self::RunLength(array) => {
                        if array.is_null() {
                            array.len()
                        } else {
                            0
                        }
                    }
                }
            }

            /// Size of the live data in bytes. For dictionary the whole dictionary is
            /// counted, for run length only the single value
            pub fn size_in_bytes(&self) -> usize {
                match self {
                    $(
                        Self::$variant(array) => array.size_in_bytes(),
                    )+
                    Self::Binary(array) => array.size_in_bytes(),
                    Self::Dictionary(array) => array.size_in_bytes(),
                    Self::RunLength(array) => array.value().size_in_bytes(),
                }
            }

            /// Size of the allocations referenced by the array in bytes, including the
            /// data outside of the slice
            pub fn retained_size_in_bytes(&self) -> usize {
                match self {
                    $(
                        Self::$variant(array) => array.retained_size_in_bytes(),
                    )+
                    Self::Binary(array) => array.retained_size_in_bytes(),
                    Self::Dictionary(array) => array.retained_size_in_bytes(),
                    Self::RunLength(array) => array.value().retained_size_in_bytes(),
                }
            }

            /// Zero copy region view of `[offset, offset + len)`
            pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
                ensure!(
                    offset.checked_add(len).is_some_and(|end| end <= self.len()),
                    IndexOutOfBoundsSnafu {
                        offset,
                        len,
                        array_len: self.len()
                    }
                );
                Ok(match self {
                    $(
                        Self::$variant(array) => Self::$variant(array.slice(offset, len)),
                    )+
                    Self::Binary(array) => Self::Binary(array.slice(offset, len)),
                    Self::Dictionary(array) => Self::Dictionary(array.slice(offset, len)),
                    Self::RunLength(array) => Self::RunLength(array.slice(offset, len)),
                })
            }

            /// Returns true if two arrays are views of the same region
            pub fn ptr_eq(&self, other: &Self) -> bool {
                match (self, other) {
                    $(
                        (Self::$variant(lhs), Self::$variant(rhs)) => lhs.ptr_eq(rhs),
                    )+
                    (Self::Binary(lhs), Self::Binary(rhs)) => lhs.ptr_eq(rhs),
                    (Self::Dictionary(lhs), Self::Dictionary(rhs)) => lhs.ptr_eq(rhs),
                    (Self::RunLength(lhs), Self::RunLength(rhs)) => lhs.ptr_eq(rhs),
                    _ => false,
                }
            }
        }

        $(
            impl<'a> TryFrom<&'a ArrayImpl> for &'a $array_ty {
                type Error = ArrayError;

                fn try_from(array: &'a ArrayImpl) -> Result<&'a $array_ty> {
                    if let ArrayImpl::$variant(array) = array {
                        Ok(array)
                    } else {
                        ConvertSnafu {
                            array: array.ident(),
                            target: stringify!($array_ty),
                        }
                        .fail()
                    }
                }
            }

            impl From<$array_ty> for ArrayImpl {
                #[inline]
                fn from(array: $array_ty) -> Self {
                    Self::$variant(array)
                }
            }
        )+
    };
}

for_all_primitive_types!(array_impl);

macro_rules! impl_try_from_encoded {
    ($({$variant:ident, $array_ty:ident}),+) => {
        $(
            impl<'a> TryFrom<&'a ArrayImpl> for &'a $array_ty {
                type Error = ArrayError;

                fn try_from(array: &'a ArrayImpl) -> Result<&'a $array_ty> {
                    if let ArrayImpl::$variant(array) = array {
                        Ok(array)
                    } else {
                        ConvertSnafu {
                            array: array.ident(),
                            target: stringify!($array_ty),
                        }
                        .fail()
                    }
                }
            }

            impl From<$array_ty> for ArrayImpl {
                #[inline]
                fn from(array: $array_ty) -> Self {
                    Self::$variant(array)
                }
            }
        )+
    };
}

impl_try_from_encoded!(
    {Binary, BinaryArray},
    {Dictionary, DictionaryArray},
    {RunLength, RunLengthArray}
);

impl ArrayImpl {
    /// Create an array with `len` nulls, it is run length encoded
    pub fn new_null(logical_type: LogicalType, len: usize) -> Self {
        if len == 0 {
            return Self::new_empty(logical_type);
        }
        let mut builder = ArrayBuilderImpl::with_capacity(logical_type, 1);
        builder.append_null();
        Self::RunLength(RunLengthArray::from_parts(Arc::new(builder.build()), len))
    }

    /// Create a flat array with `len` nulls
    pub fn new_flat_null(logical_type: LogicalType, len: usize) -> Self {
        let mut builder = ArrayBuilderImpl::with_capacity(logical_type, len);
        (0..len).for_each(|_| builder.append_null());
        builder.build()
    }

    /// Returns true if the array contains no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the array is [`PrimitiveArray`] or [`BinaryArray`]
    #[inline]
    pub fn is_flat(&self) -> bool {
        matches!(
            self.encoding(),
            ArrayEncoding::FixedWidth | ArrayEncoding::VariableWidth
        )
    }

    /// Returns true if all of the elements are null, without iterating the elements of
    /// dictionary. Empty array is not all null
    pub fn is_all_null(&self) -> bool {
        match self {
            Self::Dictionary(_) => false,
            Self::RunLength(array) => !array.is_empty() && array.is_null(),
            _ => !self.is_empty() && self.null_count() == self.len(),
        }
    }

    /// Resolve the position into the flat array that stores the element. It will panic
    /// if the index out of bounds
    pub fn flat_position(&self, index: usize) -> (&ArrayImpl, usize) {
        match self {
            Self::Dictionary(array) => (array.dictionary().as_ref(), array.id(index)),
            Self::RunLength(array) => {
                assert!(index < array.len());
                (array.value().as_ref(), 0)
            }
            _ => {
                assert!(index < self.len());
                (self, index)
            }
        }
    }

    /// Get iterator of the array
    #[inline]
    pub fn iter(&self) -> ArrayIter<'_> {
        ArrayIter {
            array: self,
            index: 0,
            len: self.len(),
        }
    }
}

/// Compare the logical types and the elements, the encodings may differ
impl PartialEq for ArrayImpl {
    fn eq(&self, other: &Self) -> bool {
        self.logical_type() == other.logical_type()
            && self.len() == other.len()
            && self.iter().eq(other.iter())
    }
}

/// Iterator of the elements in the [`ArrayImpl`]
#[derive(Debug)]
pub struct ArrayIter<'a> {
    array: &'a ArrayImpl,
    index: usize,
    len: usize,
}

impl<'a> Iterator for ArrayIter<'a> {
    type Item = Option<ElementImplRef<'a>>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.index == self.len {
            None
        } else {
            let element = self.array.get(self.index);
            self.index += 1;
            Some(element)
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ArrayIter<'_> {}

impl FusedIterator for ArrayIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementImpl;

    fn elements(array: &ArrayImpl) -> Vec<Option<ElementImpl>> {
        array
            .iter()
            .map(|element| element.map(ElementImplRef::to_owned))
            .collect()
    }

    #[test]
    fn test_dictionary_resolves_flat_positions() {
        let dictionary = ArrayImpl::Binary(BinaryArray::from_str_iter([
            Some("a"),
            None,
            Some("c"),
        ]));
        let array =
            ArrayImpl::Dictionary(DictionaryArray::try_new(dictionary, &[2, 1, 0, 2]).unwrap());
        assert_eq!(array.encoding(), ArrayEncoding::Dictionary);
        assert_eq!(array.null_count(), 1);
        assert!(array.is_null(1));
        assert_eq!(array.flat_position(3).1, 2);
        assert_eq!(
            elements(&array),
            vec![
                Some(ElementImpl::from("c")),
                None,
                Some(ElementImpl::from("a")),
                Some(ElementImpl::from("c")),
            ]
        );
    }

    #[test]
    fn test_null_array_is_run_length() {
        let array = ArrayImpl::new_null(LogicalType::BigInt, 5);
        assert_eq!(array.encoding(), ArrayEncoding::RunLength);
        assert_eq!(array.len(), 5);
        assert_eq!(array.null_count(), 5);
        assert!(array.is_all_null());
        assert_eq!(
            array,
            ArrayImpl::new_flat_null(LogicalType::BigInt, 5),
            "encodings differ but the elements are equal"
        );
    }

    #[test]
    fn test_slice_out_of_bounds() {
        let array = ArrayImpl::Int64(Int64Array::from_values_iter([1, 2, 3]));
        assert_eq!(
            elements(&array.slice(1, 2).unwrap()),
            vec![Some(ElementImpl::Int64(2)), Some(ElementImpl::Int64(3))]
        );
        let err = array.slice(2, 2).unwrap_err();
        let expect = expect_test::expect![
            "Region [2, 2 + 2) is out of the bounds of the array with length 3"
        ];
        expect.assert_eq(&err.to_string());
    }

    #[test]
    fn test_convert_array() {
        let array = ArrayImpl::Int32(Int32Array::from_values_iter([1]));
        assert!(<&Int32Array>::try_from(&array).is_ok());
        let err = <&Float64Array>::try_from(&array).unwrap_err();
        let expect = expect_test::expect![
            "Can not convert `ArrayImpl::Int32Array` array into `Float64Array` array"
        ];
        expect.assert_eq(&err.to_string());
    }
}
