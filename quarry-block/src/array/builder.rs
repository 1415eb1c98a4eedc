//! Builders of the flat arrays.
//!
//! A builder owns a [`BytesMut`] buffer. [`ArrayBuilderImpl::flush`] freezes the values
//! appended so far into an array and keeps appending into the spare capacity of the
//! same buffer, therefore arrays flushed in sequence are adjacent regions of a single
//! allocation. When the spare capacity is exhausted a new buffer is allocated, the
//! flushed arrays keep the old one alive.

use std::fmt::Debug;
use std::marker::PhantomData;

use bytes::{BufMut, BytesMut};
use snafu::{OptionExt, ensure};

use super::binary::OFFSET_WIDTH;
use super::{
    ArrayImpl, BinaryArray, BinaryTooLargeSnafu, ElementTypeMismatchSnafu, FloatOutOfRangeSnafu,
    InvalidLogicalTypeSnafu, InvalidTimeZoneKeySnafu, LogicalTypeMismatchSnafu, OutOfRangeSnafu,
    PrimitiveArray, PrimitiveType, Result, WriteNotSupportedSnafu,
};
use crate::bitmap::MutableBitmap;
use crate::element::ElementImplRef;
use crate::element::timestamp::{LongTimestampTz, pack_date_time_with_zone};
use crate::macros::for_all_primitive_types;
use crate::types::{LogicalType, PhysicalType};

/// Default size limit of a block, builders never preallocate more than it
pub const DEFAULT_MAX_BLOCK_SIZE_IN_BYTES: usize = 1024 * 1024;

/// Expected number of bytes of a variable width element, used to preallocate
const EXPECTED_BYTES_PER_ENTRY: usize = 32;

/// Number of entries preallocated by a builder of fixed width values
#[inline]
fn initial_entries(expected_entries: usize, max_block_size_in_bytes: usize, width: usize) -> usize {
    expected_entries.min(max_block_size_in_bytes / width).max(1)
}

/// Reserve `additional` bytes. If a new buffer is needed, it is at least as large as the
/// bytes appended since the last flush or `chunk_size`, the appends are amortized O(1).
/// Returns true if a new buffer is allocated
#[inline]
fn reserve(buf: &mut BytesMut, additional: usize, chunk_size: usize) -> bool {
    if buf.capacity() - buf.len() >= additional {
        return false;
    }
    buf.reserve(additional.max(buf.len()).max(chunk_size));
    true
}

/// Builder of [`PrimitiveArray`]
pub struct PrimitiveArrayBuilder<T: PrimitiveType> {
    logical_type: LogicalType,
    range: Option<(i128, i128)>,
    values: BytesMut,
    /// Created lazily when the first null is appended
    validity: Option<MutableBitmap>,
    len: usize,
    chunk_size: usize,
    /// Capacity of the buffer that backs the values
    backing_bytes: usize,
    _phantom: PhantomData<T>,
}

impl<T: PrimitiveType> PrimitiveArrayBuilder<T> {
    /// Create a builder that preallocates
    /// `min(expected_entries, max_block_size_in_bytes / width)` entries
    pub fn try_new(
        logical_type: LogicalType,
        expected_entries: usize,
        max_block_size_in_bytes: usize,
    ) -> Result<Self> {
        ensure!(
            logical_type.physical_type() == T::PHYSICAL_TYPE,
            InvalidLogicalTypeSnafu {
                array_name: format!("{}Array", T::NAME),
                array_physical_type: T::PHYSICAL_TYPE,
                logical_type,
            }
        );
        Ok(Self::new_unchecked(
            logical_type,
            expected_entries,
            max_block_size_in_bytes,
        ))
    }

    fn new_unchecked(
        logical_type: LogicalType,
        expected_entries: usize,
        max_block_size_in_bytes: usize,
    ) -> Self {
        let chunk_size =
            initial_entries(expected_entries, max_block_size_in_bytes, T::WIDTH) * T::WIDTH;
        let values = BytesMut::with_capacity(chunk_size);
        Self {
            logical_type,
            range: logical_type.range(),
            backing_bytes: values.capacity(),
            values,
            validity: None,
            len: 0,
            chunk_size,
            _phantom: PhantomData,
        }
    }

    /// Logical type of the built array
    #[inline]
    pub fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    /// Number of entries appended since the last flush
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing is appended since the last flush
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a value. Integers out of the range of the logical type are rejected and
    /// the builder is unchanged
    #[inline]
    pub fn append_value(&mut self, value: T) -> Result<()> {
        if let (Some(v), Some((min, max))) = (value.as_i128(), self.range) {
            ensure!(
                min <= v && v <= max,
                OutOfRangeSnafu {
                    value: v,
                    logical_type: self.logical_type,
                }
            );
        }
        self.push(value, true);
        Ok(())
    }

    /// Append a null
    #[inline]
    pub fn append_null(&mut self) {
        if self.validity.is_none() {
            let mut validity = MutableBitmap::with_capacity(self.len + self.chunk_size / T::WIDTH);
            validity.extend_constant(self.len, true);
            self.validity = Some(validity);
        }
        self.push(T::default(), false);
    }

    /// Append a value or null
    #[inline]
    pub fn append_option(&mut self, value: Option<T>) -> Result<()> {
        match value {
            Some(value) => self.append_value(value),
            None => {
                self.append_null();
                Ok(())
            }
        }
    }

    #[inline]
    fn push(&mut self, value: T, valid: bool) {
        if reserve(&mut self.values, T::WIDTH, self.chunk_size) {
            self.backing_bytes = self.values.capacity();
        }
        value.write_le(&mut self.values);
        if let Some(validity) = &mut self.validity {
            validity.push(valid);
        }
        self.len += 1;
    }

    /// Number of bytes appended since the last flush, O(1)
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.values.len()
            + self
                .validity
                .as_ref()
                .map_or(0, |validity| validity.size_in_bytes())
    }

    /// Number of bytes allocated by the builder
    #[inline]
    pub fn retained_size_in_bytes(&self) -> usize {
        self.values.capacity()
            + self
                .validity
                .as_ref()
                .map_or(0, |validity| validity.capacity_in_bytes())
    }

    /// Freeze the appended values into an array, the builder becomes empty and keeps
    /// appending into the spare capacity
    pub fn flush(&mut self) -> PrimitiveArray<T> {
        let values = self.values.split().freeze();
        let validity = self
            .validity
            .take()
            .map(|mut validity| validity.split_freeze());
        self.len = 0;
        PrimitiveArray::from_parts(self.logical_type, values, validity, self.backing_bytes)
    }

    /// Consume the builder and build the array
    #[inline]
    pub fn build(mut self) -> PrimitiveArray<T> {
        self.flush()
    }
}

impl<T: PrimitiveType> Debug for PrimitiveArrayBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(&format!("{}ArrayBuilder", T::NAME))
            .field("logical_type", &self.logical_type)
            .field("len", &self.len)
            .field("size_in_bytes", &self.size_in_bytes())
            .finish()
    }
}

macro_rules! alias {
    ($({$_:ident, $ty:ty, $__:ident, $alias:ident}),*) => {
        $(
            #[doc = concat!("A [`PrimitiveArrayBuilder`] of [`", stringify!($ty), "`]")]
            pub type $alias = PrimitiveArrayBuilder<$ty>;
        )*
    };
}

for_all_primitive_types!(alias);

/// Builder of [`BinaryArray`]
#[derive(Debug)]
pub struct BinaryArrayBuilder {
    logical_type: LogicalType,
    /// Offsets relative to the first byte appended since the last flush, it always
    /// contains `len + 1` offsets
    offsets: BytesMut,
    bytes: BytesMut,
    validity: Option<MutableBitmap>,
    len: usize,
    offsets_chunk_size: usize,
    bytes_chunk_size: usize,
    backing_bytes: usize,
}

impl BinaryArrayBuilder {
    /// Create a builder that preallocates `expected_entries` offsets and bytes for them,
    /// bounded by the `max_block_size_in_bytes`
    pub fn try_new(
        logical_type: LogicalType,
        expected_entries: usize,
        max_block_size_in_bytes: usize,
    ) -> Result<Self> {
        ensure!(
            logical_type.physical_type() == PhysicalType::Binary,
            InvalidLogicalTypeSnafu {
                array_name: "BinaryArray",
                array_physical_type: PhysicalType::Binary,
                logical_type,
            }
        );
        Ok(Self::new_unchecked(
            logical_type,
            expected_entries,
            max_block_size_in_bytes,
        ))
    }

    fn new_unchecked(
        logical_type: LogicalType,
        expected_entries: usize,
        max_block_size_in_bytes: usize,
    ) -> Self {
        let offsets_chunk_size =
            (initial_entries(expected_entries, max_block_size_in_bytes, OFFSET_WIDTH) + 1)
                * OFFSET_WIDTH;
        let bytes_chunk_size = expected_entries
            .saturating_mul(EXPECTED_BYTES_PER_ENTRY)
            .clamp(EXPECTED_BYTES_PER_ENTRY, max_block_size_in_bytes.max(1));
        let mut offsets = BytesMut::with_capacity(offsets_chunk_size);
        offsets.put_u32_le(0);
        let bytes = BytesMut::with_capacity(bytes_chunk_size);
        Self {
            logical_type,
            backing_bytes: offsets.capacity() + bytes.capacity(),
            offsets,
            bytes,
            validity: None,
            len: 0,
            offsets_chunk_size,
            bytes_chunk_size,
        }
    }

    /// Logical type of the built array
    #[inline]
    pub fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    /// Number of entries appended since the last flush
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing is appended since the last flush
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append bytes. Fails if the bytes appended since the last flush can not be
    /// addressed by `u32` offsets, the builder is unchanged
    pub fn append_value(&mut self, value: &[u8]) -> Result<()> {
        let size = self.bytes.len() + value.len();
        ensure!(size <= u32::MAX as usize, BinaryTooLargeSnafu { size });
        let reallocated = reserve(&mut self.bytes, value.len(), self.bytes_chunk_size);
        self.bytes.put_slice(value);
        self.push_offset(true, reallocated);
        Ok(())
    }

    /// Append a null
    pub fn append_null(&mut self) {
        if self.validity.is_none() {
            let mut validity =
                MutableBitmap::with_capacity(self.len + self.offsets_chunk_size / OFFSET_WIDTH);
            validity.extend_constant(self.len, true);
            self.validity = Some(validity);
        }
        self.push_offset(false, false);
    }

    #[inline]
    fn push_offset(&mut self, valid: bool, bytes_reallocated: bool) {
        let offsets_reallocated =
            reserve(&mut self.offsets, OFFSET_WIDTH, self.offsets_chunk_size);
        if bytes_reallocated || offsets_reallocated {
            self.backing_bytes = self.offsets.capacity() + self.bytes.capacity();
        }
        self.offsets.put_u32_le(self.bytes.len() as u32);
        if let Some(validity) = &mut self.validity {
            validity.push(valid);
        }
        self.len += 1;
    }

    /// Number of bytes appended since the last flush, O(1)
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.bytes.len()
            + self.offsets.len()
            + self
                .validity
                .as_ref()
                .map_or(0, |validity| validity.size_in_bytes())
    }

    /// Number of bytes allocated by the builder
    #[inline]
    pub fn retained_size_in_bytes(&self) -> usize {
        self.bytes.capacity()
            + self.offsets.capacity()
            + self
                .validity
                .as_ref()
                .map_or(0, |validity| validity.capacity_in_bytes())
    }

    /// Freeze the appended values into an array, the builder becomes empty and keeps
    /// appending into the spare capacity
    pub fn flush(&mut self) -> BinaryArray {
        let offsets = self.offsets.split().freeze();
        let bytes = self.bytes.split().freeze();
        let validity = self
            .validity
            .take()
            .map(|mut validity| validity.split_freeze());
        reserve(&mut self.offsets, OFFSET_WIDTH, self.offsets_chunk_size);
        self.offsets.put_u32_le(0);
        self.len = 0;
        BinaryArray::from_parts(self.logical_type, offsets, bytes, validity, self.backing_bytes)
    }

    /// Consume the builder and build the array
    #[inline]
    pub fn build(mut self) -> BinaryArray {
        self.flush()
    }
}

macro_rules! array_builder_impl {
    ($({$variant:ident, $element_ty:ty, $array_ty:ident, $builder_ty:ident}),+) => {
        /// Builders of the flat arrays, enum dispatch
        #[derive(Debug)]
        pub enum ArrayBuilderImpl {
            $(
                #[doc = concat!("Builder of `", stringify!($array_ty), "`")]
                $variant($builder_ty),
            )+
            /// Builder of [`BinaryArray`]
            Binary(BinaryArrayBuilder),
        }

        impl ArrayBuilderImpl {
            /// Create a builder for the logical type. It preallocates
            /// `min(expected_entries, max_block_size_in_bytes / fixed_size)` entries
            pub fn with_config(
                logical_type: LogicalType,
                expected_entries: usize,
                max_block_size_in_bytes: usize,
            ) -> Self {
                match logical_type.physical_type() {
                    $(
                        PhysicalType::$variant => Self::$variant(PrimitiveArrayBuilder::new_unchecked(
                            logical_type,
                            expected_entries,
                            max_block_size_in_bytes,
                        )),
                    )+
                    PhysicalType::Binary => Self::Binary(BinaryArrayBuilder::new_unchecked(
                        logical_type,
                        expected_entries,
                        max_block_size_in_bytes,
                    )),
                }
            }

            /// Logical type of the built array
            pub fn logical_type(&self) -> &LogicalType {
                match self {
                    $(
                        Self::$variant(builder) => builder.logical_type(),
                    )+
                    Self::Binary(builder) => builder.logical_type(),
                }
            }

            /// Number of entries appended since the last flush
            pub fn len(&self) -> usize {
                match self {
                    $(
                        Self::$variant(builder) => builder.len(),
                    )+
                    Self::Binary(builder) => builder.len(),
                }
            }

            /// Number of bytes appended since the last flush, O(1)
            pub fn size_in_bytes(&self) -> usize {
                match self {
                    $(
                        Self::$variant(builder) => builder.size_in_bytes(),
                    )+
                    Self::Binary(builder) => builder.size_in_bytes(),
                }
            }

            /// Number of bytes allocated by the builder
            pub fn retained_size_in_bytes(&self) -> usize {
                match self {
                    $(
                        Self::$variant(builder) => builder.retained_size_in_bytes(),
                    )+
                    Self::Binary(builder) => builder.retained_size_in_bytes(),
                }
            }

            /// Append a null
            pub fn append_null(&mut self) {
                match self {
                    $(
                        Self::$variant(builder) => builder.append_null(),
                    )+
                    Self::Binary(builder) => builder.append_null(),
                }
            }

            /// Append an element, the element should have the physical type of the
            /// builder
            pub fn append_element(&mut self, element: ElementImplRef<'_>) -> Result<()> {
                match (self, element) {
                    $(
                        (Self::$variant(builder), ElementImplRef::$variant(value)) => {
                            builder.append_value(value)
                        }
                    )+
                    (Self::Binary(builder), ElementImplRef::Binary(value)) => {
                        builder.append_value(value)
                    }
                    (builder, element) => ElementTypeMismatchSnafu {
                        element: element.ident(),
                        logical_type: *builder.logical_type(),
                    }
                    .fail(),
                }
            }

            /// Freeze the appended values into an array, the builder becomes empty and
            /// keeps appending into the spare capacity of its buffer
            pub fn flush(&mut self) -> ArrayImpl {
                match self {
                    $(
                        Self::$variant(builder) => ArrayImpl::$variant(builder.flush()),
                    )+
                    Self::Binary(builder) => ArrayImpl::Binary(builder.flush()),
                }
            }
        }
    };
}

for_all_primitive_types!(array_builder_impl);

impl ArrayBuilderImpl {
    /// Create a builder for the logical type, preallocation is bounded by
    /// [`DEFAULT_MAX_BLOCK_SIZE_IN_BYTES`]
    #[inline]
    pub fn with_capacity(logical_type: LogicalType, expected_entries: usize) -> Self {
        Self::with_config(
            logical_type,
            expected_entries,
            DEFAULT_MAX_BLOCK_SIZE_IN_BYTES,
        )
    }

    /// Returns true if nothing is appended since the last flush
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an element or null
    #[inline]
    pub fn append_option(&mut self, element: Option<ElementImplRef<'_>>) -> Result<()> {
        match element {
            Some(element) => self.append_element(element),
            None => {
                self.append_null();
                Ok(())
            }
        }
    }

    fn check_range(&self, value: i128) -> Result<()> {
        let logical_type = *self.logical_type();
        if let Some((min, max)) = logical_type.range() {
            ensure!(
                min <= value && value <= max,
                OutOfRangeSnafu {
                    value,
                    logical_type
                }
            );
        }
        Ok(())
    }

    fn write_not_supported<T>(&self, method: &'static str) -> Result<T> {
        WriteNotSupportedSnafu {
            method,
            logical_type: *self.logical_type(),
        }
        .fail()
    }

    /// Write an integer into the integer family (including date, timestamp, short
    /// decimal, packed timestamp with time zone and long decimal)
    pub fn write_long(&mut self, value: i64) -> Result<()> {
        self.check_range(value as i128)?;
        // Range is checked, narrowing never truncates
        match self {
            Self::Int8(builder) => builder.append_value(value as i8),
            Self::Int16(builder) => builder.append_value(value as i16),
            Self::Int32(builder) => builder.append_value(value as i32),
            Self::Int64(builder) => builder.append_value(value),
            Self::Int128(builder) => builder.append_value(value as i128),
            _ => self.write_not_supported("write_long"),
        }
    }

    /// Write a 128 bit integer, used by long decimals
    pub fn write_i128(&mut self, value: i128) -> Result<()> {
        match self {
            Self::Int128(builder) => builder.append_value(value),
            _ => {
                let value = i64::try_from(value).map_err(|_| {
                    OutOfRangeSnafu {
                        value,
                        logical_type: *self.logical_type(),
                    }
                    .build()
                })?;
                self.write_long(value)
            }
        }
    }

    /// Write a float number into `Real` or `Double`. Finite values beyond the range of
    /// `Real` are rejected, infinities and `NaN` are kept
    pub fn write_double(&mut self, value: f64) -> Result<()> {
        match self {
            Self::Float64(builder) => builder.append_value(value),
            Self::Float32(builder) => {
                ensure!(
                    !value.is_finite() || value.abs() <= f32::MAX as f64,
                    FloatOutOfRangeSnafu {
                        value,
                        logical_type: *builder.logical_type(),
                    }
                );
                builder.append_value(value as f32)
            }
            _ => self.write_not_supported("write_double"),
        }
    }

    /// Write a boolean
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        match self {
            Self::Boolean(builder) => builder.append_value(value),
            _ => self.write_not_supported("write_bool"),
        }
    }

    /// Write variable length bytes
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        match self {
            Self::Binary(builder) => builder.append_value(value),
            _ => self.write_not_supported("write_bytes"),
        }
    }

    /// Write a timestamp with time zone from the epoch millis and the zone key. The
    /// long form gets zero picoseconds
    pub fn write_timestamp_tz(&mut self, epoch_millis: i64, zone_key: u16) -> Result<()> {
        let logical_type = *self.logical_type();
        let Some((min, max)) = logical_type.millis_range() else {
            return self.write_not_supported("write_timestamp_tz");
        };
        ensure!(
            min <= epoch_millis && epoch_millis <= max,
            OutOfRangeSnafu {
                value: epoch_millis as i128,
                logical_type
            }
        );
        match self {
            Self::Int64(builder) => {
                let packed = pack_date_time_with_zone(epoch_millis, zone_key)
                    .context(InvalidTimeZoneKeySnafu { zone_key })?;
                builder.append_value(packed)
            }
            Self::Int96(builder) => {
                let value = LongTimestampTz::try_new(epoch_millis, 0, zone_key)
                    .context(InvalidTimeZoneKeySnafu { zone_key })?;
                builder.append_value(value)
            }
            _ => self.write_not_supported("write_timestamp_tz"),
        }
    }

    /// Write a timestamp with time zone whose precision is higher than millisecond
    pub fn write_long_timestamp_tz(&mut self, value: LongTimestampTz) -> Result<()> {
        match self {
            Self::Int96(builder) => builder.append_value(value),
            _ => self.write_not_supported("write_long_timestamp_tz"),
        }
    }

    /// Append the element at the position of the array, the array should have the same
    /// logical type. It will panic if the position out of bounds
    pub fn append_from(&mut self, array: &ArrayImpl, position: usize) -> Result<()> {
        ensure!(
            array.logical_type() == self.logical_type(),
            LogicalTypeMismatchSnafu {
                expect: *self.logical_type(),
                actual: *array.logical_type(),
            }
        );
        self.append_option(array.get(position))
    }

    /// Consume the builder and build the array
    #[inline]
    pub fn build(mut self) -> ArrayImpl {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayEncoding;

    #[test]
    fn test_initial_capacity_is_bounded_by_block_size() {
        let builder =
            PrimitiveArrayBuilder::<i64>::try_new(LogicalType::BigInt, 1 << 20, 1024).unwrap();
        assert_eq!(builder.retained_size_in_bytes(), 1024);

        let builder = PrimitiveArrayBuilder::<i64>::try_new(LogicalType::BigInt, 4, 1024).unwrap();
        assert_eq!(builder.retained_size_in_bytes(), 32);
    }

    #[test]
    fn test_out_of_range_leaves_builder_unchanged() {
        let mut builder = ArrayBuilderImpl::with_capacity(LogicalType::TinyInt, 4);
        builder.write_long(127).unwrap();
        let size = builder.size_in_bytes();

        let err = builder.write_long(128).unwrap_err();
        let expect = expect_test::expect!["Value `128` is out of the range of `tinyint`"];
        expect.assert_eq(&err.to_string());
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.size_in_bytes(), size);

        let mut decimal = ArrayBuilderImpl::with_capacity(LogicalType::decimal(3, 0).unwrap(), 4);
        assert!(decimal.write_long(-1000).is_err());
        assert!(decimal.is_empty());
        decimal.write_long(-999).unwrap();
        assert_eq!(decimal.len(), 1);
    }

    #[test]
    fn test_real_rejects_values_beyond_f32() {
        let mut builder = ArrayBuilderImpl::with_capacity(LogicalType::Real, 4);
        builder.write_double(1.5).unwrap();
        let size = builder.size_in_bytes();

        let err = builder.write_double(1e39).unwrap_err();
        let expect = expect_test::expect![
            "Value `1000000000000000000000000000000000000000` is out of the range of `real`"
        ];
        expect.assert_eq(&err.to_string());
        assert!(builder.write_double(-f64::MAX).is_err());
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.size_in_bytes(), size);

        builder.write_double(f32::MAX as f64).unwrap();
        builder.write_double(f64::NEG_INFINITY).unwrap();
        builder.write_double(f64::NAN).unwrap();
        let array = builder.build();
        let values: &crate::array::Float32Array = (&array).try_into().unwrap();
        let values = values.iter().flatten().collect::<Vec<_>>();
        assert_eq!(values[..3], [1.5, f32::MAX, f32::NEG_INFINITY]);
        assert!(values[3].is_nan());

        let mut double = ArrayBuilderImpl::with_capacity(LogicalType::Double, 1);
        double.write_double(1e39).unwrap();
    }

    #[test]
    fn test_timestamp_tz_millis_range() {
        use crate::element::timestamp::{MAX_PACKED_MILLIS, MIN_PACKED_MILLIS};

        let short = LogicalType::timestamp_with_time_zone(3).unwrap();
        let mut builder = ArrayBuilderImpl::with_capacity(short, 4);
        builder.write_timestamp_tz(MAX_PACKED_MILLIS, 7).unwrap();
        builder.write_timestamp_tz(MIN_PACKED_MILLIS, 0).unwrap();
        let size = builder.size_in_bytes();

        let err = builder
            .write_timestamp_tz(MAX_PACKED_MILLIS + 1, 7)
            .unwrap_err();
        let expect = expect_test::expect![
            "Value `2251799813685248` is out of the range of `timestamp(3) with time zone`"
        ];
        expect.assert_eq(&err.to_string());
        assert!(builder.write_timestamp_tz(MIN_PACKED_MILLIS - 1, 7).is_err());
        let err = builder.write_timestamp_tz(0, 0x1000).unwrap_err();
        let expect = expect_test::expect!["Time zone key 4096 can not be packed"];
        expect.assert_eq(&err.to_string());
        assert_eq!(builder.len(), 2);
        assert_eq!(builder.size_in_bytes(), size);

        let long = LogicalType::timestamp_with_time_zone(9).unwrap();
        let mut builder = ArrayBuilderImpl::with_capacity(long, 1);
        assert!(builder.write_timestamp_tz(i64::MAX, 1).is_err());
        builder.write_timestamp_tz(-5, 1).unwrap();
        assert_eq!(
            builder.build().get(0),
            Some(ElementImplRef::Int96(
                LongTimestampTz::try_new(-5, 0, 1).unwrap()
            ))
        );

        let mut bigint = ArrayBuilderImpl::with_capacity(LogicalType::BigInt, 1);
        assert!(bigint.write_timestamp_tz(0, 0).is_err());
    }

    #[test]
    fn test_write_not_supported() {
        let mut builder = ArrayBuilderImpl::with_capacity(LogicalType::VarChar, 4);
        let err = builder.write_long(1).unwrap_err();
        let expect = expect_test::expect!["`write_long` is not supported by the array of `varchar`"];
        expect.assert_eq(&err.to_string());

        let err = builder.append_element(ElementImplRef::Int32(1)).unwrap_err();
        let expect =
            expect_test::expect!["Can not append element `Int32` to the array of `varchar`"];
        expect.assert_eq(&err.to_string());
    }

    #[test]
    fn test_flush_keeps_appending_into_same_buffer() {
        let mut builder = ArrayBuilderImpl::with_capacity(LogicalType::BigInt, 16);
        builder.write_long(1).unwrap();
        builder.append_null();
        builder.write_long(3).unwrap();
        let first = builder.flush();
        builder.write_long(4).unwrap();
        let second = builder.build();

        let first_values: &crate::array::Int64Array = (&first).try_into().unwrap();
        let second_values: &crate::array::Int64Array = (&second).try_into().unwrap();
        assert_eq!(first_values.iter().collect::<Vec<_>>(), [Some(1), None, Some(3)]);
        assert_eq!(second_values.iter().collect::<Vec<_>>(), [Some(4)]);
        assert_eq!(second_values.null_count(), 0);
        // Regions of one allocation
        assert_eq!(
            second_values.values_bytes().as_ptr(),
            first_values.values_bytes().as_ptr().wrapping_add(24)
        );
        assert_eq!(second.encoding(), ArrayEncoding::FixedWidth);
    }

    #[test]
    fn test_binary_builder_rebases_offsets_on_flush() {
        let mut builder = ArrayBuilderImpl::with_capacity(LogicalType::VarChar, 4);
        builder.write_bytes(b"hello").unwrap();
        builder.append_null();
        let first = builder.flush();
        builder.write_bytes(b"world").unwrap();
        builder.write_bytes(b"").unwrap();
        let second = builder.build();

        let first: &BinaryArray = (&first).try_into().unwrap();
        let second: &BinaryArray = (&second).try_into().unwrap();
        assert_eq!(first.iter().collect::<Vec<_>>(), [Some(&b"hello"[..]), None]);
        assert_eq!(second.iter().collect::<Vec<_>>(), [Some(&b"world"[..]), Some(&b""[..])]);
        assert_eq!(second.offset(0), 0);
    }

    #[test]
    fn test_growth_past_the_initial_capacity() {
        let mut builder = ArrayBuilderImpl::with_config(LogicalType::Integer, 2, 1024);
        (0..1000).for_each(|v| builder.write_long(v).unwrap());
        let array = builder.build();
        assert_eq!(array.len(), 1000);
        assert_eq!(array.get(999), Some(ElementImplRef::Int32(999)));
    }

    #[test]
    fn test_append_from_dictionary() {
        let dictionary = ArrayImpl::Binary(BinaryArray::from_str_iter([Some("x"), Some("y")]));
        let array = ArrayImpl::Dictionary(
            crate::array::DictionaryArray::try_new(dictionary, &[1, 1, 0]).unwrap(),
        );
        let mut builder = ArrayBuilderImpl::with_capacity(LogicalType::VarChar, 3);
        (0..3).for_each(|position| builder.append_from(&array, position).unwrap());
        assert_eq!(builder.build(), array);

        let mut builder = ArrayBuilderImpl::with_capacity(LogicalType::VarBinary, 3);
        assert!(builder.append_from(&array, 0).is_err());
    }
}
