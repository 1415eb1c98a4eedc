//! Column encodings of the page body

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use snafu::{ResultExt, ensure};

use super::{
    EncodingTypeMismatchSnafu, InvalidArraySnafu, InvalidFlagSnafu, NestedEncodingSnafu,
    NestedTooLargeSnafu, Result, TruncatedSnafu, UnknownEncodingSnafu, WidthMismatchSnafu,
};
use crate::array::binary::read_offset;
use crate::array::dictionary::ID_WIDTH;
use crate::array::{
    ArrayImpl, BinaryArray, DictionaryArray, PrimitiveArray, PrimitiveType, RunLengthArray,
};
use crate::bitmap::{Bitmap, bytes_for};
use crate::element::timestamp::LongTimestampTz;
use crate::macros::for_all_primitive_types;
use crate::types::{LogicalType, PhysicalType};

pub(crate) const FIXED_WIDTH: u8 = 1;
pub(crate) const VARIABLE_WIDTH: u8 = 2;
pub(crate) const DICTIONARY: u8 = 3;
pub(crate) const RUN_LENGTH: u8 = 4;
pub(crate) const ALL_NULL: u8 = 5;

/// Split `len` bytes from the front of the buffer
#[inline]
pub(crate) fn take(buf: &mut Bytes, len: usize) -> Result<Bytes> {
    ensure!(
        buf.remaining() >= len,
        TruncatedSnafu {
            needed: len,
            remaining: buf.remaining()
        }
    );
    Ok(buf.split_to(len))
}

#[inline]
pub(crate) fn read_u8(buf: &mut Bytes) -> Result<u8> {
    ensure!(
        buf.has_remaining(),
        TruncatedSnafu {
            needed: 1_usize,
            remaining: 0_usize
        }
    );
    Ok(buf.get_u8())
}

#[inline]
pub(crate) fn read_u32(buf: &mut Bytes) -> Result<u32> {
    ensure!(
        buf.remaining() >= 4,
        TruncatedSnafu {
            needed: 4_usize,
            remaining: buf.remaining()
        }
    );
    Ok(buf.get_u32_le())
}

fn read_validity(buf: &mut Bytes, position_count: usize) -> Result<Option<Bitmap>> {
    match read_u8(buf)? {
        0 => Ok(None),
        1 => {
            let bits = take(buf, bytes_for(position_count))?;
            Ok(Some(Bitmap::from_packed(bits, position_count)))
        }
        flag => InvalidFlagSnafu { flag }.fail(),
    }
}

fn write_validity(validity: Option<&Bitmap>, out: &mut BytesMut) {
    match validity {
        Some(validity) => {
            out.put_u8(1);
            validity.write_packed(out);
        }
        None => out.put_u8(0),
    }
}

fn write_fixed_width<T: PrimitiveType>(array: &PrimitiveArray<T>, out: &mut BytesMut) {
    out.put_u8(FIXED_WIDTH);
    out.put_u32_le(array.len() as u32);
    write_validity(array.validity(), out);
    out.put_u8(T::WIDTH as u8);
    out.put_slice(array.values_bytes());
}

fn write_variable_width(array: &BinaryArray, out: &mut BytesMut) {
    out.put_u8(VARIABLE_WIDTH);
    out.put_u32_le(array.len() as u32);
    write_validity(array.validity(), out);
    let base = array.offset(0);
    (0..=array.len()).for_each(|index| out.put_u32_le((array.offset(index) - base) as u32));
    out.put_slice(&array.bytes()[base..array.offset(array.len())]);
}

macro_rules! write_array {
    ($({$variant:ident, $element_ty:ty, $array_ty:ident, $builder_ty:ident}),+) => {
        /// Append the encoded array into `out`
        pub(crate) fn write_array(array: &ArrayImpl, out: &mut BytesMut) {
            if array.is_all_null() {
                out.put_u8(ALL_NULL);
                out.put_u32_le(array.len() as u32);
                return;
            }
            match array {
                $(
                    ArrayImpl::$variant(array) => write_fixed_width(array, out),
                )+
                ArrayImpl::Binary(array) => write_variable_width(array, out),
                // Every id resolves to null
                ArrayImpl::Dictionary(array) if array.dictionary().is_all_null() => {
                    out.put_u8(ALL_NULL);
                    out.put_u32_le(array.len() as u32);
                }
                ArrayImpl::Dictionary(array) => {
                    out.put_u8(DICTIONARY);
                    out.put_u32_le(array.len() as u32);
                    write_array(array.dictionary(), out);
                    out.put_slice(array.ids_bytes());
                }
                ArrayImpl::RunLength(array) => {
                    out.put_u8(RUN_LENGTH);
                    out.put_u32_le(array.len() as u32);
                    write_array(array.value(), out);
                }
            }
        }
    };
}

for_all_primitive_types!(write_array);

macro_rules! read_fixed_width {
    ($({$variant:ident, $element_ty:ty, $array_ty:ident, $builder_ty:ident}),+) => {
        fn read_fixed_width(
            buf: &mut Bytes,
            logical_type: LogicalType,
            position_count: usize,
        ) -> Result<ArrayImpl> {
            let Some(expected_width) = logical_type.fixed_size() else {
                return EncodingTypeMismatchSnafu {
                    encoding: "fixed width",
                    logical_type,
                }
                .fail();
            };
            let validity = read_validity(buf, position_count)?;
            let width = read_u8(buf)?;
            ensure!(
                width as usize == expected_width,
                WidthMismatchSnafu {
                    width,
                    logical_type
                }
            );
            let values = take(buf, position_count.saturating_mul(expected_width))?;
            match logical_type.physical_type() {
                $(
                    PhysicalType::$variant => Ok(ArrayImpl::$variant(
                        PrimitiveArray::<$element_ty>::try_new(logical_type, values, validity)
                            .context(InvalidArraySnafu)?,
                    )),
                )+
                PhysicalType::Binary => EncodingTypeMismatchSnafu {
                    encoding: "fixed width",
                    logical_type,
                }
                .fail(),
            }
        }
    };
}

for_all_primitive_types!(read_fixed_width);

fn read_variable_width(
    buf: &mut Bytes,
    logical_type: LogicalType,
    position_count: usize,
) -> Result<ArrayImpl> {
    ensure!(
        logical_type.physical_type() == PhysicalType::Binary,
        EncodingTypeMismatchSnafu {
            encoding: "variable width",
            logical_type,
        }
    );
    let validity = read_validity(buf, position_count)?;
    let offsets = take(
        buf,
        position_count
            .saturating_add(1)
            .saturating_mul(crate::array::binary::OFFSET_WIDTH),
    )?;
    let bytes_len = read_offset(&offsets, position_count);
    let bytes = take(buf, bytes_len)?;
    let array =
        BinaryArray::try_new(logical_type, offsets, bytes, validity).context(InvalidArraySnafu)?;
    Ok(ArrayImpl::Binary(array))
}

/// Decode an array of the agreed logical type from the front of the buffer
#[inline]
pub(crate) fn read_array(buf: &mut Bytes, logical_type: LogicalType) -> Result<ArrayImpl> {
    read_column(buf, logical_type, None)
}

/// Nested arrays, the dictionary and the run length value, are always flat and have at
/// most `max_nested` positions. The count is checked before anything is allocated
fn read_column(
    buf: &mut Bytes,
    logical_type: LogicalType,
    max_nested: Option<usize>,
) -> Result<ArrayImpl> {
    let tag = read_u8(buf)?;
    let position_count = read_u32(buf)? as usize;
    if let Some(limit) = max_nested {
        ensure!(
            !matches!(tag, DICTIONARY | RUN_LENGTH),
            NestedEncodingSnafu { tag }
        );
        ensure!(
            position_count <= limit,
            NestedTooLargeSnafu {
                positions: position_count,
                limit
            }
        );
    }
    match tag {
        FIXED_WIDTH => read_fixed_width(buf, logical_type, position_count),
        VARIABLE_WIDTH => read_variable_width(buf, logical_type, position_count),
        DICTIONARY => {
            // A dictionary of nulls is written as all null, the nested all null column
            // is bounded by the ids, which must be present in the buffer
            let ids_len = position_count.saturating_mul(ID_WIDTH);
            ensure!(
                buf.remaining() >= ids_len,
                TruncatedSnafu {
                    needed: ids_len,
                    remaining: buf.remaining()
                }
            );
            let dictionary = read_column(buf, logical_type, Some(position_count.max(1)))?;
            let ids = take(buf, ids_len)?;
            let array = DictionaryArray::try_from_parts(Arc::new(dictionary), ids)
                .context(InvalidArraySnafu)?;
            Ok(ArrayImpl::Dictionary(array))
        }
        RUN_LENGTH => {
            let value = read_column(buf, logical_type, Some(1))?;
            let array = RunLengthArray::try_from_parts(Arc::new(value), position_count)
                .context(InvalidArraySnafu)?;
            Ok(ArrayImpl::RunLength(array))
        }
        ALL_NULL if max_nested.is_some() => {
            Ok(ArrayImpl::new_flat_null(logical_type, position_count))
        }
        ALL_NULL => Ok(ArrayImpl::new_null(logical_type, position_count)),
        tag => UnknownEncodingSnafu { tag }.fail(),
    }
}
