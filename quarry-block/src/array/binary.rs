//! [`BinaryArray`] stores variable length bytes, backs `VarChar` and `VarBinary`

use std::fmt::Debug;

use bytes::{BufMut, Bytes, BytesMut};
use snafu::ensure;

use super::{InvalidLogicalTypeSnafu, InvalidOffsetsSnafu, Result, ValidityLengthSnafu};
use crate::bitmap::{Bitmap, MutableBitmap};
use crate::types::{LogicalType, PhysicalType};

/// Width of a single offset
pub const OFFSET_WIDTH: usize = std::mem::size_of::<u32>();

#[inline]
pub(crate) fn read_offset(offsets: &[u8], index: usize) -> usize {
    let start = index * OFFSET_WIDTH;
    let mut raw = [0; OFFSET_WIDTH];
    raw.copy_from_slice(&offsets[start..start + OFFSET_WIDTH]);
    u32::from_le_bytes(raw) as usize
}

/// Array of variable length bytes. Element `i` is `bytes[offsets[i]..offsets[i+1]]`,
/// offsets are `u32` in little endian and point into `bytes`
#[derive(Clone)]
pub struct BinaryArray {
    logical_type: LogicalType,
    /// `len + 1` offsets
    offsets: Bytes,
    bytes: Bytes,
    validity: Option<Bitmap>,
    retained_bytes: usize,
}

impl BinaryArray {
    /// Create a new [`BinaryArray`], the offsets should be monotonic and point into
    /// the bytes
    pub fn try_new(
        logical_type: LogicalType,
        offsets: Bytes,
        bytes: Bytes,
        validity: Option<Bitmap>,
    ) -> Result<Self> {
        ensure!(
            logical_type.physical_type() == PhysicalType::Binary,
            InvalidLogicalTypeSnafu {
                array_name: "BinaryArray",
                array_physical_type: PhysicalType::Binary,
                logical_type,
            }
        );
        validate_offsets(&offsets, bytes.len())?;
        let len = offsets.len() / OFFSET_WIDTH - 1;
        if let Some(validity) = &validity {
            ensure!(
                validity.len() == len,
                ValidityLengthSnafu {
                    validity_len: validity.len(),
                    len,
                }
            );
        }
        let retained_bytes = offsets.len() + bytes.len();
        Ok(Self::from_parts(
            logical_type,
            offsets,
            bytes,
            validity,
            retained_bytes,
        ))
    }

    /// Caller should guarantee the invariants checked in [`Self::try_new`]
    #[inline]
    pub(crate) fn from_parts(
        logical_type: LogicalType,
        offsets: Bytes,
        bytes: Bytes,
        validity: Option<Bitmap>,
        retained_bytes: usize,
    ) -> Self {
        debug_assert!(offsets.len() >= OFFSET_WIDTH);
        Self {
            logical_type,
            offsets,
            bytes,
            validity: validity.filter(|validity| !validity.all_valid()),
            retained_bytes,
        }
    }

    /// Create a new empty [`BinaryArray`]
    pub fn new_empty(logical_type: LogicalType) -> Result<Self> {
        Self::try_new(
            logical_type,
            Bytes::from_static(&[0; OFFSET_WIDTH]),
            Bytes::new(),
            None,
        )
    }

    /// Construct `VarChar` array from iterator of strings
    pub fn from_str_iter<'a, I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut array: Self = iter
            .into_iter()
            .map(|element| element.map(str::as_bytes))
            .collect();
        array.logical_type = LogicalType::VarChar;
        array
    }

    /// Change the logical type of the array, the new logical type should be variable
    /// width
    pub fn with_logical_type(mut self, logical_type: LogicalType) -> Result<Self> {
        ensure!(
            logical_type.physical_type() == PhysicalType::Binary,
            InvalidLogicalTypeSnafu {
                array_name: "BinaryArray",
                array_physical_type: PhysicalType::Binary,
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
        self.offsets.len() / OFFSET_WIDTH - 1
    }

    /// Returns true if the array contains no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
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

    /// Offset of the element with given index into [`Self::bytes`], `index <= len`
    #[inline]
    pub fn offset(&self, index: usize) -> usize {
        read_offset(&self.offsets, index)
    }

    /// Bytes referenced by the offsets
    #[inline]
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
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

    /// Get the value with given index, ignoring the validity
    #[inline]
    pub fn value(&self, index: usize) -> &[u8] {
        &self.bytes[self.offset(index)..self.offset(index + 1)]
    }

    /// Get the element with given index. It will panic if the index out of bounds
    #[inline]
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        if self.is_null(index) {
            None
        } else {
            Some(self.value(index))
        }
    }

    /// Iterator of the elements
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Option<&[u8]>> + '_ {
        (0..self.len()).map(|index| self.get(index))
    }

    /// Zero copy slice. It will panic if `offset + len > self.len()`
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        assert!(offset + len <= self.len());
        Self {
            logical_type: self.logical_type,
            offsets: self
                .offsets
                .slice(offset * OFFSET_WIDTH..(offset + len + 1) * OFFSET_WIDTH),
            bytes: self.bytes.clone(),
            validity: self
                .validity
                .as_ref()
                .map(|validity| validity.slice(offset, len))
                .filter(|validity| !validity.all_valid()),
            retained_bytes: self.retained_bytes,
        }
    }

    /// Number of bytes of the live values, offsets and validity
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        (self.offset(self.len()) - self.offset(0))
            + self.offsets.len()
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
        self.offsets.as_ptr() == other.offsets.as_ptr()
            && self.offsets.len() == other.offsets.len()
            && self.bytes.as_ptr() == other.bytes.as_ptr()
    }
}

/// Offsets should contain at least one offset, be monotonic and end inside the bytes
pub(crate) fn validate_offsets(offsets: &[u8], bytes_len: usize) -> Result<()> {
    ensure!(
        offsets.len() >= OFFSET_WIDTH && offsets.len() % OFFSET_WIDTH == 0,
        InvalidOffsetsSnafu {
            reason: format!("offsets has {} bytes", offsets.len())
        }
    );
    let num_offsets = offsets.len() / OFFSET_WIDTH;
    let mut previous = read_offset(offsets, 0);
    for index in 1..num_offsets {
        let current = read_offset(offsets, index);
        ensure!(
            current >= previous,
            InvalidOffsetsSnafu {
                reason: format!("offset {index} is {current}, less than previous {previous}")
            }
        );
        previous = current;
    }
    ensure!(
        previous <= bytes_len,
        InvalidOffsetsSnafu {
            reason: format!("last offset {previous} exceeds {bytes_len} bytes")
        }
    );
    Ok(())
}

impl<V: AsRef<[u8]>> FromIterator<Option<V>> for BinaryArray {
    /// Collect into `VarBinary` array
    fn from_iter<I: IntoIterator<Item = Option<V>>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let (low, _) = iter.size_hint();
        let mut offsets = BytesMut::with_capacity((low + 1) * OFFSET_WIDTH);
        let mut bytes = BytesMut::new();
        let mut validity = MutableBitmap::with_capacity(low);
        offsets.put_u32_le(0);
        iter.for_each(|element| {
            validity.push(element.is_some());
            if let Some(element) = element {
                bytes.put_slice(element.as_ref());
            }
            offsets.put_u32_le(bytes.len() as u32);
        });
        let retained_bytes = offsets.capacity() + bytes.capacity();
        Self::from_parts(
            LogicalType::VarBinary,
            offsets.freeze(),
            bytes.freeze(),
            Some(validity.split_freeze()),
            retained_bytes,
        )
    }
}

impl Debug for BinaryArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BinaryArray {{ logical_type: {:?}, len: {}, data: ",
            self.logical_type,
            self.len()
        )?;
        let mut list = f.debug_list();
        self.iter().for_each(|element| {
            match element.map(std::str::from_utf8) {
                Some(Ok(s)) => list.entry(&Some(s)),
                Some(Err(_)) => list.entry(&element),
                None => list.entry(&None::<&str>),
            };
        });
        list.finish()?;
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_array() {
        let array = BinaryArray::from_str_iter([Some("curry"), None, Some(""), Some("quarry")]);
        assert_eq!(array.len(), 4);
        assert_eq!(array.get(0), Some("curry".as_bytes()));
        assert_eq!(array.get(1), None);
        assert_eq!(array.get(2), Some("".as_bytes()));

        let sliced = array.slice(2, 2);
        assert_eq!(sliced.offset(0), 5);
        assert_eq!(sliced.value(1), b"quarry");
        assert_eq!(sliced.size_in_bytes(), 6 + 3 * OFFSET_WIDTH);

        let expect = expect_test::expect![[
            r#"BinaryArray { logical_type: VarChar, len: 4, data: [Some("curry"), None, Some(""), Some("quarry")]}"#
        ]];
        expect.assert_eq(&format!("{:?}", array));
    }

    #[test]
    fn test_invalid_offsets() {
        let mut offsets = BytesMut::new();
        offsets.put_u32_le(0);
        offsets.put_u32_le(4);
        offsets.put_u32_le(2);
        assert!(
            BinaryArray::try_new(
                LogicalType::VarBinary,
                offsets.freeze(),
                Bytes::from_static(b"abcd"),
                None
            )
            .is_err()
        );

        let mut offsets = BytesMut::new();
        offsets.put_u32_le(0);
        offsets.put_u32_le(5);
        assert!(
            BinaryArray::try_new(
                LogicalType::VarBinary,
                offsets.freeze(),
                Bytes::from_static(b"abcd"),
                None
            )
            .is_err()
        );
    }
}
