//! [`DictionaryArray`] references the positions of a shared dictionary

use std::fmt::Debug;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use snafu::ensure;

use super::{ArrayImpl, InvalidDictionarySnafu, NestedEncodingSnafu, Result};
use crate::types::LogicalType;

/// Width of a single id
pub const ID_WIDTH: usize = std::mem::size_of::<u32>();

#[inline]
pub(crate) fn read_id(ids: &[u8], index: usize) -> usize {
    let start = index * ID_WIDTH;
    let mut raw = [0; ID_WIDTH];
    raw.copy_from_slice(&ids[start..start + ID_WIDTH]);
    u32::from_le_bytes(raw) as usize
}

/// Array whose element `i` is `dictionary[ids[i]]`. The dictionary is a flat array
/// shared by all of the slices of this array
#[derive(Clone)]
pub struct DictionaryArray {
    dictionary: Arc<ArrayImpl>,
    /// `u32` ids in little endian
    ids: Bytes,
}

impl DictionaryArray {
    /// Create a new [`DictionaryArray`]. The dictionary should be flat and all of
    /// the ids should less than the length of the dictionary
    pub fn try_new(dictionary: ArrayImpl, ids: &[u32]) -> Result<Self> {
        let mut buf = BytesMut::with_capacity(ids.len() * ID_WIDTH);
        ids.iter().for_each(|&id| buf.put_u32_le(id));
        Self::try_from_parts(Arc::new(dictionary), buf.freeze())
    }

    /// Create a new [`DictionaryArray`] from the shared dictionary and the little endian
    /// ids
    pub fn try_from_parts(dictionary: Arc<ArrayImpl>, ids: Bytes) -> Result<Self> {
        ensure!(
            dictionary.is_flat(),
            NestedEncodingSnafu {
                outer: "DictionaryArray",
                inner: dictionary.ident(),
            }
        );
        ensure!(
            ids.len() % ID_WIDTH == 0,
            InvalidDictionarySnafu {
                reason: format!("ids has {} bytes", ids.len())
            }
        );
        let dictionary_len = dictionary.len();
        if let Some(id) = (0..ids.len() / ID_WIDTH)
            .map(|index| read_id(&ids, index))
            .find(|&id| id >= dictionary_len)
        {
            return InvalidDictionarySnafu {
                reason: format!("id {id} out of the dictionary with length {dictionary_len}"),
            }
            .fail();
        }
        Ok(Self { dictionary, ids })
    }

    /// Get the dictionary
    #[inline]
    pub fn dictionary(&self) -> &Arc<ArrayImpl> {
        &self.dictionary
    }

    /// Little endian bytes of the ids
    #[inline]
    pub fn ids_bytes(&self) -> &Bytes {
        &self.ids
    }

    /// Get the id of the element with given index. It will panic if the index out of
    /// bounds
    #[inline]
    pub fn id(&self, index: usize) -> usize {
        read_id(&self.ids, index)
    }

    /// Logical type of the dictionary
    #[inline]
    pub fn logical_type(&self) -> &LogicalType {
        self.dictionary.logical_type()
    }

    /// Number of elements in the array
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len() / ID_WIDTH
    }

    /// Returns true if the array contains no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Zero copy slice, the dictionary is shared. It will panic if
    /// `offset + len > self.len()`
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        assert!(offset + len <= self.len());
        Self {
            dictionary: Arc::clone(&self.dictionary),
            ids: self.ids.slice(offset * ID_WIDTH..(offset + len) * ID_WIDTH),
        }
    }

    /// Number of bytes of the ids and the dictionary
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.ids.len() + self.dictionary.size_in_bytes()
    }

    /// Number of bytes of the allocations referenced by the array
    #[inline]
    pub fn retained_size_in_bytes(&self) -> usize {
        self.ids.len() + self.dictionary.retained_size_in_bytes()
    }

    #[inline]
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.dictionary, &other.dictionary)
            && self.ids.as_ptr() == other.ids.as_ptr()
            && self.ids.len() == other.ids.len()
    }
}

impl Debug for DictionaryArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryArray")
            .field("len", &self.len())
            .field(
                "ids",
                &(0..self.len()).map(|index| self.id(index)).collect::<Vec<_>>(),
            )
            .field("dictionary", &self.dictionary)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Int32Array;

    #[test]
    fn test_dictionary_array() {
        let dictionary = ArrayImpl::Int32(Int32Array::from_iter([Some(7), None, Some(9)]));
        let array = DictionaryArray::try_new(dictionary, &[2, 0, 1, 2]).unwrap();
        assert_eq!(array.len(), 4);
        assert_eq!(array.id(0), 2);
        assert_eq!(array.slice(1, 2).id(1), 1);
    }

    #[test]
    fn test_dictionary_id_out_of_range() {
        let dictionary = ArrayImpl::Int32(Int32Array::from_values_iter([1, 2]));
        let err = DictionaryArray::try_new(dictionary, &[0, 2]).unwrap_err();
        let expect = expect_test::expect![
            "Invalid dictionary: id 2 out of the dictionary with length 2"
        ];
        expect.assert_eq(&err.to_string());
    }
}
