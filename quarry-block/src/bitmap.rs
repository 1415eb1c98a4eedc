//! Validity bitmap of the arrays
//!
//! Bit `i` is stored in the byte `i / 8` at bit `i % 8` (LSB first), a set bit means
//! the position is valid (not null). It is the layout used on the wire, therefore
//! decoding a bitmap never copies

use std::fmt::Debug;

use bytes::{BufMut, Bytes, BytesMut};

/// Number of bytes needed to store `len` bits
#[inline]
pub const fn bytes_for(len: usize) -> usize {
    len.div_ceil(8)
}

#[inline]
fn get_bit(bytes: &[u8], index: usize) -> bool {
    bytes[index >> 3] & (1 << (index & 7)) != 0
}

fn count_zeros_in_range(bytes: &[u8], offset: usize, len: usize) -> usize {
    (offset..offset + len)
        .filter(|&index| !get_bit(bytes, index))
        .count()
}

/// Immutable bitmap. The bits are reference counted, [`Bitmap::slice`] is zero copy
#[derive(Clone)]
pub struct Bitmap {
    bits: Bytes,
    /// Offset in bits
    offset: usize,
    len: usize,
    count_zeros: usize,
}

impl Bitmap {
    /// Create a bitmap with `len` bits from the packed bytes.
    ///
    /// # Panics
    ///
    /// Panics if the bytes can not hold `len` bits
    pub fn from_packed(bits: Bytes, len: usize) -> Self {
        assert!(bits.len() >= bytes_for(len));
        let count_zeros = count_zeros_in_range(&bits, 0, len);
        Self {
            bits,
            offset: 0,
            len,
            count_zeros,
        }
    }

    /// Number of bits in the bitmap
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the bitmap is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of unset bits (nulls)
    #[inline]
    pub fn count_zeros(&self) -> usize {
        self.count_zeros
    }

    /// Returns true if all of the bits in the bitmap are set
    #[inline]
    pub fn all_valid(&self) -> bool {
        self.count_zeros == 0
    }

    /// Get the bit with given index.
    ///
    /// # Panics
    ///
    /// Panics if the index out of bounds
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len);
        get_bit(&self.bits, self.offset + index)
    }

    /// Get the iterator of the bits
    pub fn iter(&self) -> impl ExactSizeIterator<Item = bool> + '_ {
        (0..self.len).map(|index| get_bit(&self.bits, self.offset + index))
    }

    /// Slice the bitmap without copy the bits. Caller should guarantee
    /// `offset + len <= self.len()`
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        assert!(offset + len <= self.len);
        let count_zeros = if self.count_zeros == 0 {
            0
        } else {
            count_zeros_in_range(&self.bits, self.offset + offset, len)
        };
        Self {
            bits: self.bits.clone(),
            offset: self.offset + offset,
            len,
            count_zeros,
        }
    }

    /// Number of bytes covered by the live bits
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        bytes_for(self.len)
    }

    /// Number of bytes referenced by the bitmap, including the bytes outside of the slice
    #[inline]
    pub fn retained_size_in_bytes(&self) -> usize {
        self.bits.len()
    }

    /// Returns true if two bitmaps share the same bits
    #[inline]
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        self.bits.as_ptr() == other.bits.as_ptr() && self.offset == other.offset
    }

    /// Write the live bits into `out`, the first bit is aligned to the bit 0 of the first
    /// byte and the unused bits of the last byte are zero
    pub fn write_packed(&self, out: &mut BytesMut) {
        if self.offset % 8 == 0 {
            let start = self.offset / 8;
            let bytes = &self.bits[start..start + bytes_for(self.len)];
            out.put_slice(bytes);
            let tail = self.len % 8;
            if tail != 0 {
                if let Some(last) = out.last_mut() {
                    *last &= (1_u8 << tail) - 1;
                }
            }
        } else {
            let mut byte = 0_u8;
            for (index, bit) in self.iter().enumerate() {
                byte |= (bit as u8) << (index & 7);
                if index & 7 == 7 {
                    out.put_u8(byte);
                    byte = 0;
                }
            }
            if self.len % 8 != 0 {
                out.put_u8(byte);
            }
        }
    }
}

impl Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bitmap {{ len: {}, bits: [", self.len)?;
        self.iter()
            .try_for_each(|bit| write!(f, "{}", if bit { 1 } else { 0 }))?;
        write!(f, "] }}")
    }
}

/// Growable bitmap used by the builders
#[derive(Debug, Default)]
pub struct MutableBitmap {
    bits: BytesMut,
    len: usize,
}

impl MutableBitmap {
    /// Create a bitmap that can hold `capacity` bits without reallocation
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bits: BytesMut::with_capacity(bytes_for(capacity)),
            len: 0,
        }
    }

    /// Number of bits in the bitmap
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the bitmap is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a bit
    #[inline]
    pub fn push(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.bits.put_u8(0);
        }
        if bit {
            let last = self.bits.len() - 1;
            self.bits[last] |= 1 << (self.len & 7);
        }
        self.len += 1;
    }

    /// Append `additional` bits with same value
    pub fn extend_constant(&mut self, additional: usize, bit: bool) {
        (0..additional).for_each(|_| self.push(bit));
    }

    /// Number of bytes used by the live bits
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.bits.len()
    }

    /// Number of bytes allocated
    #[inline]
    pub fn capacity_in_bytes(&self) -> usize {
        self.bits.capacity()
    }

    /// Freeze the bits appended so far into a [`Bitmap`], self becomes empty and keeps
    /// the spare capacity
    pub fn split_freeze(&mut self) -> Bitmap {
        let len = std::mem::take(&mut self.len);
        Bitmap::from_packed(self.bits.split().freeze(), len)
    }
}
