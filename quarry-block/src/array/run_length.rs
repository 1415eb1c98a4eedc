//! [`RunLengthArray`] repeats a single value

use std::fmt::Debug;
use std::sync::Arc;

use snafu::ensure;

use super::{ArrayImpl, InvalidRunLengthSnafu, NestedEncodingSnafu, Result};
use crate::types::LogicalType;

/// Array whose elements are all equal to the single element of `value`
#[derive(Clone)]
pub struct RunLengthArray {
    value: Arc<ArrayImpl>,
    len: usize,
}

impl RunLengthArray {
    /// Repeat the single element of the flat `value` array `len` times
    pub fn try_new(value: ArrayImpl, len: usize) -> Result<Self> {
        Self::try_from_parts(Arc::new(value), len)
    }

    /// Same as [`Self::try_new`] with shared value
    pub fn try_from_parts(value: Arc<ArrayImpl>, len: usize) -> Result<Self> {
        ensure!(
            value.is_flat(),
            NestedEncodingSnafu {
                outer: "RunLengthArray",
                inner: value.ident(),
            }
        );
        ensure!(
            value.len() == 1,
            InvalidRunLengthSnafu {
                value_len: value.len()
            }
        );
        Ok(Self { value, len })
    }

    /// Caller should guarantee the value is flat and has a single element
    #[inline]
    pub(crate) fn from_parts(value: Arc<ArrayImpl>, len: usize) -> Self {
        debug_assert!(value.is_flat() && value.len() == 1);
        Self { value, len }
    }

    /// The array that contains the single repeated element
    #[inline]
    pub fn value(&self) -> &Arc<ArrayImpl> {
        &self.value
    }

    /// Logical type of the value
    #[inline]
    pub fn logical_type(&self) -> &LogicalType {
        self.value.logical_type()
    }

    /// Number of elements in the array
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the array contains no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if the repeated element is null
    #[inline]
    pub fn is_null(&self) -> bool {
        self.value.is_null(0)
    }

    /// Slice shares the value. It will panic if `offset + len > self.len()`
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        assert!(offset + len <= self.len);
        Self {
            value: Arc::clone(&self.value),
            len,
        }
    }

    #[inline]
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value) && self.len == other.len
    }
}

impl Debug for RunLengthArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLengthArray")
            .field("len", &self.len)
            .field("value", &self.value)
            .finish()
    }
}
