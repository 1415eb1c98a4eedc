//! [`DataBlock`] is a collection of [`ArrayImpl`]

pub mod builder;

use std::fmt::Display;

use snafu::{Snafu, ensure};
use tabled::builder::Builder as TableBuilder;

pub use self::builder::{DataBlockBuilder, DataBlockBuilderConfig};
use crate::array::{ArrayError, ArrayImpl};
use crate::types::LogicalType;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DataBlockError {
    #[snafu(display("Arrays have different length. Lengths: {lengths:?}"))]
    InconsistentLength { lengths: Vec<usize> },
    #[snafu(display(
        "Column builders have {lengths:?} entries, {declared_positions} positions are declared"
    ))]
    UndeclaredPositions {
        lengths: Vec<usize>,
        declared_positions: usize,
    },
    #[snafu(display("Failed to slice the data block"))]
    Slice { source: ArrayError },
}

/// Alias of the error returned by [`DataBlock::try_new`]
pub type InconsistentLengthError = DataBlockError;

type Result<T> = std::result::Result<T, DataBlockError>;

/// [`DataBlock`] is a collection of [`ArrayImpl`], a batch of rows stored in columns
#[derive(Debug, Clone)]
pub struct DataBlock {
    arrays: Vec<ArrayImpl>,
    /// Number of element in the data block. All of the arrays should have same length.
    /// If the [`Self::arrays`] is empty the length is zero
    length: usize,
}

impl DataBlock {
    /// Create a new [`DataBlock`] with all of the arrays have same length
    pub fn try_new(arrays: Vec<ArrayImpl>) -> Result<Self> {
        let mut iter = arrays.iter();
        let Some(length) = iter.next().map(|array| array.len()) else {
            return Ok(Self { arrays, length: 0 });
        };

        ensure!(
            iter.all(|array| array.len() == length),
            InconsistentLengthSnafu {
                lengths: arrays.iter().map(ArrayImpl::len).collect::<Vec<_>>()
            }
        );

        Ok(Self { arrays, length })
    }

    /// Create a new [`DataBlock`] with given logical types, all of the arrays
    /// will be empty
    #[inline]
    pub fn with_logical_types(logical_types: &[LogicalType]) -> Self {
        Self {
            arrays: logical_types
                .iter()
                .map(|&logical_type| ArrayImpl::new_empty(logical_type))
                .collect(),
            length: 0,
        }
    }

    /// Get number of elements in the data block
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns true if the length is 0
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Get number of arrays in the data block
    #[inline]
    pub fn num_arrays(&self) -> usize {
        self.arrays.len()
    }

    /// Get a reference to the array with given index
    #[inline]
    pub fn get_array(&self, index: usize) -> Option<&ArrayImpl> {
        self.arrays.get(index)
    }

    /// Get arrays
    #[inline]
    pub fn arrays(&self) -> &[ArrayImpl] {
        &self.arrays
    }

    /// Consume the data block and return the arrays
    #[inline]
    pub fn into_arrays(self) -> Vec<ArrayImpl> {
        self.arrays
    }

    /// Logical types of the arrays
    pub fn logical_types(&self) -> Vec<LogicalType> {
        self.arrays
            .iter()
            .map(|array| *array.logical_type())
            .collect()
    }

    /// Zero copy view of the rows `[offset, offset + len)`
    pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
        let arrays = self
            .arrays
            .iter()
            .map(|array| array.slice(offset, len))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|source| DataBlockError::Slice { source })?;
        Ok(Self {
            arrays,
            length: if self.arrays.is_empty() { 0 } else { len },
        })
    }

    /// Size of the live data in bytes
    pub fn size_in_bytes(&self) -> usize {
        self.arrays.iter().map(ArrayImpl::size_in_bytes).sum()
    }

    /// Size of the allocations referenced by the data block in bytes
    pub fn retained_size_in_bytes(&self) -> usize {
        self.arrays
            .iter()
            .map(ArrayImpl::retained_size_in_bytes)
            .sum()
    }

    /// Format the data block with given table builder
    pub fn fmt_table(&self, table_builder: &mut TableBuilder, with_logical_type: bool) {
        if with_logical_type {
            table_builder.push_record(
                self.arrays
                    .iter()
                    .map(|array| array.logical_type().to_string()),
            );
        }

        (0..self.length).for_each(|index| {
            table_builder.push_record(self.arrays.iter().map(|array| {
                array
                    .get(index)
                    .map_or_else(|| "Null".to_string(), |element| element.to_string())
            }));
        });
    }
}

/// Compare the arrays element by element, encodings may differ
impl PartialEq for DataBlock {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length && self.arrays == other.arrays
    }
}

impl Display for DataBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table_builder = TableBuilder::default();
        self.fmt_table(&mut table_builder, true);
        write!(
            f,
            "{}",
            table_builder
                .build()
                .with(tabled::settings::style::Style::modern())
        )
    }
}
