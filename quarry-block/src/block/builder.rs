//! [`DataBlockBuilder`] accumulates rows into column builders until the block is full

use snafu::ensure;

use super::{DataBlock, Result, UndeclaredPositionsSnafu};
use crate::array::{ArrayBuilderImpl, DEFAULT_MAX_BLOCK_SIZE_IN_BYTES};
use crate::types::LogicalType;

/// Configuration of the [`DataBlockBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBlockBuilderConfig {
    /// The block is full once the appended bytes reach it
    pub max_block_size_in_bytes: usize,
    /// The block is full once the declared rows reach it
    pub max_block_rows: usize,
    /// Number of entries the column builders preallocate
    pub expected_entries: usize,
}

impl Default for DataBlockBuilderConfig {
    fn default() -> Self {
        Self {
            max_block_size_in_bytes: DEFAULT_MAX_BLOCK_SIZE_IN_BYTES,
            max_block_rows: i32::MAX as usize,
            expected_entries: 8,
        }
    }
}

impl DataBlockBuilderConfig {
    /// Set the size limit of a block
    pub fn with_max_block_size_in_bytes(mut self, max_block_size_in_bytes: usize) -> Self {
        self.max_block_size_in_bytes = max_block_size_in_bytes;
        self
    }

    /// Set the row limit of a block
    pub fn with_max_block_rows(mut self, max_block_rows: usize) -> Self {
        self.max_block_rows = max_block_rows;
        self
    }

    /// Set the number of entries the column builders preallocate
    pub fn with_expected_entries(mut self, expected_entries: usize) -> Self {
        self.expected_entries = expected_entries;
        self
    }
}

/// Builder of [`DataBlock`]. Write a value into every column builder, then call
/// [`DataBlockBuilder::declare_position`] to complete the row.
///
/// ```
/// use quarry_block::block::{DataBlockBuilder, DataBlockBuilderConfig};
/// use quarry_block::types::LogicalType;
///
/// let mut builder = DataBlockBuilder::new(
///     vec![LogicalType::BigInt, LogicalType::VarChar],
///     DataBlockBuilderConfig::default(),
/// );
/// builder.array_builder_mut(0).write_long(7).unwrap();
/// builder.array_builder_mut(1).write_bytes(b"seven").unwrap();
/// builder.declare_position();
///
/// let block = builder.build().unwrap();
/// assert_eq!(block.len(), 1);
/// assert!(builder.is_empty());
/// ```
#[derive(Debug)]
pub struct DataBlockBuilder {
    logical_types: Vec<LogicalType>,
    array_builders: Vec<ArrayBuilderImpl>,
    declared_positions: usize,
    config: DataBlockBuilderConfig,
}

impl DataBlockBuilder {
    /// Create a builder with a column builder per logical type
    pub fn new(logical_types: Vec<LogicalType>, config: DataBlockBuilderConfig) -> Self {
        let array_builders = logical_types
            .iter()
            .map(|&logical_type| {
                ArrayBuilderImpl::with_config(
                    logical_type,
                    config.expected_entries,
                    config.max_block_size_in_bytes,
                )
            })
            .collect();
        Self {
            logical_types,
            array_builders,
            declared_positions: 0,
            config,
        }
    }

    /// Logical types of the columns
    #[inline]
    pub fn logical_types(&self) -> &[LogicalType] {
        &self.logical_types
    }

    /// Get the builder of the column. It will panic if the index out of bounds
    #[inline]
    pub fn array_builder_mut(&mut self, index: usize) -> &mut ArrayBuilderImpl {
        &mut self.array_builders[index]
    }

    /// Get the builders of all of the columns
    #[inline]
    pub fn array_builders_mut(&mut self) -> &mut [ArrayBuilderImpl] {
        &mut self.array_builders
    }

    /// Complete a row, all of the column builders should have been written
    #[inline]
    pub fn declare_position(&mut self) {
        self.declared_positions += 1;
    }

    /// Complete `positions` rows
    #[inline]
    pub fn declare_positions(&mut self, positions: usize) {
        self.declared_positions += positions;
    }

    /// Number of rows declared since the last build
    #[inline]
    pub fn position_count(&self) -> usize {
        self.declared_positions
    }

    /// Returns true if no row is declared
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.declared_positions == 0
    }

    /// Number of bytes appended since the last build
    pub fn size_in_bytes(&self) -> usize {
        self.array_builders
            .iter()
            .map(ArrayBuilderImpl::size_in_bytes)
            .sum()
    }

    /// Returns true if the block reaches the size limit or the row limit
    pub fn is_full(&self) -> bool {
        self.declared_positions >= self.config.max_block_rows
            || self.size_in_bytes() >= self.config.max_block_size_in_bytes
    }

    /// Build the declared rows into a [`DataBlock`] and reset the builder. Fails if
    /// any column builder disagrees with the declared positions, the builder is
    /// unchanged in this case
    pub fn build(&mut self) -> Result<DataBlock> {
        ensure!(
            self.array_builders
                .iter()
                .all(|builder| builder.len() == self.declared_positions),
            UndeclaredPositionsSnafu {
                lengths: self
                    .array_builders
                    .iter()
                    .map(ArrayBuilderImpl::len)
                    .collect::<Vec<_>>(),
                declared_positions: self.declared_positions,
            }
        );

        let arrays = self
            .array_builders
            .iter_mut()
            .map(ArrayBuilderImpl::flush)
            .collect();
        let length = std::mem::take(&mut self.declared_positions);
        tracing::trace!(
            "Built data block with {} rows and {} columns",
            length,
            self.array_builders.len()
        );
        Ok(DataBlock { arrays, length })
    }

    /// Same as [`Self::build`], named after the flushing loop of the producers
    #[inline]
    pub fn flush(&mut self) -> Result<DataBlock> {
        self.build()
    }

    /// Discard the rows appended since the last build
    pub fn reset(&mut self) {
        self.array_builders.iter_mut().for_each(|builder| {
            builder.flush();
        });
        self.declared_positions = 0;
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::array::{ArrayImpl, Int64Array};

    #[test]
    fn test_build_rejects_undeclared_positions() {
        let mut builder = DataBlockBuilder::new(
            vec![LogicalType::BigInt, LogicalType::Double],
            DataBlockBuilderConfig::default(),
        );
        builder.array_builder_mut(0).write_long(1).unwrap();
        builder.declare_position();

        let err = builder.build().unwrap_err();
        let expect = expect_test::expect![
            "Column builders have [1, 0] entries, 1 positions are declared"
        ];
        expect.assert_eq(&err.to_string());
        assert_eq!(builder.position_count(), 1);

        builder.array_builder_mut(1).write_double(0.5).unwrap();
        assert_eq!(builder.build().unwrap().len(), 1);

        builder.array_builder_mut(0).write_long(1).unwrap();
        builder.reset();
        assert!(builder.is_empty());
        assert_eq!(builder.array_builder_mut(0).len(), 0);
    }

    #[test]
    fn test_is_full_by_rows() {
        let mut builder = DataBlockBuilder::new(
            vec![LogicalType::Integer],
            DataBlockBuilderConfig::default().with_max_block_rows(2),
        );
        for v in 0..2 {
            assert!(!builder.is_full());
            builder.array_builder_mut(0).write_long(v).unwrap();
            builder.declare_position();
        }
        assert!(builder.is_full());
    }

    #[test]
    fn test_flush_ten_million_rows_into_blocks() {
        const ROWS: usize = 10_000_000;

        fn input() -> impl Iterator<Item = Option<i64>> {
            let mut rng = StdRng::seed_from_u64(42);
            (0..ROWS).map(move |_| {
                if rng.gen_ratio(1, 10) {
                    None
                } else {
                    Some(rng.r#gen::<i64>())
                }
            })
        }

        let mut builder = DataBlockBuilder::new(
            vec![LogicalType::BigInt],
            DataBlockBuilderConfig::default(),
        );
        let mut blocks = Vec::new();
        for value in input() {
            builder
                .array_builder_mut(0)
                .append_option(value.map(Into::into))
                .unwrap();
            builder.declare_position();
            if builder.is_full() {
                blocks.push(builder.build().unwrap());
            }
        }
        if !builder.is_empty() {
            blocks.push(builder.build().unwrap());
        }

        assert!(blocks.len() > 1);
        assert!(
            blocks
                .iter()
                .all(|block| block.size_in_bytes() < DEFAULT_MAX_BLOCK_SIZE_IN_BYTES + 16)
        );
        assert_eq!(blocks.iter().map(DataBlock::len).sum::<usize>(), ROWS);
        assert!(matches!(blocks[0].get_array(0), Some(ArrayImpl::Int64(_))));

        // Concatenation of the blocks equals the input
        let mut expected = input();
        for block in &blocks {
            let array: &Int64Array = block.get_array(0).unwrap().try_into().unwrap();
            assert!(array.iter().eq(expected.by_ref().take(array.len())));
        }
        assert!(expected.next().is_none());
    }
}
