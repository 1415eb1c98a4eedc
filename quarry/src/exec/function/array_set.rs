//! Set functions over arrays: `array_union`, `array_intersect` and `array_distinct`.
//!
//! Union compares the elements with SQL `=`, so `NaN` never matches another `NaN`.
//! Intersect and distinct follow `IS NOT DISTINCT FROM`. Nulls are folded in every
//! function: union and distinct keep a single null, intersect keeps a null only if both
//! sides contain one. `BigInt` arrays take the specialized [`BigintSet`]

use hashbrown::HashMap;
use quarry_block::array::{ArrayBuilderImpl, ArrayImpl};
use quarry_block::block::DataBlockBuilderConfig;
use quarry_block::types::LogicalType;
use quarry_block::utils::hash::{BUILD_HASHER_DEFAULT, BuildHasherDefault};

use crate::common::config::ExecArgs;
use crate::exec::set::{BigintSet, DistinctSet, SetEquality, SetError};

type Result<T> = std::result::Result<T, SetError>;

/// Common interface of the sets the functions run on
trait PositionSet {
    fn with_expected_size(
        logical_type: LogicalType,
        equality: SetEquality,
        expected_size: usize,
    ) -> Self;

    fn add(&mut self, array: &ArrayImpl, position: usize) -> Result<bool>;

    fn contains(&self, array: &ArrayImpl, position: usize) -> Result<bool>;

    fn write_into(&self, builder: &mut ArrayBuilderImpl) -> Result<()>;
}

impl PositionSet for DistinctSet {
    #[inline]
    fn with_expected_size(
        logical_type: LogicalType,
        equality: SetEquality,
        expected_size: usize,
    ) -> Self {
        DistinctSet::new(logical_type, equality, expected_size)
    }

    #[inline]
    fn add(&mut self, array: &ArrayImpl, position: usize) -> Result<bool> {
        DistinctSet::add(self, array, position)
    }

    #[inline]
    fn contains(&self, array: &ArrayImpl, position: usize) -> Result<bool> {
        DistinctSet::contains(self, array, position)
    }

    #[inline]
    fn write_into(&self, builder: &mut ArrayBuilderImpl) -> Result<()> {
        DistinctSet::write_into(self, builder)
    }
}

impl PositionSet for BigintSet {
    #[inline]
    fn with_expected_size(
        _logical_type: LogicalType,
        _equality: SetEquality,
        expected_size: usize,
    ) -> Self {
        BigintSet::new(expected_size)
    }

    #[inline]
    fn add(&mut self, array: &ArrayImpl, position: usize) -> Result<bool> {
        BigintSet::add(self, array, position)
    }

    #[inline]
    fn contains(&self, array: &ArrayImpl, position: usize) -> Result<bool> {
        BigintSet::contains(self, array, position)
    }

    #[inline]
    fn write_into(&self, builder: &mut ArrayBuilderImpl) -> Result<()> {
        BigintSet::write_into(self, builder)
    }
}

fn union_into<S: PositionSet>(
    logical_type: LogicalType,
    left: &ArrayImpl,
    right: &ArrayImpl,
    builder: &mut ArrayBuilderImpl,
) -> Result<()> {
    let mut set = S::with_expected_size(
        logical_type,
        SetEquality::Equal,
        left.len() + right.len(),
    );
    for array in [left, right] {
        for position in 0..array.len() {
            set.add(array, position)?;
        }
    }
    set.write_into(builder)
}

fn intersect_into<S: PositionSet>(
    logical_type: LogicalType,
    left: &ArrayImpl,
    right: &ArrayImpl,
    builder: &mut ArrayBuilderImpl,
) -> Result<()> {
    // Build from the smaller side, the right one if they have the same length
    let (scan, build) = if left.len() < right.len() {
        (right, left)
    } else {
        (left, right)
    };
    if build.is_empty() {
        return Ok(());
    }

    let mut build_set =
        S::with_expected_size(logical_type, SetEquality::NotDistinct, build.len());
    for position in 0..build.len() {
        build_set.add(build, position)?;
    }
    let mut output = S::with_expected_size(logical_type, SetEquality::NotDistinct, build.len());
    for position in 0..scan.len() {
        if build_set.contains(scan, position)? {
            output.add(scan, position)?;
        }
    }
    output.write_into(builder)
}

fn distinct_into<S: PositionSet>(
    logical_type: LogicalType,
    array: &ArrayImpl,
    builder: &mut ArrayBuilderImpl,
) -> Result<()> {
    let mut set = S::with_expected_size(logical_type, SetEquality::NotDistinct, array.len());
    for position in 0..array.len() {
        set.add(array, position)?;
    }
    set.write_into(builder)
}

/// Evaluates the set functions. It keeps one output builder per element type, results
/// of consecutive calls are written into the same buffers and returned as views
#[derive(Debug)]
pub struct ArraySetFunctions {
    config: DataBlockBuilderConfig,
    builders: HashMap<LogicalType, ArrayBuilderImpl, BuildHasherDefault>,
}

impl Default for ArraySetFunctions {
    fn default() -> Self {
        Self::new(DataBlockBuilderConfig::default())
    }
}

impl ArraySetFunctions {
    /// Create the functions, output builders are limited by the config
    pub fn new(config: DataBlockBuilderConfig) -> Self {
        Self {
            config,
            builders: HashMap::with_hasher(BUILD_HASHER_DEFAULT),
        }
    }

    /// Create the functions with the block limits of the execution
    pub fn with_exec_args(args: &ExecArgs) -> Self {
        Self::new(args.block_builder)
    }

    fn output(&mut self, logical_type: LogicalType) -> &mut ArrayBuilderImpl {
        let config = self.config;
        let new_builder = || {
            ArrayBuilderImpl::with_config(
                logical_type,
                config.expected_entries,
                config.max_block_size_in_bytes,
            )
        };
        let builder = self.builders.entry(logical_type).or_insert_with(new_builder);
        if builder.retained_size_in_bytes() >= config.max_block_size_in_bytes {
            tracing::trace!(
                "Output builder of `{}` reached {} bytes, reset it",
                logical_type,
                builder.retained_size_in_bytes()
            );
            *builder = new_builder();
        }
        builder
    }

    fn evaluate(
        &mut self,
        logical_type: LogicalType,
        write: impl FnOnce(&mut ArrayBuilderImpl) -> Result<()>,
    ) -> Result<ArrayImpl> {
        let builder = self.output(logical_type);
        match write(&mut *builder) {
            Ok(()) => Ok(builder.flush()),
            Err(e) => {
                // Drop the partially written elements
                let _ = builder.flush();
                Err(e)
            }
        }
    }

    /// Distinct elements of both arrays, first-seen order, left first
    pub fn union(
        &mut self,
        logical_type: LogicalType,
        left: &ArrayImpl,
        right: &ArrayImpl,
    ) -> Result<ArrayImpl> {
        self.evaluate(logical_type, |builder| {
            if logical_type == LogicalType::BigInt {
                union_into::<BigintSet>(logical_type, left, right, builder)
            } else {
                union_into::<DistinctSet>(logical_type, left, right, builder)
            }
        })
    }

    /// Distinct elements contained by both arrays, in the order of the scanned array
    pub fn intersect(
        &mut self,
        logical_type: LogicalType,
        left: &ArrayImpl,
        right: &ArrayImpl,
    ) -> Result<ArrayImpl> {
        self.evaluate(logical_type, |builder| {
            if logical_type == LogicalType::BigInt {
                intersect_into::<BigintSet>(logical_type, left, right, builder)
            } else {
                intersect_into::<DistinctSet>(logical_type, left, right, builder)
            }
        })
    }

    /// Distinct elements of the array, first-seen order
    pub fn distinct(&mut self, logical_type: LogicalType, array: &ArrayImpl) -> Result<ArrayImpl> {
        self.evaluate(logical_type, |builder| {
            if logical_type == LogicalType::BigInt {
                distinct_into::<BigintSet>(logical_type, array, builder)
            } else {
                distinct_into::<DistinctSet>(logical_type, array, builder)
            }
        })
    }
}

/// `array_union(left, right)`
pub fn array_union(
    logical_type: LogicalType,
    left: &ArrayImpl,
    right: &ArrayImpl,
) -> Result<ArrayImpl> {
    ArraySetFunctions::default().union(logical_type, left, right)
}

/// `array_intersect(left, right)`
pub fn array_intersect(
    logical_type: LogicalType,
    left: &ArrayImpl,
    right: &ArrayImpl,
) -> Result<ArrayImpl> {
    ArraySetFunctions::default().intersect(logical_type, left, right)
}

/// `array_distinct(array)`
pub fn array_distinct(logical_type: LogicalType, array: &ArrayImpl) -> Result<ArrayImpl> {
    ArraySetFunctions::default().distinct(logical_type, array)
}
