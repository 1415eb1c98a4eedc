//! States of the grouped aggregations.
//!
//! The aggregation operator assigns a dense [`GroupId`] to each group, sets it as the
//! current group of the state and then feeds the rows of the group. States never raise
//! resource exhaustion themselves, the memory governor polls
//! [`GroupedAccumulatorState::estimated_size`] after each mutation

mod histogram;
mod spill;

pub use histogram::{GroupedHistogramState, HistogramIter, HistogramView};
pub use spill::HistogramSpiller;

use quarry_block::array::ArrayError;
use quarry_block::block::DataBlockError;
use quarry_block::operator::OperatorError;
use quarry_block::types::LogicalType;
use snafu::Snafu;

use crate::common::types::GroupId;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AggregationError {
    #[snafu(display("State of `{state}` can not accept the array of `{actual}`"))]
    TypeMismatch {
        state: LogicalType,
        actual: LogicalType,
    },
    #[snafu(display(
        "Group {group_id} is out of the capacity {capacity}, `ensure_capacity` is not called"
    ))]
    GroupOutOfCapacity { group_id: GroupId, capacity: usize },
    #[snafu(display("Position {position} is out of the bounds of the array with length {len}"))]
    PositionOutOfBounds { position: usize, len: usize },
    #[snafu(display("State can not hold more than {max} entries"))]
    TooManyEntries { max: usize },
    #[snafu(display("Count of `{key}` overflows, {count} can not be added to {current}"))]
    CountOverflow {
        key: String,
        current: i64,
        count: i64,
    },
    #[snafu(display("Invalid serialized state: {reason}"))]
    InvalidSerializedState { reason: String },
    #[snafu(display("Failed to compare the keys of the state"))]
    Operator { source: OperatorError },
    #[snafu(display("Failed to write the keys of the state"))]
    Array { source: ArrayError },
    #[snafu(display("Failed to serialize the state into data block"))]
    Block { source: DataBlockError },
}

type Result<T> = std::result::Result<T, AggregationError>;

/// State of an accumulator that holds a value per group
pub trait GroupedAccumulatorState {
    /// Set the group the following mutations apply to
    fn set_group_id(&mut self, group_id: GroupId);

    /// Current group
    fn group_id(&self) -> GroupId;

    /// Make sure the groups in `[0, size)` can be accessed
    fn ensure_capacity(&mut self, size: usize);

    /// Estimated memory retained by the state in bytes
    fn estimated_size(&self) -> usize;
}
