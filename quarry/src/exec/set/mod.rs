//! Hash sets over the positions of arrays

mod bigint_set;
mod distinct_set;

pub use bigint_set::BigintSet;
pub use distinct_set::DistinctSet;

use quarry_block::array::ArrayError;
use quarry_block::operator::OperatorError;
use quarry_block::types::LogicalType;
use snafu::Snafu;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SetError {
    #[snafu(display("Set of `{set}` can not accept the array of `{actual}`"))]
    TypeMismatch {
        set: LogicalType,
        actual: LogicalType,
    },
    #[snafu(display("Position {position} is out of the bounds of the array with length {len}"))]
    PositionOutOfBounds { position: usize, len: usize },
    #[snafu(display("Set can not hold more than {max} entries"))]
    TooManyEntries { max: usize },
    #[snafu(display("Failed to compare the elements in the set"))]
    Operator { source: OperatorError },
    #[snafu(display("Failed to build the elements of the set"))]
    Build { source: ArrayError },
}

type Result<T> = std::result::Result<T, SetError>;

/// How the set decides that two positions hold the same element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetEquality {
    /// `IS NOT DISTINCT FROM`: null equals null and `NaN` equals `NaN`
    NotDistinct,
    /// SQL `=`: null equals nothing and `NaN` equals nothing
    Equal,
}
