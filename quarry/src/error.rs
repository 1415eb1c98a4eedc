//! Error in quarry

use quarry_block::array::ArrayError;
use quarry_block::block::DataBlockError;
use quarry_block::serde::SerdeError;
use snafu::Snafu;

use crate::exec::aggregate::AggregationError;
use crate::exec::set::SetError;

/// Error of the components in quarry, the source tells which one failed
#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum QuarryError {
    #[snafu(display("Set failed"), context(false))]
    Set { source: SetError },
    #[snafu(display("Aggregation failed"), context(false))]
    Aggregation { source: AggregationError },
    #[snafu(display("Serde failed"), context(false))]
    Serde { source: SerdeError },
    #[snafu(display("Invalid array"), context(false))]
    Array { source: ArrayError },
    #[snafu(display("Invalid data block"), context(false))]
    DataBlock { source: DataBlockError },
}

/// Result type of quarry
pub type Result<T> = std::result::Result<T, QuarryError>;
