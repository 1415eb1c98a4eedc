//! # quarry-block
//!
//! The in-memory columnar format of `quarry`. A [`DataBlock`] is a batch of rows stored
//! as same length [`ArrayImpl`]s, each array is a column of one [`LogicalType`]. This
//! crate also provides:
//!
//! - builders that append values into reference counted buffers, slices of the built
//!   arrays never copy
//!
//! - the type operator registry: equality, hashing and ordering per [`LogicalType`],
//!   callable on boxed elements or on positions inside arrays
//!
//! - the wire format used to exchange [`DataBlock`]s between execution stages
//!
//! - text codecs that parse a single textual value into a builder
//!
//! [`DataBlock`]: crate::block::DataBlock
//! [`ArrayImpl`]: crate::array::ArrayImpl
//! [`LogicalType`]: crate::types::LogicalType

pub mod array;
pub mod bitmap;
pub mod block;
pub mod element;
mod macros;
pub mod operator;
pub mod serde;
pub mod text;
pub mod types;
pub mod utils;

mod private {
    /// Sealed trait protect against downstream implementations
    pub trait Sealed {}
}
