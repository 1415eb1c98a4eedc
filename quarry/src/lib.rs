//! # Quarry
//!
//! Execution core of `quarry`, built on the columnar format of [`quarry_block`]:
//!
//! - [`exec::set`]: hash sets over the positions of arrays
//!
//! - [`exec::function`]: array functions producing sets, such as `array_union`
//!
//! - [`exec::aggregate`]: per-group states of the grouped aggregations

pub mod common;
pub mod error;
pub mod exec;
