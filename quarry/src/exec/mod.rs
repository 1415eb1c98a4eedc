//! Execution components

pub mod aggregate;
pub mod function;
pub mod set;
