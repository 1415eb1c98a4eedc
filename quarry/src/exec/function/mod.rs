//! Functions evaluated over whole arrays

pub mod array_set;
