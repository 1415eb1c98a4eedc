//! Common type alias

/// Identifier of an aggregation group. Group ids are dense, allocated by the caller and
/// never reused within a query
pub type GroupId = u64;

/// Result type of the hash function
pub type HashValue = u64;
