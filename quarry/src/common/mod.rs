//! Common utils and types

pub mod config;
pub mod types;
