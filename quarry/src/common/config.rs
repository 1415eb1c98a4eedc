//! [`ExecArgs`] holds the arguments of an operator instance

use quarry_block::block::DataBlockBuilderConfig;
use quarry_block::serde::SerdeConfig;

/// Default number of entries the histogram states preallocate
pub const DEFAULT_HISTOGRAM_EXPECTED_ENTRIES: usize = 64;

/// Arguments for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecArgs {
    /// Limits of the produced data blocks
    pub block_builder: DataBlockBuilderConfig,
    /// Wire format of the exchanged data blocks
    pub serde: SerdeConfig,
    /// Number of entries the histogram states preallocate
    pub histogram_expected_entries: usize,
}

impl Default for ExecArgs {
    fn default() -> Self {
        Self {
            block_builder: DataBlockBuilderConfig::default(),
            serde: SerdeConfig::default(),
            histogram_expected_entries: DEFAULT_HISTOGRAM_EXPECTED_ENTRIES,
        }
    }
}

impl ExecArgs {
    /// Set the config of the block builders
    pub fn with_block_builder(mut self, block_builder: DataBlockBuilderConfig) -> Self {
        self.block_builder = block_builder;
        self
    }

    /// Set the config of the serde
    pub fn with_serde(mut self, serde: SerdeConfig) -> Self {
        self.serde = serde;
        self
    }

    /// Set the number of entries the histogram states preallocate
    pub fn with_histogram_expected_entries(mut self, histogram_expected_entries: usize) -> Self {
        self.histogram_expected_entries = histogram_expected_entries;
        self
    }
}
