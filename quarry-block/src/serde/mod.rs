//! Wire format of the [`DataBlock`]s exchanged between execution stages.
//!
//! A [`DataBlock`] is serialized into the body of exactly one [`SerializedPage`]. The
//! body never embeds the logical types, the producer and the consumer agree on the
//! types of the columns. Body layout, little endian:
//!
//! ```text
//! u32 column_count
//! per column:
//!   u8  encoding tag (1 fixed width, 2 variable width, 3 dictionary, 4 run length,
//!                     5 all null)
//!   u32 position_count
//!   fixed width:    u8 has_nulls [validity] u8 width values
//!   variable width: u8 has_nulls [validity] u32 offsets(position_count + 1) bytes
//!   dictionary:     nested dictionary column, u32 ids
//!   run length:     nested single position column
//! ```
//!
//! Data block without rows is serialized into an empty body. The envelope of the page
//! is described in [`SerializedPage::write_to`]

mod encoding;
pub mod page;

use bytes::{BufMut, Bytes, BytesMut};
use snafu::{ResultExt, Snafu, ensure};

pub use self::page::{PageReader, PageWriter, SerializedPage};
use self::encoding::{read_array, read_u32, write_array};
use crate::array::ArrayError;
use crate::block::{DataBlock, DataBlockError};
use crate::types::LogicalType;

/// Compressed body is used only if its size is below this ratio of the raw size
pub const MINIMUM_COMPRESSION_RATIO: f64 = 0.8;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SerdeError {
    #[snafu(display("Page is truncated, needs {needed} bytes but {remaining} bytes remain"))]
    Truncated { needed: usize, remaining: usize },
    #[snafu(display("Unknown column encoding {tag}"))]
    UnknownEncoding { tag: u8 },
    #[snafu(display("Column encoding {tag} can not be nested"))]
    NestedEncoding { tag: u8 },
    #[snafu(display("Nested column has {positions} positions, at most {limit} are allowed"))]
    NestedTooLarge { positions: usize, limit: usize },
    #[snafu(display(
        "Page declares {uncompressed_size} bytes body, {compressed_size} compressed bytes can not expand to it"
    ))]
    ImplausibleSize {
        uncompressed_size: usize,
        compressed_size: usize,
    },
    #[snafu(display("Unknown page markers {markers:#010b}"))]
    UnknownMarkers { markers: u8 },
    #[snafu(display("Checksum mismatch, expected {expected:#010x}, computed {actual:#010x}"))]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[snafu(display("Page body has {actual} bytes, the header declares {expected} bytes"))]
    SizeMismatch { expected: usize, actual: usize },
    #[snafu(display("Page has {actual} columns, {expected} logical types are agreed"))]
    ColumnCountMismatch { expected: usize, actual: usize },
    #[snafu(display("Encoding `{encoding}` is incompatible with the type `{logical_type}`"))]
    EncodingTypeMismatch {
        encoding: &'static str,
        logical_type: LogicalType,
    },
    #[snafu(display("Values of `{logical_type}` can not have width {width}"))]
    WidthMismatch {
        width: u8,
        logical_type: LogicalType,
    },
    #[snafu(display("Invalid array in the page"))]
    InvalidArray { source: ArrayError },
    #[snafu(display("Invalid data block in the page"))]
    InvalidBlock { source: DataBlockError },
    #[snafu(display("Column has {actual} positions, the page declares {expected} positions"))]
    PositionCountMismatch { expected: usize, actual: usize },
    #[snafu(display("{remaining} bytes remain after the last column"))]
    TrailingBytes { remaining: usize },
    #[snafu(display("Invalid flag {flag}, expect 0 or 1"))]
    InvalidFlag { flag: u8 },
    #[snafu(display("Failed to decompress the page"))]
    Decompress {
        source: lz4_flex::block::DecompressError,
    },
    #[snafu(display("Page with {size} bytes can not be framed, the limit is {}", u32::MAX))]
    PageTooLarge { size: usize },
}

type Result<T> = std::result::Result<T, SerdeError>;

/// Configuration of the [`PagesSerde`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerdeConfig {
    /// Compress the body with lz4
    pub compression: bool,
    /// Attach crc32 of the stored bytes
    pub checksum: bool,
    /// Body smaller than it is never compressed
    pub min_compression_size: usize,
}

impl Default for SerdeConfig {
    fn default() -> Self {
        Self {
            compression: false,
            checksum: true,
            min_compression_size: 1024,
        }
    }
}

impl SerdeConfig {
    /// Enable or disable the compression
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Enable or disable the checksum
    pub fn with_checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }

    /// Set the minimal body size to try the compression
    pub fn with_min_compression_size(mut self, min_compression_size: usize) -> Self {
        self.min_compression_size = min_compression_size;
        self
    }
}

/// Serializer and deserializer of the [`DataBlock`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct PagesSerde {
    config: SerdeConfig,
}

impl PagesSerde {
    /// Create a new [`PagesSerde`]
    pub fn new(config: SerdeConfig) -> Self {
        Self { config }
    }

    /// Get the config
    #[inline]
    pub fn config(&self) -> &SerdeConfig {
        &self.config
    }

    /// Serialize the data block into a page
    pub fn serialize(&self, block: &DataBlock) -> Result<SerializedPage> {
        let body = encode_body(block);
        SerializedPage::try_from_body(body, block.len(), &self.config)
    }

    /// Deserialize the page into a data block with the agreed logical types. Arrays of
    /// the returned data block share the bytes of the page if it is not compressed
    pub fn deserialize(
        &self,
        page: &SerializedPage,
        logical_types: &[LogicalType],
    ) -> Result<DataBlock> {
        let body = page.body()?;
        decode_body(body, page.position_count(), logical_types)
    }
}

fn encode_body(block: &DataBlock) -> Bytes {
    if block.is_empty() {
        return Bytes::new();
    }
    let mut out = BytesMut::with_capacity(4 + block.size_in_bytes() + block.num_arrays() * 16);
    out.put_u32_le(block.num_arrays() as u32);
    block
        .arrays()
        .iter()
        .for_each(|array| write_array(array, &mut out));
    out.freeze()
}

fn decode_body(
    mut body: Bytes,
    position_count: usize,
    logical_types: &[LogicalType],
) -> Result<DataBlock> {
    if body.is_empty() {
        ensure!(
            position_count == 0,
            PositionCountMismatchSnafu {
                expected: position_count,
                actual: 0_usize
            }
        );
        return Ok(DataBlock::with_logical_types(logical_types));
    }

    let column_count = read_u32(&mut body)? as usize;
    ensure!(
        column_count == logical_types.len(),
        ColumnCountMismatchSnafu {
            expected: logical_types.len(),
            actual: column_count
        }
    );
    let arrays = logical_types
        .iter()
        .map(|&logical_type| {
            let array = read_array(&mut body, logical_type)?;
            ensure!(
                array.len() == position_count,
                PositionCountMismatchSnafu {
                    expected: position_count,
                    actual: array.len()
                }
            );
            Ok(array)
        })
        .collect::<Result<Vec<_>>>()?;
    ensure!(
        body.is_empty(),
        TrailingBytesSnafu {
            remaining: body.len()
        }
    );
    DataBlock::try_new(arrays).context(InvalidBlockSnafu)
}
