//! Envelope of the serialized pages

use std::iter::FusedIterator;

use bytes::{BufMut, Bytes, BytesMut};
use snafu::{ResultExt, ensure};

use super::encoding::{read_u8, read_u32, take};
use super::{
    ChecksumMismatchSnafu, DecompressSnafu, ImplausibleSizeSnafu, MINIMUM_COMPRESSION_RATIO,
    PageTooLargeSnafu, PagesSerde, Result, SerdeConfig, SizeMismatchSnafu, UnknownMarkersSnafu,
};
use crate::block::DataBlock;

/// The stored bytes are lz4 compressed
pub const COMPRESSED: u8 = 0b01;
/// The header carries the crc32 of the stored bytes
pub const CHECKSUMMED: u8 = 0b10;

const KNOWN_MARKERS: u8 = COMPRESSED | CHECKSUMMED;

/// Upper bound of the bytes a single lz4 block byte expands to
const MAX_LZ4_EXPANSION: usize = 255;

/// Wire bytes of exactly one [`DataBlock`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedPage {
    position_count: usize,
    markers: u8,
    uncompressed_size: usize,
    checksum: Option<u32>,
    /// Stored bytes, compressed if [`COMPRESSED`] is marked
    data: Bytes,
}

impl SerializedPage {
    /// Build the page from the raw body, compress it if it is worth
    pub(crate) fn try_from_body(
        body: Bytes,
        position_count: usize,
        config: &SerdeConfig,
    ) -> Result<Self> {
        ensure!(
            body.len() <= u32::MAX as usize,
            PageTooLargeSnafu { size: body.len() }
        );
        let uncompressed_size = body.len();
        let mut markers = 0;
        let mut data = body;
        if config.compression && uncompressed_size >= config.min_compression_size {
            let compressed = lz4_flex::block::compress(&data);
            if (compressed.len() as f64) < uncompressed_size as f64 * MINIMUM_COMPRESSION_RATIO
            {
                markers |= COMPRESSED;
                data = Bytes::from(compressed);
            }
        }
        let checksum = config.checksum.then(|| crc32fast::hash(&data));
        if checksum.is_some() {
            markers |= CHECKSUMMED;
        }

        tracing::trace!(
            "Serialized page with {} positions: {} bytes body, {} bytes stored, compressed: {}",
            position_count,
            uncompressed_size,
            data.len(),
            markers & COMPRESSED != 0
        );

        Ok(Self {
            position_count,
            markers,
            uncompressed_size,
            checksum,
            data,
        })
    }

    /// Number of rows in the page
    #[inline]
    pub fn position_count(&self) -> usize {
        self.position_count
    }

    /// Returns true if the stored bytes are compressed
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.markers & COMPRESSED != 0
    }

    /// Returns true if the page carries a checksum
    #[inline]
    pub fn is_checksummed(&self) -> bool {
        self.markers & CHECKSUMMED != 0
    }

    /// Size of the body before compression
    #[inline]
    pub fn uncompressed_size(&self) -> usize {
        self.uncompressed_size
    }

    /// Size of the stored bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.data.len()
    }

    /// Stored bytes
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Verify the checksum and decompress the stored bytes
    pub(crate) fn body(&self) -> Result<Bytes> {
        if let Some(expected) = self.checksum {
            let actual = crc32fast::hash(&self.data);
            ensure!(
                actual == expected,
                ChecksumMismatchSnafu { expected, actual }
            );
        }
        let body = if self.is_compressed() {
            ensure!(
                self.uncompressed_size <= self.data.len().saturating_mul(MAX_LZ4_EXPANSION),
                ImplausibleSizeSnafu {
                    uncompressed_size: self.uncompressed_size,
                    compressed_size: self.data.len(),
                }
            );
            Bytes::from(
                lz4_flex::block::decompress(&self.data, self.uncompressed_size)
                    .context(DecompressSnafu)?,
            )
        } else {
            self.data.clone()
        };
        ensure!(
            body.len() == self.uncompressed_size,
            SizeMismatchSnafu {
                expected: self.uncompressed_size,
                actual: body.len()
            }
        );
        Ok(body)
    }

    /// Frame the page into `out`:
    ///
    /// ```text
    /// u32 position_count
    /// u8  markers           (bit 0 compressed, bit 1 checksummed)
    /// u32 uncompressed_size
    /// u32 size              (stored bytes)
    /// u32 crc32             (only when checksummed)
    /// [size] stored bytes
    /// ```
    pub fn write_to(&self, out: &mut BytesMut) {
        out.reserve(17 + self.data.len());
        out.put_u32_le(self.position_count as u32);
        out.put_u8(self.markers);
        out.put_u32_le(self.uncompressed_size as u32);
        out.put_u32_le(self.data.len() as u32);
        if let Some(checksum) = self.checksum {
            out.put_u32_le(checksum);
        }
        out.put_slice(&self.data);
    }

    /// Read a framed page from the front of the buffer. The stored bytes share the
    /// buffer
    pub fn read_from(buf: &mut Bytes) -> Result<Self> {
        let position_count = read_u32(buf)? as usize;
        let markers = read_u8(buf)?;
        ensure!(markers & !KNOWN_MARKERS == 0, UnknownMarkersSnafu { markers });
        let uncompressed_size = read_u32(buf)? as usize;
        let size = read_u32(buf)? as usize;
        let checksum = if markers & CHECKSUMMED != 0 {
            Some(read_u32(buf)?)
        } else {
            None
        };
        let data = take(buf, size)?;
        Ok(Self {
            position_count,
            markers,
            uncompressed_size,
            checksum,
            data,
        })
    }
}

/// Iterator of the framed pages in a buffer. It stops after the first error
#[derive(Debug)]
pub struct PageReader {
    buf: Bytes,
    failed: bool,
}

impl PageReader {
    /// Create a reader of the buffer
    pub fn new(buf: Bytes) -> Self {
        Self { buf, failed: false }
    }
}

impl Iterator for PageReader {
    type Item = Result<SerializedPage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.buf.is_empty() {
            return None;
        }
        let page = SerializedPage::read_from(&mut self.buf);
        self.failed = page.is_err();
        Some(page)
    }
}

impl FusedIterator for PageReader {}

/// Serialize data blocks and frame them into a single buffer
#[derive(Debug)]
pub struct PageWriter {
    serde: PagesSerde,
    out: BytesMut,
    pages: usize,
}

impl PageWriter {
    /// Create a writer that serializes with the serde
    pub fn new(serde: PagesSerde) -> Self {
        Self {
            serde,
            out: BytesMut::new(),
            pages: 0,
        }
    }

    /// Serialize and frame the data block
    pub fn write_block(&mut self, block: &DataBlock) -> Result<()> {
        let page = self.serde.serialize(block)?;
        self.write_page(&page);
        Ok(())
    }

    /// Frame the serialized page
    pub fn write_page(&mut self, page: &SerializedPage) {
        page.write_to(&mut self.out);
        self.pages += 1;
    }

    /// Number of pages written
    #[inline]
    pub fn pages_written(&self) -> usize {
        self.pages
    }

    /// Number of bytes written
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.out.len()
    }

    /// Take the framed pages, the writer can be reused
    pub fn flush(&mut self) -> Bytes {
        self.pages = 0;
        self.out.split().freeze()
    }
}
