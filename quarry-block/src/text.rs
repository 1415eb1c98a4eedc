//! Codec between the arrays and the delimited text formats, one value per field.
//!
//! Fields are addressed by `(offset, length)` spans into a shared buffer. A field equal
//! to the null sequence is null, an empty field is null too unless the type is variable
//! width

use snafu::{OptionExt, Snafu, ensure};

use crate::array::{ArrayBuilderImpl, ArrayImpl};
use crate::element::ElementImplRef;
use crate::types::LogicalType;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TextDecodeError {
    #[snafu(display(
        "Invalid `{logical_type}` value at [{offset}, {offset} + {length}) of the text"
    ))]
    InvalidValue {
        logical_type: LogicalType,
        offset: usize,
        length: usize,
    },
    #[snafu(display("Text encoding of `{logical_type}` is not supported"))]
    UnsupportedType { logical_type: LogicalType },
    #[snafu(display(
        "Span [{offset}, {offset} + {length}) is out of the text with {len} bytes"
    ))]
    SpanOutOfBounds {
        offset: usize,
        length: usize,
        len: usize,
    },
}

type Result<T> = std::result::Result<T, TextDecodeError>;

/// Default null sequence of the text formats
pub const DEFAULT_NULL_SEQUENCE: &[u8] = b"\\N";

/// Text codec of a single logical type
#[derive(Debug, Clone)]
pub struct TextEncoding {
    logical_type: LogicalType,
    null_sequence: Vec<u8>,
}

impl TextEncoding {
    /// Create a codec, fails if the logical type has no text form
    pub fn new(logical_type: LogicalType, null_sequence: impl Into<Vec<u8>>) -> Result<Self> {
        ensure!(
            matches!(
                logical_type,
                LogicalType::Boolean
                    | LogicalType::TinyInt
                    | LogicalType::SmallInt
                    | LogicalType::Integer
                    | LogicalType::BigInt
                    | LogicalType::Real
                    | LogicalType::Double
                    | LogicalType::VarChar
                    | LogicalType::VarBinary
            ),
            UnsupportedTypeSnafu { logical_type }
        );
        Ok(Self {
            logical_type,
            null_sequence: null_sequence.into(),
        })
    }

    /// Logical type of the codec
    #[inline]
    pub fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    fn is_variable_width(&self) -> bool {
        matches!(
            self.logical_type,
            LogicalType::VarChar | LogicalType::VarBinary
        )
    }

    /// Returns true if the field represents null
    pub fn is_null(&self, field: &[u8]) -> bool {
        field == self.null_sequence.as_slice() || (field.is_empty() && !self.is_variable_width())
    }

    fn field(bytes: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
        offset
            .checked_add(length)
            .and_then(|end| bytes.get(offset..end))
            .context(SpanOutOfBoundsSnafu {
                offset,
                length,
                len: bytes.len(),
            })
    }

    /// Parse the field `bytes[offset..offset + length]` and append it into the builder.
    /// The builder is unchanged if the field is invalid
    pub fn decode_value_into(
        &self,
        builder: &mut ArrayBuilderImpl,
        bytes: &[u8],
        offset: usize,
        length: usize,
    ) -> Result<()> {
        let field = Self::field(bytes, offset, length)?;
        let invalid = || TextDecodeError::InvalidValue {
            logical_type: self.logical_type,
            offset,
            length,
        };
        let text = || std::str::from_utf8(field).map_err(|_| invalid());
        let written = match self.logical_type {
            LogicalType::Boolean => {
                let text = text()?;
                if text.eq_ignore_ascii_case("true") {
                    builder.write_bool(true)
                } else if text.eq_ignore_ascii_case("false") {
                    builder.write_bool(false)
                } else {
                    return Err(invalid());
                }
            }
            LogicalType::TinyInt
            | LogicalType::SmallInt
            | LogicalType::Integer
            | LogicalType::BigInt => {
                let value = text()?.parse::<i64>().map_err(|_| invalid())?;
                builder.write_long(value)
            }
            LogicalType::Real | LogicalType::Double => {
                let value = text()?.parse::<f64>().map_err(|_| invalid())?;
                builder.write_double(value)
            }
            LogicalType::VarChar | LogicalType::VarBinary => builder.write_bytes(field),
            logical_type => return UnsupportedTypeSnafu { logical_type }.fail(),
        };
        // Out of range or the builder has another type
        written.map_err(|_| invalid())
    }

    /// Decode the fields into an array, the first invalid field fails the whole column
    pub fn decode_column(&self, bytes: &[u8], spans: &[(usize, usize)]) -> Result<ArrayImpl> {
        let mut builder = ArrayBuilderImpl::with_capacity(self.logical_type, spans.len());
        for &(offset, length) in spans {
            if self.is_null(Self::field(bytes, offset, length)?) {
                builder.append_null();
            } else {
                self.decode_value_into(&mut builder, bytes, offset, length)?;
            }
        }
        Ok(builder.build())
    }

    /// Append the text of the element into `out`, null is written as the null sequence
    pub fn encode_value(&self, element: Option<ElementImplRef<'_>>, out: &mut Vec<u8>) {
        match element {
            None => out.extend_from_slice(&self.null_sequence),
            Some(ElementImplRef::Binary(v)) => out.extend_from_slice(v),
            Some(element) => out.extend_from_slice(element.to_string().as_bytes()),
        }
    }

    /// Append the texts of the array into `out` without separators, returns the span of
    /// each position
    pub fn encode_column(&self, array: &ArrayImpl, out: &mut Vec<u8>) -> Vec<(usize, usize)> {
        array
            .iter()
            .map(|element| {
                let offset = out.len();
                self.encode_value(element, out);
                (offset, out.len() - offset)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{BinaryArray, Float64Array, Int16Array};

    fn spans(text: &str, delimiter: char) -> Vec<(usize, usize)> {
        let mut offset = 0;
        text.split(delimiter)
            .map(|field| {
                let span = (offset, field.len());
                offset += field.len() + 1;
                span
            })
            .collect()
    }

    #[test]
    fn test_decode_column() {
        let text = "1|\\N||-32768|+7";
        let encoding = TextEncoding::new(LogicalType::SmallInt, DEFAULT_NULL_SEQUENCE).unwrap();
        let array = encoding
            .decode_column(text.as_bytes(), &spans(text, '|'))
            .unwrap();
        let expected: Int16Array = [Some(1), None, None, Some(-32768), Some(7)]
            .into_iter()
            .collect();
        assert_eq!(array, ArrayImpl::Int16(expected));
    }

    #[test]
    fn test_invalid_value_is_attributable() {
        let text = "1|40000|x";
        let encoding = TextEncoding::new(LogicalType::SmallInt, DEFAULT_NULL_SEQUENCE).unwrap();
        let err = encoding
            .decode_column(text.as_bytes(), &spans(text, '|'))
            .unwrap_err();
        let expect =
            expect_test::expect!["Invalid `smallint` value at [2, 2 + 5) of the text"];
        expect.assert_eq(&err.to_string());

        let mut builder = ArrayBuilderImpl::with_capacity(LogicalType::Boolean, 2);
        let encoding = TextEncoding::new(LogicalType::Boolean, "").unwrap();
        encoding
            .decode_value_into(&mut builder, b"TRUE", 0, 4)
            .unwrap();
        assert!(encoding
            .decode_value_into(&mut builder, b"yes", 0, 3)
            .is_err());
        assert_eq!(builder.len(), 1);
        assert!(matches!(
            encoding.decode_value_into(&mut builder, b"TRUE", 2, 4),
            Err(TextDecodeError::SpanOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_encode_then_decode() {
        let doubles = ArrayImpl::Float64(
            [Some(1.5), None, Some(f64::INFINITY), Some(-0.25)]
                .into_iter()
                .collect::<Float64Array>(),
        );
        let strings = ArrayImpl::Binary(BinaryArray::from_str_iter([Some(""), None, Some("a|b")]));
        for (logical_type, array) in [
            (LogicalType::Double, doubles),
            (LogicalType::VarChar, strings),
        ] {
            let encoding = TextEncoding::new(logical_type, DEFAULT_NULL_SEQUENCE).unwrap();
            let mut out = Vec::new();
            let spans = encoding.encode_column(&array, &mut out);
            assert_eq!(spans.len(), array.len());
            assert_eq!(encoding.decode_column(&out, &spans).unwrap(), array);
        }
    }

    #[test]
    fn test_unsupported_type() {
        let err = TextEncoding::new(LogicalType::Date, DEFAULT_NULL_SEQUENCE).unwrap_err();
        expect_test::expect!["Text encoding of `date` is not supported"]
            .assert_eq(&err.to_string());
    }
}
