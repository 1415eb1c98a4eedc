//! Logical and physical types
//!
//! [`LogicalType`] is the SQL value domain, [`PhysicalType`] is the memory representation
//! of the values. Different logical types may have same [`PhysicalType`].

use std::fmt::Display;

use snafu::{Snafu, ensure};

pub use crate::array::primitive::PrimitiveType;
use crate::operator::{OperatorError, TypeOperators};

/// Max precision of the decimal that is stored as `i64`
pub const MAX_SHORT_DECIMAL_PRECISION: u8 = 18;
/// Max precision of the decimal
pub const MAX_DECIMAL_PRECISION: u8 = 38;
/// Max precision of the timestamp with time zone that is packed into an `i64`
pub const MAX_SHORT_TIMESTAMP_TZ_PRECISION: u8 = 3;
/// Max precision of the timestamp with time zone
pub const MAX_TIMESTAMP_TZ_PRECISION: u8 = 12;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum TypeError {
    #[snafu(display(
        "Invalid decimal({precision}, {scale}): precision should in [1, {MAX_DECIMAL_PRECISION}] and scale should not greater than precision"
    ))]
    InvalidDecimal { precision: u8, scale: u8 },
    #[snafu(display(
        "Invalid timestamp({precision}) with time zone: precision should not greater than {MAX_TIMESTAMP_TZ_PRECISION}"
    ))]
    InvalidTimestampPrecision { precision: u8 },
}

/// Physical type has a one-to-one mapping to each array, it determines the memory
/// representation of a value
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalType {
    /// Boolean, stored in one byte
    Boolean,
    /// Signed 8-bit integer
    Int8,
    /// Signed 16-bit integer
    Int16,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// Signed 128-bit integer
    Int128,
    /// 32-bit float number
    Float32,
    /// 64-bit float number
    Float64,
    /// 96 bits: a 64-bit packed epoch millis with zone key and a 32-bit picos of milli
    Int96,
    /// Variable length bytes
    Binary,
}

impl PhysicalType {
    /// Width of a single value in bytes, `None` for variable width
    #[inline]
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Boolean | Self::Int8 => Some(1),
            Self::Int16 => Some(2),
            Self::Int32 | Self::Float32 => Some(4),
            Self::Int64 | Self::Float64 => Some(8),
            Self::Int96 => Some(12),
            Self::Int128 => Some(16),
            Self::Binary => None,
        }
    }
}

impl Display for PhysicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PhysicalType::{:?}", self)
    }
}

/// All of the supported logical types
///
/// Two instances of the same logical type are value-equal and interchangeable. Operations
/// between arrays should have different behavior based on the associated [`LogicalType`]s,
/// see [`LogicalType::operators`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// Boolean value represent `true` or `false`
    Boolean,
    /// Signed 8-bit integer
    TinyInt,
    /// Signed 16-bit integer
    SmallInt,
    /// Signed 32-bit integer
    Integer,
    /// Signed 64-bit integer
    BigInt,
    /// 32-bit float number
    Real,
    /// 64-bit float number
    Double,
    /// Fixed-point numbers with precision and scale, stores the unscaled value.
    ///
    /// For example, the unscaled value of decimal 123.45 is 12345. `i64` is used up to
    /// 18 precision, the range is [-10<sup>18</sup> + 1, 10<sup>18</sup> -1]. `i128` is
    /// used up to 38 precision.
    ///
    /// Construct it with [`LogicalType::decimal`] to validate the precision
    Decimal {
        /// 1 <= precision <= 38
        precision: u8,
        /// 0 <= scale <= precision
        scale: u8,
    },
    /// Days since epoch, stored as `i32`
    Date,
    /// Microseconds since epoch without time zone, stored as `i64`
    Timestamp,
    /// Timestamp with time zone.
    ///
    /// Precision less than or equal to 3 packs the epoch millis and the zone key into a
    /// single `i64`: `millis << 12 | zone_key`. Higher precisions additionally carry the
    /// picoseconds of the milli in a separated `u32`, see
    /// [`LongTimestampTz`](crate::element::timestamp::LongTimestampTz)
    TimestampWithTimeZone {
        /// 0 <= precision <= 12
        precision: u8,
    },
    /// Variable length Utf-8 String
    VarChar,
    /// Variable length binary
    VarBinary,
}

impl LogicalType {
    /// Create a validated decimal type
    pub fn decimal(precision: u8, scale: u8) -> Result<Self, TypeError> {
        ensure!(
            (1..=MAX_DECIMAL_PRECISION).contains(&precision) && scale <= precision,
            InvalidDecimalSnafu { precision, scale }
        );
        Ok(Self::Decimal { precision, scale })
    }

    /// Create a validated timestamp with time zone type
    pub fn timestamp_with_time_zone(precision: u8) -> Result<Self, TypeError> {
        ensure!(
            precision <= MAX_TIMESTAMP_TZ_PRECISION,
            InvalidTimestampPrecisionSnafu { precision }
        );
        Ok(Self::TimestampWithTimeZone { precision })
    }

    /// Get the physical type of the logical type
    pub const fn physical_type(&self) -> PhysicalType {
        match self {
            Self::Boolean => PhysicalType::Boolean,
            Self::TinyInt => PhysicalType::Int8,
            Self::SmallInt => PhysicalType::Int16,
            Self::Integer | Self::Date => PhysicalType::Int32,
            Self::BigInt | Self::Timestamp => PhysicalType::Int64,
            Self::Real => PhysicalType::Float32,
            Self::Double => PhysicalType::Float64,
            Self::Decimal { precision, .. } => {
                if *precision <= MAX_SHORT_DECIMAL_PRECISION {
                    PhysicalType::Int64
                } else {
                    PhysicalType::Int128
                }
            }
            Self::TimestampWithTimeZone { precision } => {
                if *precision <= MAX_SHORT_TIMESTAMP_TZ_PRECISION {
                    PhysicalType::Int64
                } else {
                    PhysicalType::Int96
                }
            }
            Self::VarChar | Self::VarBinary => PhysicalType::Binary,
        }
    }

    /// Width of a single value in bytes, `None` for variable width types
    #[inline]
    pub const fn fixed_size(&self) -> Option<usize> {
        self.physical_type().fixed_size()
    }

    /// Inclusive range of the integers that can be written into an array of this type.
    /// `None` means the type is not range bounded
    pub fn range(&self) -> Option<(i128, i128)> {
        match self {
            Self::TinyInt => Some((i8::MIN as i128, i8::MAX as i128)),
            Self::SmallInt => Some((i16::MIN as i128, i16::MAX as i128)),
            Self::Integer | Self::Date => Some((i32::MIN as i128, i32::MAX as i128)),
            Self::BigInt | Self::Timestamp => Some((i64::MIN as i128, i64::MAX as i128)),
            Self::Decimal { precision, .. } => {
                let max = 10_i128.pow(*precision as u32) - 1;
                Some((-max, max))
            }
            Self::Boolean
            | Self::Real
            | Self::Double
            | Self::TimestampWithTimeZone { .. }
            | Self::VarChar
            | Self::VarBinary => None,
        }
    }

    /// Inclusive range of the epoch millis a timestamp with time zone can hold, the
    /// millis share an `i64` with the zone key in both forms. `None` for other types
    pub fn millis_range(&self) -> Option<(i64, i64)> {
        match self {
            Self::TimestampWithTimeZone { .. } => Some((
                crate::element::timestamp::MIN_PACKED_MILLIS,
                crate::element::timestamp::MAX_PACKED_MILLIS,
            )),
            _ => None,
        }
    }

    /// Returns true if the timestamp with time zone is packed into a single `i64`
    #[inline]
    pub fn is_short_timestamp_tz(&self) -> bool {
        matches!(self, Self::TimestampWithTimeZone { precision } if *precision <= MAX_SHORT_TIMESTAMP_TZ_PRECISION)
    }

    /// Returns true if the values of this type can be tested for equality
    pub fn is_comparable(&self) -> bool {
        match self {
            Self::Boolean
            | Self::TinyInt
            | Self::SmallInt
            | Self::Integer
            | Self::BigInt
            | Self::Real
            | Self::Double
            | Self::Decimal { .. }
            | Self::Date
            | Self::Timestamp
            | Self::TimestampWithTimeZone { .. }
            | Self::VarChar
            | Self::VarBinary => true,
        }
    }

    /// Returns true if the values of this type have a total order
    pub fn is_orderable(&self) -> bool {
        match self {
            Self::Boolean
            | Self::TinyInt
            | Self::SmallInt
            | Self::Integer
            | Self::BigInt
            | Self::Real
            | Self::Double
            | Self::Decimal { .. }
            | Self::Date
            | Self::Timestamp
            | Self::TimestampWithTimeZone { .. }
            | Self::VarChar
            | Self::VarBinary => true,
        }
    }

    /// Get the operator bundle of the type
    #[inline]
    pub fn operators(&self) -> &'static dyn TypeOperators {
        crate::operator::type_operators(self)
    }

    /// Get the operator bundle of the type, fails if the type does not have a total order
    #[inline]
    pub fn ordering_operators(&self) -> Result<&'static dyn TypeOperators, OperatorError> {
        crate::operator::ordering_operators(self)
    }
}

impl Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::TinyInt => write!(f, "tinyint"),
            Self::SmallInt => write!(f, "smallint"),
            Self::Integer => write!(f, "integer"),
            Self::BigInt => write!(f, "bigint"),
            Self::Real => write!(f, "real"),
            Self::Double => write!(f, "double"),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            Self::Date => write!(f, "date"),
            Self::Timestamp => write!(f, "timestamp(6)"),
            Self::TimestampWithTimeZone { precision } => {
                write!(f, "timestamp({precision}) with time zone")
            }
            Self::VarChar => write!(f, "varchar"),
            Self::VarBinary => write!(f, "varbinary"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_type_of_parametric_types() {
        assert_eq!(
            LogicalType::decimal(18, 2).unwrap().physical_type(),
            PhysicalType::Int64
        );
        assert_eq!(
            LogicalType::decimal(19, 2).unwrap().physical_type(),
            PhysicalType::Int128
        );
        assert_eq!(
            LogicalType::timestamp_with_time_zone(3)
                .unwrap()
                .physical_type(),
            PhysicalType::Int64
        );
        assert_eq!(
            LogicalType::timestamp_with_time_zone(9)
                .unwrap()
                .fixed_size(),
            Some(12)
        );
        assert_eq!(LogicalType::VarChar.fixed_size(), None);
    }

    #[test]
    fn test_invalid_parametric_types() {
        assert!(LogicalType::decimal(0, 0).is_err());
        assert!(LogicalType::decimal(39, 0).is_err());
        assert!(LogicalType::decimal(10, 11).is_err());
        assert!(LogicalType::timestamp_with_time_zone(13).is_err());
    }

    #[test]
    fn test_range() {
        assert_eq!(LogicalType::TinyInt.range(), Some((-128, 127)));
        assert_eq!(
            LogicalType::decimal(3, 1).unwrap().range(),
            Some((-999, 999))
        );
        assert_eq!(LogicalType::Double.range(), None);
    }

    #[test]
    fn test_display_logical_type() {
        let types = [
            LogicalType::decimal(10, 2).unwrap(),
            LogicalType::timestamp_with_time_zone(6).unwrap(),
            LogicalType::VarChar,
        ];
        let expect = expect_test::expect![[r#"
            [
                "decimal(10,2)",
                "timestamp(6) with time zone",
                "varchar",
            ]
        "#]];
        expect.assert_debug_eq(&types.iter().map(|t| t.to_string()).collect::<Vec<_>>());
    }
}
