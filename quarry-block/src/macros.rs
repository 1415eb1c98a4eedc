//! Macros used in the quarry-block

/// Call macro for all fixed width types.
///
/// Tuple: {enum variant name, element type, array type, builder type}
macro_rules! for_all_primitive_types {
    ($macro:ident) => {
        $macro! {
            {Boolean, bool, BooleanArray, BooleanArrayBuilder},
            {Int8, i8, Int8Array, Int8ArrayBuilder},
            {Int16, i16, Int16Array, Int16ArrayBuilder},
            {Int32, i32, Int32Array, Int32ArrayBuilder},
            {Int64, i64, Int64Array, Int64ArrayBuilder},
            {Int128, i128, Int128Array, Int128ArrayBuilder},
            {Float32, f32, Float32Array, Float32ArrayBuilder},
            {Float64, f64, Float64Array, Float64ArrayBuilder},
            {Int96, LongTimestampTz, Int96Array, Int96ArrayBuilder}
        }
    };
}

pub(crate) use for_all_primitive_types;

/// Call macro for the native number types, the ones that have `from_le_bytes`
///
/// Tuple: {enum variant name, element type, default logical type, is integer}. The caller should
/// have `LogicalType` in scope
macro_rules! for_all_native_numbers {
    ($macro:ident) => {
        $macro! {
            {Int8, i8, LogicalType::TinyInt, true},
            {Int16, i16, LogicalType::SmallInt, true},
            {Int32, i32, LogicalType::Integer, true},
            {Int64, i64, LogicalType::BigInt, true},
            {Int128, i128, LogicalType::Decimal { precision: 38, scale: 0 }, true},
            {Float32, f32, LogicalType::Real, false},
            {Float64, f64, LogicalType::Double, false}
        }
    };
}

pub(crate) use for_all_native_numbers;
