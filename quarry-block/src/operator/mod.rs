//! Type operator registry.
//!
//! Every [`LogicalType`] maps to a `'static` bundle of operators: equality, is distinct
//! from, hash and total order. Each operator has two calling conventions:
//!
//! - boxed: works on [`ElementImplRef`]s
//!
//! - positional: works on the position inside an [`ArrayImpl`] with any encoding,
//!   nulls are handled with SQL semantics
//!
//! Both conventions decode the value into the same native representation, then call
//! the same kernel

mod kernel;

use std::cmp::Ordering;
use std::fmt::Debug;
use std::marker::PhantomData;

use snafu::{OptionExt, Snafu, ensure};

use self::kernel::{
    BinaryAccess, NativeOperators, PackedTimestampTzAccess, PrimitiveAccess, ValueAccess,
};
use crate::array::ArrayImpl;
use crate::element::ElementImplRef;
use crate::element::timestamp::LongTimestampTz;
use crate::private::Sealed;
use crate::types::LogicalType;

/// Hash code of null
pub const NULL_HASH_CODE: u64 = 0;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum OperatorError {
    #[snafu(display("Operators of `{operators}` can not be applied to `{actual}`"))]
    TypeMismatch {
        operators: &'static str,
        actual: &'static str,
    },
    #[snafu(display("`{operator}` does not accept null argument"))]
    NullArgument { operator: &'static str },
    #[snafu(display("`{logical_type}` is not orderable"))]
    NotOrderable { logical_type: LogicalType },
    #[snafu(display("Position {position} is out of the bounds of the array with length {len}"))]
    PositionOutOfBounds { position: usize, len: usize },
}

type Result<T> = std::result::Result<T, OperatorError>;

/// Operators of a logical type. The trait is sealed, the registry in
/// [`LogicalType::operators`] is the only way to get an implementation
pub trait TypeOperators: Sealed + Debug + Send + Sync {
    /// Name of the native representation
    fn name(&self) -> &'static str;

    /// SQL `=` between two non-null values
    fn equal(&self, lhs: ElementImplRef<'_>, rhs: ElementImplRef<'_>) -> Result<bool>;

    /// SQL `IS DISTINCT FROM`, null is not distinct from null
    fn is_distinct_from(
        &self,
        lhs: Option<ElementImplRef<'_>>,
        rhs: Option<ElementImplRef<'_>>,
    ) -> Result<bool>;

    /// Hash of a non-null value
    fn hash(&self, value: ElementImplRef<'_>) -> Result<u64>;

    /// Total order between two non-null values
    fn compare(&self, lhs: ElementImplRef<'_>, rhs: ElementImplRef<'_>) -> Result<Ordering>;

    /// `lhs < rhs` in the total order
    #[inline]
    fn less_than(&self, lhs: ElementImplRef<'_>, rhs: ElementImplRef<'_>) -> Result<bool> {
        Ok(self.compare(lhs, rhs)?.is_lt())
    }

    /// `lhs <= rhs` in the total order
    #[inline]
    fn less_than_or_equal(&self, lhs: ElementImplRef<'_>, rhs: ElementImplRef<'_>) -> Result<bool> {
        Ok(self.compare(lhs, rhs)?.is_le())
    }

    /// SQL `=` between two positions, `None` if any of them is null
    fn equal_at(
        &self,
        lhs: &ArrayImpl,
        lhs_position: usize,
        rhs: &ArrayImpl,
        rhs_position: usize,
    ) -> Result<Option<bool>>;

    /// SQL `IS DISTINCT FROM` between two positions
    fn is_distinct_from_at(
        &self,
        lhs: &ArrayImpl,
        lhs_position: usize,
        rhs: &ArrayImpl,
        rhs_position: usize,
    ) -> Result<bool>;

    /// Hash of the position, null hashes to [`NULL_HASH_CODE`]
    fn hash_at(&self, array: &ArrayImpl, position: usize) -> Result<u64>;

    /// Total order between two positions, fails if any of them is null
    fn compare_at(
        &self,
        lhs: &ArrayImpl,
        lhs_position: usize,
        rhs: &ArrayImpl,
        rhs_position: usize,
    ) -> Result<Ordering>;

    /// `lhs < rhs` between two positions
    #[inline]
    fn less_than_at(
        &self,
        lhs: &ArrayImpl,
        lhs_position: usize,
        rhs: &ArrayImpl,
        rhs_position: usize,
    ) -> Result<bool> {
        Ok(self
            .compare_at(lhs, lhs_position, rhs, rhs_position)?
            .is_lt())
    }

    /// `lhs <= rhs` between two positions
    #[inline]
    fn less_than_or_equal_at(
        &self,
        lhs: &ArrayImpl,
        lhs_position: usize,
        rhs: &ArrayImpl,
        rhs_position: usize,
    ) -> Result<bool> {
        Ok(self
            .compare_at(lhs, lhs_position, rhs, rhs_position)?
            .is_le())
    }
}

/// Operators built on the kernels of the native representation `A::Native`
struct OperatorBundle<A> {
    _phantom: PhantomData<fn() -> A>,
}

impl<A> OperatorBundle<A> {
    const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<A: ValueAccess> Debug for OperatorBundle<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OperatorBundle<{}>", A::NAME)
    }
}

impl<A: ValueAccess> OperatorBundle<A> {
    #[inline]
    fn boxed(element: ElementImplRef<'_>) -> Result<A::Native<'_>> {
        A::from_element(element).context(TypeMismatchSnafu {
            operators: A::NAME,
            actual: element.ident(),
        })
    }

    #[inline]
    fn positional(array: &ArrayImpl, position: usize) -> Result<Option<A::Native<'_>>> {
        ensure!(
            position < array.len(),
            PositionOutOfBoundsSnafu {
                position,
                len: array.len()
            }
        );
        let (flat, index) = array.flat_position(position);
        A::from_flat(flat, index).context(TypeMismatchSnafu {
            operators: A::NAME,
            actual: flat.ident(),
        })
    }

    /// Decode both sides with a shared lifetime, the native representation may borrow
    /// from the elements
    #[inline]
    fn boxed_pair<'a>(
        lhs: ElementImplRef<'a>,
        rhs: ElementImplRef<'a>,
    ) -> Result<(A::Native<'a>, A::Native<'a>)> {
        Ok((Self::boxed(lhs)?, Self::boxed(rhs)?))
    }

    #[inline]
    fn positional_pair<'a>(
        lhs: &'a ArrayImpl,
        lhs_position: usize,
        rhs: &'a ArrayImpl,
        rhs_position: usize,
    ) -> Result<(Option<A::Native<'a>>, Option<A::Native<'a>>)> {
        Ok((
            Self::positional(lhs, lhs_position)?,
            Self::positional(rhs, rhs_position)?,
        ))
    }
}

impl<A: ValueAccess> Sealed for OperatorBundle<A> {}

impl<A: ValueAccess> TypeOperators for OperatorBundle<A> {
    #[inline]
    fn name(&self) -> &'static str {
        A::NAME
    }

    fn equal(&self, lhs: ElementImplRef<'_>, rhs: ElementImplRef<'_>) -> Result<bool> {
        let (lhs, rhs) = Self::boxed_pair(lhs, rhs)?;
        Ok(lhs.native_equal(rhs))
    }

    fn is_distinct_from(
        &self,
        lhs: Option<ElementImplRef<'_>>,
        rhs: Option<ElementImplRef<'_>>,
    ) -> Result<bool> {
        Ok(match (lhs, rhs) {
            (None, None) => false,
            (Some(lhs), Some(rhs)) => {
                let (lhs, rhs) = Self::boxed_pair(lhs, rhs)?;
                !lhs.native_not_distinct(rhs)
            }
            (Some(value), None) | (None, Some(value)) => {
                Self::boxed(value)?;
                true
            }
        })
    }

    fn hash(&self, value: ElementImplRef<'_>) -> Result<u64> {
        Ok(Self::boxed(value)?.native_hash())
    }

    fn compare(&self, lhs: ElementImplRef<'_>, rhs: ElementImplRef<'_>) -> Result<Ordering> {
        let (lhs, rhs) = Self::boxed_pair(lhs, rhs)?;
        Ok(lhs.native_compare(rhs))
    }

    fn equal_at(
        &self,
        lhs: &ArrayImpl,
        lhs_position: usize,
        rhs: &ArrayImpl,
        rhs_position: usize,
    ) -> Result<Option<bool>> {
        let (lhs, rhs) = Self::positional_pair(lhs, lhs_position, rhs, rhs_position)?;
        Ok(lhs.zip(rhs).map(|(lhs, rhs)| lhs.native_equal(rhs)))
    }

    fn is_distinct_from_at(
        &self,
        lhs: &ArrayImpl,
        lhs_position: usize,
        rhs: &ArrayImpl,
        rhs_position: usize,
    ) -> Result<bool> {
        let (lhs, rhs) = Self::positional_pair(lhs, lhs_position, rhs, rhs_position)?;
        Ok(match (lhs, rhs) {
            (None, None) => false,
            (Some(lhs), Some(rhs)) => !lhs.native_not_distinct(rhs),
            _ => true,
        })
    }

    fn hash_at(&self, array: &ArrayImpl, position: usize) -> Result<u64> {
        Ok(Self::positional(array, position)?.map_or(NULL_HASH_CODE, |value| value.native_hash()))
    }

    fn compare_at(
        &self,
        lhs: &ArrayImpl,
        lhs_position: usize,
        rhs: &ArrayImpl,
        rhs_position: usize,
    ) -> Result<Ordering> {
        match Self::positional_pair(lhs, lhs_position, rhs, rhs_position)? {
            (Some(lhs), Some(rhs)) => Ok(lhs.native_compare(rhs)),
            _ => NullArgumentSnafu {
                operator: "compare",
            }
            .fail(),
        }
    }
}

static BOOLEAN: OperatorBundle<PrimitiveAccess<bool>> = OperatorBundle::new();
static INT8: OperatorBundle<PrimitiveAccess<i8>> = OperatorBundle::new();
static INT16: OperatorBundle<PrimitiveAccess<i16>> = OperatorBundle::new();
static INT32: OperatorBundle<PrimitiveAccess<i32>> = OperatorBundle::new();
static INT64: OperatorBundle<PrimitiveAccess<i64>> = OperatorBundle::new();
static INT128: OperatorBundle<PrimitiveAccess<i128>> = OperatorBundle::new();
static FLOAT32: OperatorBundle<PrimitiveAccess<f32>> = OperatorBundle::new();
static FLOAT64: OperatorBundle<PrimitiveAccess<f64>> = OperatorBundle::new();
static SHORT_TIMESTAMP_TZ: OperatorBundle<PackedTimestampTzAccess> = OperatorBundle::new();
static LONG_TIMESTAMP_TZ: OperatorBundle<PrimitiveAccess<LongTimestampTz>> =
    OperatorBundle::new();
static BINARY: OperatorBundle<BinaryAccess> = OperatorBundle::new();

/// Get the operator bundle of the logical type
pub fn type_operators(logical_type: &LogicalType) -> &'static dyn TypeOperators {
    match logical_type {
        LogicalType::Boolean => &BOOLEAN,
        LogicalType::TinyInt => &INT8,
        LogicalType::SmallInt => &INT16,
        LogicalType::Integer | LogicalType::Date => &INT32,
        LogicalType::BigInt | LogicalType::Timestamp => &INT64,
        LogicalType::Real => &FLOAT32,
        LogicalType::Double => &FLOAT64,
        LogicalType::Decimal { .. } => {
            if logical_type.fixed_size() == Some(8) {
                &INT64
            } else {
                &INT128
            }
        }
        LogicalType::TimestampWithTimeZone { .. } => {
            if logical_type.is_short_timestamp_tz() {
                &SHORT_TIMESTAMP_TZ
            } else {
                &LONG_TIMESTAMP_TZ
            }
        }
        LogicalType::VarChar | LogicalType::VarBinary => &BINARY,
    }
}

/// Get the operator bundle of the logical type, fails if the type does not have a
/// total order
pub fn ordering_operators(logical_type: &LogicalType) -> Result<&'static dyn TypeOperators> {
    ensure!(
        logical_type.is_orderable(),
        NotOrderableSnafu {
            logical_type: *logical_type
        }
    );
    Ok(type_operators(logical_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{
        BinaryArray, DictionaryArray, Float64Array, Int64Array, Int96Array,
        PrimitiveArray,
    };
    use crate::element::timestamp::pack_date_time_with_zone;

    /// Check the positional form agrees with the boxed form on every pair of positions
    fn assert_conventions_agree(logical_type: LogicalType, array: &ArrayImpl) {
        let operators = logical_type.operators();
        for i in 0..array.len() {
            let lhs = array.get(i);
            match lhs {
                Some(lhs) => assert_eq!(
                    operators.hash(lhs).unwrap(),
                    operators.hash_at(array, i).unwrap()
                ),
                None => assert_eq!(operators.hash_at(array, i).unwrap(), NULL_HASH_CODE),
            }
            for j in 0..array.len() {
                let rhs = array.get(j);
                assert_eq!(
                    operators.is_distinct_from(lhs, rhs).unwrap(),
                    operators.is_distinct_from_at(array, i, array, j).unwrap()
                );
                match (lhs, rhs) {
                    (Some(l), Some(r)) => {
                        assert_eq!(
                            Some(operators.equal(l, r).unwrap()),
                            operators.equal_at(array, i, array, j).unwrap()
                        );
                        assert_eq!(
                            operators.compare(l, r).unwrap(),
                            operators.compare_at(array, i, array, j).unwrap()
                        );
                        assert_eq!(
                            operators.less_than(l, r).unwrap(),
                            operators.less_than_at(array, i, array, j).unwrap()
                        );
                        assert_eq!(
                            operators.less_than_or_equal(l, r).unwrap(),
                            operators.less_than_or_equal_at(array, i, array, j).unwrap()
                        );
                    }
                    _ => {
                        assert_eq!(operators.equal_at(array, i, array, j).unwrap(), None);
                        assert!(operators.compare_at(array, i, array, j).is_err());
                    }
                }
            }
        }
    }

    #[test]
    fn test_conventions_agree_on_integers() {
        let array: Int64Array = [Some(1), None, Some(-3), Some(1), Some(i64::MAX)]
            .into_iter()
            .collect();
        assert_conventions_agree(LogicalType::BigInt, &ArrayImpl::Int64(array));
    }

    #[test]
    fn test_conventions_agree_on_floats() {
        let array: Float64Array = [
            Some(f64::NAN),
            Some(-0.0),
            Some(0.0),
            None,
            Some(-f64::NAN),
            Some(f64::NEG_INFINITY),
        ]
        .into_iter()
        .collect();
        let array = ArrayImpl::Float64(array);
        assert_conventions_agree(LogicalType::Double, &array);

        let operators = LogicalType::Double.operators();
        assert_eq!(operators.equal_at(&array, 0, &array, 4).unwrap(), Some(false));
        assert!(!operators.is_distinct_from_at(&array, 0, &array, 4).unwrap());
        assert_eq!(operators.equal_at(&array, 1, &array, 2).unwrap(), Some(true));
        assert_eq!(
            operators.hash_at(&array, 1).unwrap(),
            operators.hash_at(&array, 2).unwrap()
        );
        assert_eq!(
            operators.compare_at(&array, 0, &array, 5).unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn test_conventions_agree_on_timestamp_tz() {
        let long_type = LogicalType::TimestampWithTimeZone { precision: 9 };
        let array: Int96Array = [
            LongTimestampTz::try_new(1_000, 7, 1),
            LongTimestampTz::try_new(1_000, 7, 33),
            LongTimestampTz::try_new(1_001, 0, 1),
            None,
        ]
        .into_iter()
        .collect();
        let array = ArrayImpl::Int96(array.with_logical_type(long_type).unwrap());
        assert_conventions_agree(long_type, &array);
        assert_eq!(
            long_type.operators().equal_at(&array, 0, &array, 1).unwrap(),
            Some(true)
        );

        let short_type = LogicalType::TimestampWithTimeZone { precision: 3 };
        let array: Int64Array = [
            pack_date_time_with_zone(5, 1),
            pack_date_time_with_zone(5, 2),
            pack_date_time_with_zone(-5, 1),
        ]
        .into_iter()
        .collect();
        let array = ArrayImpl::Int64(array.with_logical_type(short_type).unwrap());
        assert_conventions_agree(short_type, &array);
        let operators = short_type.operators();
        assert_eq!(operators.equal_at(&array, 0, &array, 1).unwrap(), Some(true));
        assert!(operators.less_than_at(&array, 2, &array, 0).unwrap());
    }

    #[test]
    fn test_conventions_agree_on_binary() {
        let dictionary = ArrayImpl::Binary(BinaryArray::from_str_iter([
            Some("b"),
            Some("ab"),
            None,
            Some(""),
        ]));
        assert_conventions_agree(LogicalType::VarChar, &dictionary);

        let array =
            ArrayImpl::Dictionary(DictionaryArray::try_new(dictionary.clone(), &[3, 0, 2, 0]).unwrap());
        assert_conventions_agree(LogicalType::VarChar, &array);
        let operators = LogicalType::VarChar.operators();
        assert_eq!(
            operators.equal_at(&array, 1, &dictionary, 0).unwrap(),
            Some(true)
        );
        assert_eq!(
            operators.compare_at(&array, 0, &dictionary, 1).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn test_null_semantics() {
        let array = ArrayImpl::new_null(LogicalType::Integer, 2);
        let operators = LogicalType::Integer.operators();
        assert_eq!(operators.equal_at(&array, 0, &array, 1).unwrap(), None);
        assert!(!operators.is_distinct_from_at(&array, 0, &array, 1).unwrap());
        assert_eq!(operators.hash_at(&array, 1).unwrap(), NULL_HASH_CODE);
        let err = operators.compare_at(&array, 0, &array, 1).unwrap_err();
        let expect = expect_test::expect!["`compare` does not accept null argument"];
        expect.assert_eq(&err.to_string());
        assert!(
            operators
                .is_distinct_from(None, Some(ElementImplRef::Int32(1)))
                .unwrap()
        );
    }

    #[test]
    fn test_type_mismatch() {
        let operators = LogicalType::Real.operators();
        let err = operators
            .equal(ElementImplRef::Int64(1), ElementImplRef::Int64(1))
            .unwrap_err();
        let expect = expect_test::expect!["Operators of `Float32` can not be applied to `Int64`"];
        expect.assert_eq(&err.to_string());

        let array = ArrayImpl::Int64(PrimitiveArray::from_values_iter([1]));
        let err = operators.hash_at(&array, 0).unwrap_err();
        let expect =
            expect_test::expect!["Operators of `Float32` can not be applied to `Int64Array`"];
        expect.assert_eq(&err.to_string());

        let err = LogicalType::BigInt.operators().hash_at(&array, 1).unwrap_err();
        let expect = expect_test::expect![
            "Position 1 is out of the bounds of the array with length 1"
        ];
        expect.assert_eq(&err.to_string());
    }

    #[test]
    fn test_registry() {
        assert_eq!(LogicalType::Date.operators().name(), "Int32");
        assert_eq!(
            LogicalType::Decimal {
                precision: 20,
                scale: 2
            }
            .operators()
            .name(),
            "Int128"
        );
        assert_eq!(
            LogicalType::Decimal {
                precision: 10,
                scale: 2
            }
            .operators()
            .name(),
            "Int64"
        );
        assert_eq!(
            LogicalType::VarBinary.ordering_operators().unwrap().name(),
            "Binary"
        );
    }
}
