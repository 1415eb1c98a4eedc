use std::mem::size_of;

use hashbrown::HashTable;
use quarry_block::array::{ArrayBuilderImpl, ArrayImpl};
use quarry_block::operator::{OperatorError, TypeOperators, type_operators};
use quarry_block::types::LogicalType;
use snafu::{ResultExt, ensure};

use super::{
    BuildSnafu, OperatorSnafu, PositionOutOfBoundsSnafu, Result, SetEquality,
    TooManyEntriesSnafu, TypeMismatchSnafu,
};
use crate::common::types::HashValue;

/// Source index of the null entry
const NULL_SOURCE: u32 = u32::MAX;

/// Element of the set, a position inside one of the sources
#[derive(Debug, Clone, Copy)]
struct Entry {
    hash: HashValue,
    source: u32,
    position: u32,
}

/// Set of the distinct elements of a logical type. Elements are never copied: the set
/// keeps the arrays they come from and stores positions
///
/// Null is tracked by a flag and never enters the hash table, adding it twice only
/// stores it once in both [`SetEquality`] modes
#[derive(Debug)]
pub struct DistinctSet {
    logical_type: LogicalType,
    operators: &'static dyn TypeOperators,
    equality: SetEquality,
    /// Index of the entries
    table: HashTable<u32>,
    /// Entries in first-seen order
    entries: Vec<Entry>,
    sources: Vec<ArrayImpl>,
    contains_null: bool,
}

impl DistinctSet {
    /// Create a set that expects `expected_size` distinct elements
    pub fn new(logical_type: LogicalType, equality: SetEquality, expected_size: usize) -> Self {
        Self {
            logical_type,
            operators: type_operators(&logical_type),
            equality,
            table: HashTable::with_capacity(expected_size),
            entries: Vec::with_capacity(expected_size),
            sources: Vec::new(),
            contains_null: false,
        }
    }

    /// Logical type of the elements
    #[inline]
    pub fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    /// Equality used to resolve collisions
    #[inline]
    pub fn equality(&self) -> SetEquality {
        self.equality
    }

    /// Number of distinct elements, null included
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the set has no element
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if a null has been added
    #[inline]
    pub fn contains_null(&self) -> bool {
        self.contains_null
    }

    fn check(&self, array: &ArrayImpl, position: usize) -> Result<()> {
        ensure!(
            array.logical_type() == &self.logical_type,
            TypeMismatchSnafu {
                set: self.logical_type,
                actual: *array.logical_type(),
            }
        );
        ensure!(
            position < array.len(),
            PositionOutOfBoundsSnafu {
                position,
                len: array.len()
            }
        );
        Ok(())
    }

    fn is_same(
        &self,
        lhs: &ArrayImpl,
        lhs_position: usize,
        rhs: &ArrayImpl,
        rhs_position: usize,
    ) -> std::result::Result<bool, OperatorError> {
        match self.equality {
            SetEquality::NotDistinct => Ok(!self.operators.is_distinct_from_at(
                lhs,
                lhs_position,
                rhs,
                rhs_position,
            )?),
            SetEquality::Equal => Ok(self
                .operators
                .equal_at(lhs, lhs_position, rhs, rhs_position)?
                .unwrap_or(false)),
        }
    }

    /// Find the entry that holds the same element as the non-null position
    fn find(&self, array: &ArrayImpl, position: usize, hash: HashValue) -> Result<Option<u32>> {
        let mut error = None;
        let found = self
            .table
            .find(hash, |&index| {
                let entry = &self.entries[index as usize];
                if error.is_some() || entry.hash != hash {
                    return false;
                }
                let source = &self.sources[entry.source as usize];
                match self.is_same(source, entry.position as usize, array, position) {
                    Ok(same) => same,
                    Err(e) => {
                        error = Some(e);
                        false
                    }
                }
            })
            .copied();
        match error {
            Some(e) => Err(e).context(OperatorSnafu),
            None => Ok(found),
        }
    }

    /// Index of the array in the sources, consecutive positions of the same array
    /// share the source
    fn source_index(&mut self, array: &ArrayImpl) -> u32 {
        match self.sources.last() {
            Some(last) if last.ptr_eq(array) => (self.sources.len() - 1) as u32,
            _ => {
                self.sources.push(array.clone());
                (self.sources.len() - 1) as u32
            }
        }
    }

    /// Add the element at the position, returns true if it was not in the set
    pub fn add(&mut self, array: &ArrayImpl, position: usize) -> Result<bool> {
        self.check(array, position)?;
        ensure!(
            self.entries.len() < NULL_SOURCE as usize,
            TooManyEntriesSnafu {
                max: NULL_SOURCE as usize
            }
        );

        if array.is_null(position) {
            if self.contains_null {
                return Ok(false);
            }
            self.contains_null = true;
            self.entries.push(Entry {
                hash: quarry_block::operator::NULL_HASH_CODE,
                source: NULL_SOURCE,
                position: 0,
            });
            return Ok(true);
        }

        let hash = self
            .operators
            .hash_at(array, position)
            .context(OperatorSnafu)?;
        if self.find(array, position, hash)?.is_some() {
            return Ok(false);
        }

        let position = u32::try_from(position).map_err(|_| {
            TooManyEntriesSnafu {
                max: NULL_SOURCE as usize,
            }
            .build()
        })?;
        let source = self.source_index(array);
        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            hash,
            source,
            position,
        });
        let entries = &self.entries;
        self.table
            .insert_unique(hash, index, |&index| entries[index as usize].hash);
        Ok(true)
    }

    /// Returns true if the set holds the element at the position. A null position
    /// answers whether a null has been added
    pub fn contains(&self, array: &ArrayImpl, position: usize) -> Result<bool> {
        self.check(array, position)?;
        if array.is_null(position) {
            return Ok(self.contains_null);
        }
        let hash = self
            .operators
            .hash_at(array, position)
            .context(OperatorSnafu)?;
        Ok(self.find(array, position, hash)?.is_some())
    }

    /// Append the elements into the builder in first-seen order
    pub fn write_into(&self, builder: &mut ArrayBuilderImpl) -> Result<()> {
        for entry in &self.entries {
            if entry.source == NULL_SOURCE {
                builder.append_null();
            } else {
                builder
                    .append_from(&self.sources[entry.source as usize], entry.position as usize)
                    .context(BuildSnafu)?;
            }
        }
        Ok(())
    }

    /// Build the distinct elements in first-seen order
    pub fn build(&self) -> Result<ArrayImpl> {
        let mut builder = ArrayBuilderImpl::with_capacity(self.logical_type, self.len());
        self.write_into(&mut builder)?;
        Ok(builder.build())
    }

    /// Estimated memory retained by the set, sources included
    pub fn estimated_size(&self) -> usize {
        size_of::<Self>()
            + self.entries.capacity() * size_of::<Entry>()
            + self.table.capacity() * (size_of::<u32>() + 1)
            + self.sources.capacity() * size_of::<ArrayImpl>()
            + self
                .sources
                .iter()
                .map(ArrayImpl::retained_size_in_bytes)
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use quarry_block::array::{
        BinaryArray, DictionaryArray, Float64Array, Int32Array, RunLengthArray,
    };

    use super::*;
    use crate::exec::set::SetError;

    fn int32(values: &[Option<i32>]) -> ArrayImpl {
        ArrayImpl::Int32(values.iter().copied().collect::<Int32Array>())
    }

    fn add_all(set: &mut DistinctSet, array: &ArrayImpl) -> Vec<bool> {
        (0..array.len())
            .map(|position| set.add(array, position).unwrap())
            .collect()
    }

    #[test]
    fn test_add_and_build() {
        let array = int32(&[Some(3), Some(1), None, Some(3), None, Some(2)]);
        let mut set = DistinctSet::new(LogicalType::Integer, SetEquality::NotDistinct, 2);
        assert_eq!(
            add_all(&mut set, &array),
            [true, true, true, false, false, true]
        );
        assert_eq!(set.len(), 4);
        assert!(set.contains_null());
        assert_eq!(
            set.build().unwrap(),
            int32(&[Some(3), Some(1), None, Some(2)])
        );
        // The array is only retained once
        assert_eq!(set.sources.len(), 1);
    }

    #[test]
    fn test_contains_across_arrays() {
        let mut set = DistinctSet::new(LogicalType::Integer, SetEquality::Equal, 4);
        add_all(&mut set, &int32(&[Some(1), Some(2)]));
        let others = int32(&[Some(2), Some(5), None]);
        assert!(set.contains(&others, 0).unwrap());
        assert!(!set.contains(&others, 1).unwrap());
        assert!(!set.contains(&others, 2).unwrap());
        add_all(&mut set, &others);
        assert!(set.contains(&others, 2).unwrap());
        assert_eq!(set.len(), 4);
        assert_eq!(set.sources.len(), 2);
    }

    #[test]
    fn test_nan_and_null_equality() {
        let array = ArrayImpl::Float64(
            [Some(f64::NAN), Some(-f64::NAN), None, None, Some(0.0), Some(-0.0)]
                .into_iter()
                .collect::<Float64Array>(),
        );

        let mut not_distinct = DistinctSet::new(LogicalType::Double, SetEquality::NotDistinct, 0);
        assert_eq!(
            add_all(&mut not_distinct, &array),
            [true, false, true, false, true, false]
        );

        // NaN equals nothing, null is still stored once
        let mut equal = DistinctSet::new(LogicalType::Double, SetEquality::Equal, 0);
        assert_eq!(
            add_all(&mut equal, &array),
            [true, true, true, false, true, false]
        );
        assert!(!equal.contains(&array, 0).unwrap());
        assert!(not_distinct.contains(&array, 1).unwrap());
    }

    #[test]
    fn test_dictionary_source() {
        let dictionary = ArrayImpl::Binary(BinaryArray::from_str_iter([Some("a"), Some("b")]));
        let array = ArrayImpl::Dictionary(
            DictionaryArray::try_new(dictionary, &[1, 0, 1, 1]).unwrap(),
        );
        let mut set = DistinctSet::new(LogicalType::VarChar, SetEquality::NotDistinct, 2);
        assert_eq!(add_all(&mut set, &array), [true, true, false, false]);
        assert_eq!(
            set.build().unwrap(),
            ArrayImpl::Binary(BinaryArray::from_str_iter([Some("b"), Some("a")]))
        );
    }

    #[test]
    fn test_invalid_arguments() {
        let mut set = DistinctSet::new(LogicalType::Date, SetEquality::NotDistinct, 0);
        let array = int32(&[Some(1)]);
        let err = set.add(&array, 0).unwrap_err();
        expect_test::expect!["Set of `date` can not accept the array of `integer`"]
            .assert_eq(&err.to_string());

        let mut set = DistinctSet::new(LogicalType::Integer, SetEquality::NotDistinct, 0);
        assert!(matches!(
            set.add(&array, 1),
            Err(SetError::PositionOutOfBounds { position: 1, len: 1 })
        ));
        assert!(set.is_empty());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_position_beyond_u32() {
        let len = u32::MAX as usize + 2;
        let array = ArrayImpl::RunLength(RunLengthArray::try_new(int32(&[Some(7)]), len).unwrap());
        let mut set = DistinctSet::new(LogicalType::Integer, SetEquality::NotDistinct, 0);
        assert!(matches!(
            set.add(&array, len - 1),
            Err(SetError::TooManyEntries { .. })
        ));
        assert!(set.is_empty());
        assert!(set.sources.is_empty());
        assert!(set.add(&array, 0).unwrap());
        assert!(set.contains(&array, len - 1).unwrap());
    }

    #[test]
    fn test_estimated_size_grows() {
        let mut set = DistinctSet::new(LogicalType::Integer, SetEquality::NotDistinct, 0);
        let mut last = set.estimated_size();
        for chunk in 0..8 {
            let array = int32(&(0..64).map(|v| Some(chunk * 64 + v)).collect::<Vec<_>>());
            add_all(&mut set, &array);
            let size = set.estimated_size();
            assert!(size > last);
            last = size;
        }
        assert_eq!(set.len(), 512);
    }
}
