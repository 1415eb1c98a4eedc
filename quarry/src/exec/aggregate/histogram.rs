//! Histogram of values per group: the count of each distinct value

use std::mem::size_of;

use hashbrown::HashTable;
use quarry_block::array::{ArrayBuilderImpl, ArrayImpl};
use quarry_block::block::DataBlock;
use quarry_block::element::{ElementImpl, ElementImplRef};
use quarry_block::operator::{OperatorError, TypeOperators, type_operators};
use quarry_block::types::LogicalType;
use quarry_block::utils::hash::{combine_hash, hash_one};
use snafu::{ResultExt, ensure};

use super::{
    ArraySnafu, BlockSnafu, CountOverflowSnafu, GroupOutOfCapacitySnafu,
    GroupedAccumulatorState, InvalidSerializedStateSnafu, OperatorSnafu,
    PositionOutOfBoundsSnafu, Result, TooManyEntriesSnafu, TypeMismatchSnafu,
};
use crate::common::config::ExecArgs;
use crate::common::types::{GroupId, HashValue};

/// Terminates the chain of a group
const NO_ENTRY: u32 = u32::MAX;

/// Histograms of all the groups in a single hash table keyed by `(group id, value)`.
///
/// Entries live in growable arrays indexed by the entry id, the entries of a group are
/// chained in insertion order through `next_entries`. Null values are ignored
#[derive(Debug)]
pub struct GroupedHistogramState {
    key_type: LogicalType,
    operators: &'static dyn TypeOperators,
    group_id: GroupId,

    /// First entry of each group
    group_heads: Vec<u32>,
    /// Last entry of each group
    group_tails: Vec<u32>,
    /// Number of entries of each group
    group_lens: Vec<u32>,

    keys: Vec<ElementImpl>,
    counts: Vec<i64>,
    entry_groups: Vec<GroupId>,
    entry_hashes: Vec<HashValue>,
    next_entries: Vec<u32>,

    table: HashTable<u32>,
    /// Heap bytes of the variable width keys
    heap_size: usize,
}

impl GroupedHistogramState {
    /// Create the state, `expected_entries` is the number of entries preallocated
    pub fn new(key_type: LogicalType, expected_entries: usize) -> Self {
        Self {
            key_type,
            operators: type_operators(&key_type),
            group_id: 0,
            group_heads: Vec::new(),
            group_tails: Vec::new(),
            group_lens: Vec::new(),
            keys: Vec::with_capacity(expected_entries),
            counts: Vec::with_capacity(expected_entries),
            entry_groups: Vec::with_capacity(expected_entries),
            entry_hashes: Vec::with_capacity(expected_entries),
            next_entries: Vec::with_capacity(expected_entries),
            table: HashTable::with_capacity(expected_entries),
            heap_size: 0,
        }
    }

    /// Create the state, preallocating the entries configured by the execution
    pub fn with_exec_args(key_type: LogicalType, args: &ExecArgs) -> Self {
        Self::new(key_type, args.histogram_expected_entries)
    }

    /// Logical type of the keys
    #[inline]
    pub fn key_type(&self) -> &LogicalType {
        &self.key_type
    }

    /// Number of entries across all the groups
    #[inline]
    pub fn num_entries(&self) -> usize {
        self.keys.len()
    }

    /// Histogram of the current group
    pub fn get(&mut self) -> HistogramView<'_> {
        HistogramView { state: self }
    }

    /// Entries of the group in insertion order
    pub fn entries(&self, group_id: GroupId) -> HistogramIter<'_> {
        let next = self
            .group_heads
            .get(group_id as usize)
            .copied()
            .unwrap_or(NO_ENTRY);
        HistogramIter { state: self, next }
    }

    fn group_index(&self, group_id: GroupId) -> Result<usize> {
        let capacity = self.group_heads.len();
        ensure!(
            (group_id as usize) < capacity,
            GroupOutOfCapacitySnafu { group_id, capacity }
        );
        Ok(group_id as usize)
    }

    fn is_same_key(
        &self,
        index: u32,
        group_id: GroupId,
        key: ElementImplRef<'_>,
    ) -> std::result::Result<bool, OperatorError> {
        let index = index as usize;
        if self.entry_groups[index] != group_id {
            return Ok(false);
        }
        Ok(!self
            .operators
            .is_distinct_from(Some(self.keys[index].as_ref()), Some(key))?)
    }

    fn find(
        &self,
        group_id: GroupId,
        key: ElementImplRef<'_>,
        hash: HashValue,
    ) -> Result<Option<u32>> {
        let mut error = None;
        let found = self
            .table
            .find(hash, |&index| {
                if error.is_some() || self.entry_hashes[index as usize] != hash {
                    return false;
                }
                match self.is_same_key(index, group_id, key) {
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

    fn add_count(
        &mut self,
        group_id: GroupId,
        array: &ArrayImpl,
        position: usize,
        count: i64,
    ) -> Result<()> {
        let group = self.group_index(group_id)?;
        ensure!(
            array.logical_type() == &self.key_type,
            TypeMismatchSnafu {
                state: self.key_type,
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
        let Some(key) = array.get(position) else {
            return Ok(());
        };

        let value_hash = self
            .operators
            .hash_at(array, position)
            .context(OperatorSnafu)?;
        let hash = combine_hash(hash_one(group_id), value_hash);
        if let Some(index) = self.find(group_id, key, hash)? {
            let current = self.counts[index as usize];
            self.counts[index as usize] = current.checked_add(count).ok_or_else(|| {
                CountOverflowSnafu {
                    key: key.to_string(),
                    current,
                    count,
                }
                .build()
            })?;
            return Ok(());
        }

        ensure!(
            self.keys.len() < NO_ENTRY as usize,
            TooManyEntriesSnafu {
                max: NO_ENTRY as usize
            }
        );
        let index = self.keys.len() as u32;
        let key = key.to_owned();
        self.heap_size += key.heap_size();
        self.keys.push(key);
        self.counts.push(count);
        self.entry_groups.push(group_id);
        self.entry_hashes.push(hash);
        self.next_entries.push(NO_ENTRY);
        match self.group_tails[group] {
            NO_ENTRY => self.group_heads[group] = index,
            tail => self.next_entries[tail as usize] = index,
        }
        self.group_tails[group] = index;
        self.group_lens[group] += 1;

        let capacity = self.table.capacity();
        let entry_hashes = &self.entry_hashes;
        self.table
            .insert_unique(hash, index, |&index| entry_hashes[index as usize]);
        if self.table.capacity() != capacity {
            tracing::trace!(
                "Histogram table of `{}` grows from {} to {} entries",
                self.key_type,
                capacity,
                self.table.capacity()
            );
        }
        Ok(())
    }

    /// Flatten the histogram of the group into a data block with two columns: the keys
    /// and their `BigInt` counts, in insertion order
    pub fn serialize(&self, group_id: GroupId) -> Result<DataBlock> {
        let group = self.group_index(group_id)?;
        let len = self.group_lens[group] as usize;
        let mut keys = ArrayBuilderImpl::with_capacity(self.key_type, len);
        let mut counts = ArrayBuilderImpl::with_capacity(LogicalType::BigInt, len);
        for (key, count) in self.entries(group_id) {
            keys.append_element(key).context(ArraySnafu)?;
            counts.write_long(count).context(ArraySnafu)?;
        }
        DataBlock::try_new(vec![keys.build(), counts.build()]).context(BlockSnafu)
    }

    /// Merge the serialized histogram into the current group, counts of the same key
    /// add up. The block is validated before the merge, an invalid block leaves the
    /// state untouched
    pub fn deserialize(&mut self, block: &DataBlock, expected_size: usize) -> Result<()> {
        let expected_types = [self.key_type, LogicalType::BigInt];
        let logical_types = block.logical_types();
        ensure!(
            logical_types == expected_types,
            InvalidSerializedStateSnafu {
                reason: format!(
                    "expect columns `[{}]`, found `[{}]`",
                    join_types(&expected_types),
                    join_types(&logical_types)
                ),
            }
        );
        let group_id = self.group_id;
        self.group_index(group_id)?;
        let keys = &block.arrays()[0];
        let counts = &block.arrays()[1];
        let mut values = Vec::with_capacity(block.len());
        for position in 0..block.len() {
            let Some(ElementImplRef::Int64(count)) = counts.get(position) else {
                return InvalidSerializedStateSnafu {
                    reason: format!("count at position {position} is null"),
                }
                .fail();
            };
            ensure!(
                !keys.is_null(position),
                InvalidSerializedStateSnafu {
                    reason: format!("key at position {position} is null"),
                }
            );
            values.push(count);
        }

        let entry_hashes = &self.entry_hashes;
        self.table
            .reserve(expected_size, |&index| entry_hashes[index as usize]);
        for (position, count) in values.into_iter().enumerate() {
            self.add_count(group_id, keys, position, count)?;
        }
        Ok(())
    }
}

fn join_types(logical_types: &[LogicalType]) -> String {
    logical_types
        .iter()
        .map(LogicalType::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl GroupedAccumulatorState for GroupedHistogramState {
    #[inline]
    fn set_group_id(&mut self, group_id: GroupId) {
        self.group_id = group_id;
    }

    #[inline]
    fn group_id(&self) -> GroupId {
        self.group_id
    }

    fn ensure_capacity(&mut self, size: usize) {
        if size <= self.group_heads.len() {
            return;
        }
        tracing::debug!(
            "Histogram state of `{}` grows from {} to {} groups",
            self.key_type,
            self.group_heads.len(),
            size
        );
        self.group_heads.resize(size, NO_ENTRY);
        self.group_tails.resize(size, NO_ENTRY);
        self.group_lens.resize(size, 0);
    }

    fn estimated_size(&self) -> usize {
        let group_index = self.group_heads.capacity() * size_of::<u32>()
            + self.group_tails.capacity() * size_of::<u32>()
            + self.group_lens.capacity() * size_of::<u32>();
        let entries = self.keys.capacity() * size_of::<ElementImpl>()
            + self.counts.capacity() * size_of::<i64>()
            + self.entry_groups.capacity() * size_of::<GroupId>()
            + self.entry_hashes.capacity() * size_of::<HashValue>()
            + self.next_entries.capacity() * size_of::<u32>();
        size_of::<Self>()
            + group_index
            + entries
            + self.table.capacity() * (size_of::<u32>() + 1)
            + self.heap_size
    }
}

/// Histogram of the current group
#[derive(Debug)]
pub struct HistogramView<'a> {
    state: &'a mut GroupedHistogramState,
}

impl HistogramView<'_> {
    /// Count the value at the position once, null is ignored
    #[inline]
    pub fn add(&mut self, array: &ArrayImpl, position: usize) -> Result<()> {
        self.add_count(array, position, 1)
    }

    /// Count the value at the position `count` times, null is ignored
    pub fn add_count(&mut self, array: &ArrayImpl, position: usize, count: i64) -> Result<()> {
        let group_id = self.state.group_id;
        self.state.add_count(group_id, array, position, count)
    }

    /// Number of distinct values of the group
    pub fn len(&self) -> usize {
        self.state
            .group_lens
            .get(self.state.group_id as usize)
            .map_or(0, |&len| len as usize)
    }

    /// Returns true if the group has no value
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values of the group and their counts in insertion order
    pub fn iter(&self) -> HistogramIter<'_> {
        self.state.entries(self.state.group_id)
    }
}

/// Iterator of the `(value, count)` pairs of a group
#[derive(Debug)]
pub struct HistogramIter<'a> {
    state: &'a GroupedHistogramState,
    next: u32,
}

impl<'a> Iterator for HistogramIter<'a> {
    type Item = (ElementImplRef<'a>, i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == NO_ENTRY {
            return None;
        }
        let index = self.next as usize;
        self.next = self.state.next_entries[index];
        Some((self.state.keys[index].as_ref(), self.state.counts[index]))
    }
}

#[cfg(test)]
mod tests {
    use quarry_block::array::{BinaryArray, Float64Array, Int32Array, Int64Array};
    use quarry_block::serde::PagesSerde;

    use super::*;

    fn varchar(values: &[Option<&str>]) -> ArrayImpl {
        ArrayImpl::Binary(BinaryArray::from_str_iter(values.iter().copied()))
    }

    fn collect(state: &GroupedHistogramState, group_id: GroupId) -> Vec<(String, i64)> {
        state
            .entries(group_id)
            .map(|(key, count)| (key.to_string(), count))
            .collect()
    }

    #[test]
    fn test_add_into_groups() {
        let mut state = GroupedHistogramState::new(LogicalType::VarChar, 2);
        state.ensure_capacity(2);
        let array = varchar(&[Some("a"), Some("b"), None, Some("a")]);

        state.set_group_id(1);
        for position in 0..array.len() {
            state.get().add(&array, position).unwrap();
        }
        state.set_group_id(0);
        state.get().add_count(&array, 1, 5).unwrap();
        state.get().add(&array, 2).unwrap();

        assert_eq!(state.get().len(), 1);
        state.set_group_id(1);
        assert_eq!(state.get().len(), 2);
        let expect = expect_test::expect![[r#"
            [
                (
                    "a",
                    2,
                ),
                (
                    "b",
                    1,
                ),
            ]
        "#]];
        expect.assert_debug_eq(&collect(&state, 1));
        assert_eq!(collect(&state, 0), [("b".to_string(), 5)]);
        assert_eq!(state.num_entries(), 3);
    }

    #[test]
    fn test_group_out_of_capacity() {
        let mut state = GroupedHistogramState::new(LogicalType::BigInt, 0);
        state.ensure_capacity(1);
        state.set_group_id(1);
        let array = ArrayImpl::Int64(Int64Array::from_values_iter([1]));
        let err = state.get().add(&array, 0).unwrap_err();
        expect_test::expect![
            "Group 1 is out of the capacity 1, `ensure_capacity` is not called"
        ]
        .assert_eq(&err.to_string());

        state.set_group_id(0);
        let err = state
            .get()
            .add(&ArrayImpl::Int32(Int32Array::from_values_iter([1])), 0)
            .unwrap_err();
        expect_test::expect!["State of `bigint` can not accept the array of `integer`"]
            .assert_eq(&err.to_string());
    }

    #[test]
    fn test_float_keys() {
        let mut state = GroupedHistogramState::new(LogicalType::Double, 0);
        state.ensure_capacity(1);
        let array = ArrayImpl::Float64(
            [Some(f64::NAN), Some(0.0), Some(-f64::NAN), Some(-0.0)]
                .into_iter()
                .collect::<Float64Array>(),
        );
        for position in 0..array.len() {
            state.get().add(&array, position).unwrap();
        }
        let counts = state.get().iter().map(|(_, count)| count).collect::<Vec<_>>();
        assert_eq!(counts, [2, 2]);
    }

    #[test]
    fn test_serialize_and_merge() {
        let mut state = GroupedHistogramState::new(LogicalType::VarChar, 4);
        state.ensure_capacity(3);
        let array = varchar(&[Some("x"), Some("y"), Some("x")]);
        state.set_group_id(0);
        for position in 0..array.len() {
            state.get().add(&array, position).unwrap();
        }

        let block = state.serialize(0).unwrap();
        assert_eq!(block.len(), 2);
        assert_eq!(
            block.logical_types(),
            [LogicalType::VarChar, LogicalType::BigInt]
        );
        let empty = state.serialize(2).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.num_arrays(), 2);

        // Spill through the wire format, then merge into another group twice
        let serde = PagesSerde::default();
        let page = serde.serialize(&block).unwrap();
        let block = serde
            .deserialize(&page, &[LogicalType::VarChar, LogicalType::BigInt])
            .unwrap();
        state.set_group_id(1);
        state.get().add(&varchar(&[Some("y")]), 0).unwrap();
        state.deserialize(&block, block.len()).unwrap();
        state.deserialize(&block, block.len()).unwrap();
        assert_eq!(
            collect(&state, 1),
            [("y".to_string(), 3), ("x".to_string(), 4)]
        );
        assert_eq!(collect(&state, 0).len(), 2);

        let err = state
            .deserialize(&DataBlock::with_logical_types(&[LogicalType::BigInt]), 0)
            .unwrap_err();
        expect_test::expect!["Invalid serialized state: expect columns `[varchar, bigint]`, found `[bigint]`"]
            .assert_eq(&err.to_string());
    }

    #[test]
    fn test_count_overflow() {
        let mut state = GroupedHistogramState::new(LogicalType::VarChar, 0);
        state.ensure_capacity(1);
        let array = varchar(&[Some("hot")]);
        state.get().add_count(&array, 0, i64::MAX).unwrap();
        let err = state.get().add_count(&array, 0, i64::MAX).unwrap_err();
        expect_test::expect![
            "Count of `hot` overflows, 9223372036854775807 can not be added to 9223372036854775807"
        ]
        .assert_eq(&err.to_string());
        assert_eq!(collect(&state, 0), [("hot".to_string(), i64::MAX)]);
        state.get().add_count(&array, 0, -1).unwrap();
        assert_eq!(collect(&state, 0), [("hot".to_string(), i64::MAX - 1)]);
    }

    #[test]
    fn test_invalid_block_leaves_state_untouched() {
        let mut state = GroupedHistogramState::with_exec_args(
            LogicalType::VarChar,
            &ExecArgs::default().with_histogram_expected_entries(0),
        );
        state.ensure_capacity(1);
        state.get().add(&varchar(&[Some("b")]), 0).unwrap();
        let size = state.estimated_size();

        let null_key = DataBlock::try_new(vec![
            varchar(&[Some("a"), None]),
            ArrayImpl::Int64(Int64Array::from_values_iter([3, 1])),
        ])
        .unwrap();
        let err = state.deserialize(&null_key, 2).unwrap_err();
        expect_test::expect!["Invalid serialized state: key at position 1 is null"]
            .assert_eq(&err.to_string());

        let null_count = DataBlock::try_new(vec![
            varchar(&[Some("a"), Some("long enough to land on the heap")]),
            ArrayImpl::Int64([Some(3), None].into_iter().collect::<Int64Array>()),
        ])
        .unwrap();
        let err = state.deserialize(&null_count, 2).unwrap_err();
        expect_test::expect!["Invalid serialized state: count at position 1 is null"]
            .assert_eq(&err.to_string());

        assert_eq!(collect(&state, 0), [("b".to_string(), 1)]);
        assert_eq!(state.num_entries(), 1);
        assert_eq!(state.estimated_size(), size);
    }

    #[test]
    fn test_estimated_size_never_decreases() {
        use rand::Rng;

        let mut rng = rand::thread_rng();
        let mut state = GroupedHistogramState::new(LogicalType::VarChar, 0);
        let mut last = state.estimated_size();
        for round in 0..200 {
            let groups = round / 10 + 1;
            state.ensure_capacity(groups);
            state.set_group_id(rng.gen_range(0..groups) as GroupId);
            let value = format!("value-{}", rng.gen_range(0..50));
            state.get().add(&varchar(&[Some(value.as_str())]), 0).unwrap();
            let size = state.estimated_size();
            assert!(size >= last, "{size} < {last}");
            last = size;
        }
        assert!(last > size_of::<GroupedHistogramState>());
    }
}
