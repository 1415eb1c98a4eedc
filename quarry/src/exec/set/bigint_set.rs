use std::mem::size_of;

use hashbrown::HashSet;
use quarry_block::array::{ArrayBuilderImpl, ArrayImpl};
use quarry_block::element::ElementImplRef;
use quarry_block::types::LogicalType;
use quarry_block::utils::hash::{BUILD_HASHER_DEFAULT, BuildHasherDefault};
use snafu::{ResultExt, ensure};

use super::{BuildSnafu, PositionOutOfBoundsSnafu, Result, TypeMismatchSnafu};

/// Set of the distinct `BigInt`s, null occupies a single slot
#[derive(Debug)]
pub struct BigintSet {
    values: HashSet<i64, BuildHasherDefault>,
    /// Elements in first-seen order, `None` is the null slot
    order: Vec<Option<i64>>,
    contains_null: bool,
}

impl BigintSet {
    /// Create a set that expects `expected_size` distinct elements
    pub fn new(expected_size: usize) -> Self {
        Self {
            values: HashSet::with_capacity_and_hasher(expected_size, BUILD_HASHER_DEFAULT),
            order: Vec::with_capacity(expected_size),
            contains_null: false,
        }
    }

    /// Number of distinct elements, null included
    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the set has no element
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns true if a null has been added
    #[inline]
    pub fn contains_null(&self) -> bool {
        self.contains_null
    }

    fn value(array: &ArrayImpl, position: usize) -> Result<Option<i64>> {
        ensure!(
            *array.logical_type() == LogicalType::BigInt,
            TypeMismatchSnafu {
                set: LogicalType::BigInt,
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
        match array.get(position) {
            None => Ok(None),
            Some(ElementImplRef::Int64(value)) => Ok(Some(value)),
            Some(_) => TypeMismatchSnafu {
                set: LogicalType::BigInt,
                actual: *array.logical_type(),
            }
            .fail(),
        }
    }

    /// Add the element at the position, returns true if it was not in the set
    pub fn add(&mut self, array: &ArrayImpl, position: usize) -> Result<bool> {
        let value = Self::value(array, position)?;
        let inserted = match value {
            None => !std::mem::replace(&mut self.contains_null, true),
            Some(value) => self.values.insert(value),
        };
        if inserted {
            self.order.push(value);
        }
        Ok(inserted)
    }

    /// Returns true if the set holds the element at the position. A null position
    /// answers whether a null has been added
    pub fn contains(&self, array: &ArrayImpl, position: usize) -> Result<bool> {
        Ok(match Self::value(array, position)? {
            None => self.contains_null,
            Some(value) => self.values.contains(&value),
        })
    }

    /// Append the elements into the builder in first-seen order
    pub fn write_into(&self, builder: &mut ArrayBuilderImpl) -> Result<()> {
        for value in &self.order {
            match value {
                Some(value) => builder.write_long(*value).context(BuildSnafu)?,
                None => builder.append_null(),
            }
        }
        Ok(())
    }

    /// Build the distinct elements in first-seen order
    pub fn build(&self) -> ArrayImpl {
        ArrayImpl::Int64(self.order.iter().copied().collect())
    }

    /// Estimated memory retained by the set
    pub fn estimated_size(&self) -> usize {
        size_of::<Self>()
            + self.values.capacity() * (size_of::<i64>() + 1)
            + self.order.capacity() * size_of::<Option<i64>>()
    }
}
