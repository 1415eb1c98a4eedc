//! Spill the histogram of a group into a page and merge it back later

use quarry_block::serde::{PagesSerde, SerializedPage};
use quarry_block::types::LogicalType;

use super::GroupedHistogramState;
use crate::common::config::ExecArgs;
use crate::common::types::GroupId;
use crate::error::Result;

/// Moves the histograms between the state and the wire format
#[derive(Debug, Clone, Copy, Default)]
pub struct HistogramSpiller {
    serde: PagesSerde,
}

impl HistogramSpiller {
    /// Create the spiller, pages follow the serde config of the execution
    pub fn with_exec_args(args: &ExecArgs) -> Self {
        Self {
            serde: PagesSerde::new(args.serde),
        }
    }

    /// Serialize the histogram of the group into a page
    pub fn spill(
        &self,
        state: &GroupedHistogramState,
        group_id: GroupId,
    ) -> Result<SerializedPage> {
        let block = state.serialize(group_id)?;
        let page = self.serde.serialize(&block)?;
        tracing::trace!(
            "Spilled {} entries of group {} into {} bytes",
            block.len(),
            group_id,
            page.size_in_bytes()
        );
        Ok(page)
    }

    /// Merge the spilled histogram into the current group of the state
    pub fn restore(&self, state: &mut GroupedHistogramState, page: &SerializedPage) -> Result<()> {
        let block = self
            .serde
            .deserialize(page, &[*state.key_type(), LogicalType::BigInt])?;
        state.deserialize(&block, block.len())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use quarry_block::array::{ArrayImpl, BinaryArray};
    use quarry_block::serde::SerdeConfig;

    use super::*;
    use crate::exec::aggregate::GroupedAccumulatorState;

    #[test]
    fn test_spill_and_restore() {
        let args = ExecArgs::default()
            .with_serde(SerdeConfig::default().with_compression(true))
            .with_histogram_expected_entries(4);
        let spiller = HistogramSpiller::with_exec_args(&args);
        let mut state = GroupedHistogramState::with_exec_args(LogicalType::VarChar, &args);
        state.ensure_capacity(2);
        let array = ArrayImpl::Binary(BinaryArray::from_str_iter([
            Some("x"),
            None,
            Some("y"),
            Some("x"),
        ]));
        for position in 0..array.len() {
            state.get().add(&array, position).unwrap();
        }

        let page = spiller.spill(&state, 0).unwrap();
        assert_eq!(page.position_count(), 2);
        state.set_group_id(1);
        spiller.restore(&mut state, &page).unwrap();
        spiller.restore(&mut state, &page).unwrap();
        let restored = state
            .entries(1)
            .map(|(key, count)| (key.to_string(), count))
            .collect::<Vec<_>>();
        assert_eq!(restored, [("x".to_string(), 4), ("y".to_string(), 2)]);
    }

    #[test]
    fn test_errors_at_crate_boundary() {
        let spiller = HistogramSpiller::default();
        let mut state = GroupedHistogramState::new(LogicalType::VarChar, 0);
        state.ensure_capacity(1);
        state
            .get()
            .add(&ArrayImpl::Binary(BinaryArray::from_str_iter([Some("x")])), 0)
            .unwrap();
        let page = spiller.spill(&state, 0).unwrap();

        let mut other = GroupedHistogramState::new(LogicalType::BigInt, 0);
        other.ensure_capacity(1);
        let err = spiller.restore(&mut other, &page).unwrap_err();
        expect_test::expect!["Serde failed"].assert_eq(&err.to_string());
        assert_eq!(other.num_entries(), 0);

        let err = spiller.spill(&state, 1).unwrap_err();
        expect_test::expect!["Aggregation failed"].assert_eq(&err.to_string());
        let source = std::error::Error::source(&err).unwrap();
        expect_test::expect![
            "Group 1 is out of the capacity 1, `ensure_capacity` is not called"
        ]
        .assert_eq(&source.to_string());
    }
}
