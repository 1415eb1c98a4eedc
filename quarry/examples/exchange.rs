//! Exchange example: produce blocks, ship them through the wire format, then aggregate
//! a histogram per group on the other side
//!
//! Run with `RUST_LOG=trace` to see the serializer and the state at work

use quarry::common::config::ExecArgs;
use quarry::common::types::GroupId;
use quarry::error::Result;
use quarry::exec::aggregate::{GroupedAccumulatorState, GroupedHistogramState, HistogramSpiller};
use quarry::exec::function::array_set::ArraySetFunctions;
use quarry_block::array::ArrayImpl;
use quarry_block::block::{DataBlock, DataBlockBuilder};
use quarry_block::element::ElementImplRef;
use quarry_block::serde::{PageReader, PageWriter, PagesSerde};
use quarry_block::types::LogicalType;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const NUM_ROWS: i64 = 10_000;
const NUM_GROUPS: usize = 4;
const COLORS: [&str; 5] = ["red", "green", "blue", "cyan", "black"];

fn produce(args: &ExecArgs) -> Result<Vec<DataBlock>> {
    let mut builder = DataBlockBuilder::new(
        vec![LogicalType::BigInt, LogicalType::VarChar],
        args.block_builder,
    );
    let mut blocks = Vec::new();
    for row in 0..NUM_ROWS {
        let builders = builder.array_builders_mut();
        builders[0].write_long(row % NUM_GROUPS as i64)?;
        if row % 7 == 0 {
            builders[1].append_null();
        } else {
            builders[1].write_bytes(COLORS[(row * 31 % 5) as usize].as_bytes())?;
        }
        builder.declare_position();
        if builder.is_full() {
            blocks.push(builder.flush()?);
        }
    }
    if !builder.is_empty() {
        blocks.push(builder.flush()?);
    }
    Ok(blocks)
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = ExecArgs::default();
    let serde = PagesSerde::new(args.serde.with_compression(true));

    let mut writer = PageWriter::new(serde);
    for block in produce(&args)? {
        writer.write_block(&block)?;
    }
    tracing::info!(
        "Wrote {} pages, {} bytes",
        writer.pages_written(),
        writer.size_in_bytes()
    );

    let logical_types = [LogicalType::BigInt, LogicalType::VarChar];
    let mut state = GroupedHistogramState::with_exec_args(LogicalType::VarChar, &args);
    state.ensure_capacity(NUM_GROUPS);
    for page in PageReader::new(writer.flush()) {
        let block = serde.deserialize(&page?, &logical_types)?;
        let (groups, colors) = (&block.arrays()[0], &block.arrays()[1]);
        for (position, group) in groups.iter().enumerate() {
            if let Some(ElementImplRef::Int64(group)) = group {
                state.set_group_id(group as GroupId);
                state.get().add(colors, position)?;
            }
        }
    }
    tracing::info!("Histogram state retains {} bytes", state.estimated_size());

    // Spill the first group and merge it into the last one
    let spiller = HistogramSpiller::with_exec_args(&args);
    let spilled = spiller.spill(&state, 0)?;
    state.set_group_id(NUM_GROUPS as GroupId - 1);
    spiller.restore(&mut state, &spilled)?;

    let mut functions = ArraySetFunctions::with_exec_args(&args);
    let mut seen: Option<ArrayImpl> = None;
    for group_id in 0..NUM_GROUPS as GroupId {
        let histogram = state.serialize(group_id)?;
        println!("group {group_id}\n{histogram}");
        let colors = &histogram.arrays()[0];
        seen = Some(match seen {
            Some(seen) => functions.union(LogicalType::VarChar, &seen, colors)?,
            None => functions.distinct(LogicalType::VarChar, colors)?,
        });
    }
    if let Some(seen) = seen {
        println!("{}", DataBlock::try_new(vec![seen])?);
    }
    Ok(())
}
