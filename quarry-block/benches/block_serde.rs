//! Throughput of serializing and deserializing data blocks

#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use quarry_block::array::ArrayBuilderImpl;
use quarry_block::block::{DataBlock, DataBlockBuilder, DataBlockBuilderConfig};
use quarry_block::serde::{PagesSerde, SerdeConfig};
use quarry_block::types::LogicalType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const LOGICAL_TYPES: [LogicalType; 3] = [
    LogicalType::BigInt,
    LogicalType::Double,
    LogicalType::VarChar,
];

fn create_block(rows: usize, null_density: f64, seed: u64) -> DataBlock {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut builder = DataBlockBuilder::new(
        LOGICAL_TYPES.to_vec(),
        DataBlockBuilderConfig::default().with_expected_entries(rows),
    );
    let write = |builder: &mut ArrayBuilderImpl, rng: &mut StdRng, index: usize| {
        if rng.gen_bool(null_density) {
            builder.append_null();
            return;
        }
        match index {
            0 => builder.write_long(rng.gen_range(0..1024)),
            1 => builder.write_double(rng.r#gen()),
            _ => builder.write_bytes(format!("value-{}", rng.gen_range(0..64)).as_bytes()),
        }
        .unwrap();
    };
    for _ in 0..rows {
        for index in 0..LOGICAL_TYPES.len() {
            write(builder.array_builder_mut(index), &mut rng, index);
        }
        builder.declare_position();
    }
    builder.build().unwrap()
}

fn bench_block_serde(c: &mut Criterion) {
    let mut group = c.benchmark_group("BlockSerde");
    for compression in [false, true] {
        let serde = PagesSerde::new(SerdeConfig::default().with_compression(compression));
        (10..=14).step_by(2).for_each(|log2_size| {
            let rows = 2_usize.pow(log2_size);
            let block = create_block(rows, 0.1, 42);
            let page = serde.serialize(&block).unwrap();
            group.throughput(Throughput::Bytes(page.uncompressed_size() as u64));

            group.bench_function(
                BenchmarkId::new(format!("serialize/compression={compression}"), rows),
                |b| b.iter(|| serde.serialize(black_box(&block)).unwrap()),
            );
            group.bench_function(
                BenchmarkId::new(format!("deserialize/compression={compression}"), rows),
                |b| {
                    b.iter(|| {
                        serde
                            .deserialize(black_box(&page), &LOGICAL_TYPES)
                            .unwrap()
                    })
                },
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_block_serde);
criterion_main!(benches);
