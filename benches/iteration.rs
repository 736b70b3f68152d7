//! Throughput of full traversals over an in-memory volume
//!
//! Compares the synchronous and background strategies across window sizes.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use seismic_subvolume::{
    AxisRange, ExecutionMode, MemoryVolume, SubVolumeIterator, Volume, VolumeGeometry,
    WindowShape, ZUnit,
};

fn build_volume() -> Arc<dyn Volume> {
    let geometry = VolumeGeometry::new(
        AxisRange::new(1.0, 64.0, 1.0),
        AxisRange::new(1.0, 64.0, 1.0),
        AxisRange::new(0.0, 500.0, 4.0),
        ZUnit::Milliseconds,
    )
    .expect("valid geometry");
    Arc::new(MemoryVolume::from_fn("bench", geometry, |(i, j, k)| {
        ((i * 31 + j * 17 + k) % 255) as f32
    }))
}

fn bench_traversal(c: &mut Criterion) {
    let volume = build_volume();
    let positions = (volume.num_inlines() * volume.num_xlines()) as u64;

    let mut group = c.benchmark_group("iterator/full_scan");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);
    group.throughput(Throughput::Elements(positions));

    for mode in [ExecutionMode::Synchronous, ExecutionMode::Background] {
        for size in [1usize, 3, 5] {
            let id = BenchmarkId::new(format!("{:?}", mode), format!("{}x{}", size, size));
            group.bench_with_input(id, &size, |b, &size| {
                b.iter(|| {
                    let iterator = SubVolumeIterator::builder(Arc::clone(&volume))
                        .with_execution_mode(mode)
                        .with_window(WindowShape::square(size))
                        .build()
                        .expect("iterator");
                    let mut n = 0usize;
                    for sub in iterator {
                        black_box(sub.expect("sub-volume"));
                        n += 1;
                    }
                    assert_eq!(n as u64, positions);
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_traversal);
criterion_main!(benches);
