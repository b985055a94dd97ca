use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use groupsum::{
    accumulator::{sum_slice, Compensation},
    reduce_on_device,
    reference::{group_partial_sums, ReferenceSet},
    GroupLayout, HostBackend, InputVector,
};

const SIZES: [usize; 3] = [1 << 16, 1 << 18, 1 << 20];

/// Naive vs Kahan over the whole input
fn bench_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential");

    for &n in &SIZES {
        let input = InputVector::uniform(n, 10);
        group.throughput(Throughput::Elements(n as u64));

        for compensation in Compensation::ALL {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", compensation), n),
                &input,
                |b, input| b.iter(|| sum_slice(black_box(input.as_slice()), compensation)),
            );
        }
    }
    group.finish();
}

/// Grouped host references and the emulated device across group widths
fn bench_grouped(c: &mut Criterion) {
    let mut group = c.benchmark_group("grouped");
    let n = 1 << 20;
    let input = InputVector::uniform(n, 10);
    group.throughput(Throughput::Elements(n as u64));

    for &g in &[64usize, 256, 1024] {
        let layout = GroupLayout::new(n, g).unwrap();

        group.bench_with_input(BenchmarkId::new("kahan_partials", g), &layout, |b, layout| {
            b.iter(|| group_partial_sums(black_box(&input), layout, Compensation::Kahan).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("host_device", g), &layout, |b, layout| {
            let mut backend = HostBackend::new();
            b.iter(|| reduce_on_device(&mut backend, black_box(&input), layout).unwrap())
        });
    }
    group.finish();
}

/// All four references for the demo-sized input
fn bench_reference_set(c: &mut Criterion) {
    let input = InputVector::uniform(1 << 20, 10);
    let layout = GroupLayout::new(1 << 20, 256).unwrap();

    c.bench_function("reference_set_2^20", |b| {
        b.iter(|| ReferenceSet::compute(black_box(&input), &layout).unwrap())
    });
}

criterion_group!(benches, bench_sequential, bench_grouped, bench_reference_set);
criterion_main!(benches);
