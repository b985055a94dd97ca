//! Host reference reducers on the demo-sized input and simple closed forms

use groupsum::accumulator::Compensation;
use groupsum::reference::{group_partial_sums, kahan_sequential, plain_grouped, plain_sequential};
use groupsum::{GroupLayout, InputVector, ReferenceSet};

#[test]
fn test_constant_inputs_sum_exactly() {
    for &(n, g, k) in &[(1024usize, 256usize, 1.0f32), (4096, 64, 0.5), (1 << 16, 1024, 2.0)] {
        let input = InputVector::constant(n, k);
        let layout = GroupLayout::new(n, g).unwrap();
        let refs = ReferenceSet::compute(&input, &layout).unwrap();

        let expected = n as f32 * k;
        for (label, value) in refs.labelled() {
            assert_eq!(value, expected, "{} for n={} g={} k={}", label, n, g, k);
        }
    }
}

#[test]
fn test_kahan_closer_on_demo_input() {
    let input = InputVector::uniform(1 << 20, 10);
    let exact: f64 = input.as_slice().iter().map(|&v| v as f64).sum();

    let plain_err = (plain_sequential(&input) as f64 - exact).abs();
    let kahan_err = (kahan_sequential(&input) as f64 - exact).abs();
    println!("plain error {:.6}, kahan error {:.6}", plain_err, kahan_err);
    assert!(kahan_err <= plain_err);
    assert!(kahan_err < 1.0);
}

#[test]
fn test_partition_law_on_demo_input() {
    let input = InputVector::uniform(1 << 20, 10);
    let layout = GroupLayout::new(1 << 20, 256).unwrap();

    let partials = group_partial_sums(&input, &layout, Compensation::Plain).unwrap();
    assert_eq!(partials.len(), 4096);

    let combined = partials.combine(Compensation::Plain);
    assert_eq!(combined.to_bits(), plain_grouped(&input, &layout).unwrap().to_bits());
}

#[test]
fn test_layout_boundaries() {
    assert!(GroupLayout::new(1000, 7).is_err());
    assert!(GroupLayout::new(0, 256).is_err());
    assert!(GroupLayout::new(256, 0).is_err());

    let whole = GroupLayout::new(256, 256).unwrap();
    assert_eq!(whole.group_count(), 1);

    let singletons = GroupLayout::new(256, 1).unwrap();
    assert_eq!(singletons.group_count(), 256);
}
