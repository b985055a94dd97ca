//! Sequential reference sums over the whole input
//!
//! A single left-to-right pass in construction order, once without and
//! once with compensation. The Kahan variant is the high-fidelity
//! baseline; the naive one shows how much error uncompensated float32
//! accumulation picks up over N terms.

use crate::accumulator::{sum_slice, Compensation};
use crate::input::InputVector;

/// Left-to-right sum of the whole input with the chosen strategy
pub fn sequential_sum(input: &InputVector, compensation: Compensation) -> f32 {
    sum_slice(input.as_slice(), compensation)
}

/// Naive left-to-right sum
pub fn plain_sequential(input: &InputVector) -> f32 {
    sequential_sum(input, Compensation::Plain)
}

/// Kahan left-to-right sum
pub fn kahan_sequential(input: &InputVector) -> f32 {
    sequential_sum(input, Compensation::Kahan)
}
