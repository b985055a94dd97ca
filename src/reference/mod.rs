//! Host reference sums that device output is checked against
//!
//! Four scalars are produced from one input: sequential and grouped
//! reductions, each with and without Kahan compensation. All of them are
//! pure functions of the input, computed single-threaded with no device
//! involvement.

pub mod grouped;
pub mod sequential;

use serde::Serialize;
use tracing::debug;

use crate::config::GroupLayout;
use crate::error::Result;
use crate::input::InputVector;

pub use grouped::{group_partial_sums, grouped_sum, kahan_grouped, plain_grouped, PartialSums};
pub use sequential::{kahan_sequential, plain_sequential, sequential_sum};

/// The four host references for one input
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceSet {
    /// Naive left-to-right sum
    pub plain_sequential: f32,
    /// Kahan left-to-right sum
    pub kahan_sequential: f32,
    /// Naive in-group sums, naive sum of groups
    pub plain_grouped: f32,
    /// Kahan in-group sums, Kahan sum of groups
    pub kahan_grouped: f32,
}

impl ReferenceSet {
    /// Compute all four references for `input` partitioned by `layout`
    ///
    /// # Examples
    ///
    /// ```
    /// use groupsum::{GroupLayout, InputVector, ReferenceSet};
    ///
    /// let input = InputVector::constant(1024, 2.0);
    /// let layout = GroupLayout::new(1024, 256).unwrap();
    /// let refs = ReferenceSet::compute(&input, &layout).unwrap();
    ///
    /// assert_eq!(refs.plain_sequential, 2048.0);
    /// assert_eq!(refs.kahan_grouped, 2048.0);
    /// ```
    pub fn compute(input: &InputVector, layout: &GroupLayout) -> Result<Self> {
        let references = ReferenceSet {
            plain_sequential: plain_sequential(input),
            kahan_sequential: kahan_sequential(input),
            plain_grouped: plain_grouped(input, layout)?,
            kahan_grouped: kahan_grouped(input, layout)?,
        };
        debug!(?references, "host references computed");
        Ok(references)
    }

    /// The references as `(label, value)` pairs in report order
    pub fn labelled(&self) -> [(&'static str, f32); 4] {
        [
            ("host, sequential", self.plain_sequential),
            ("host, sequential, kahan", self.kahan_sequential),
            ("host, grouped", self.plain_grouped),
            ("host, grouped, kahan", self.kahan_grouped),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_is_idempotent() {
        let input = InputVector::uniform(1 << 16, 10);
        let layout = GroupLayout::new(1 << 16, 256).unwrap();

        let first = ReferenceSet::compute(&input, &layout).unwrap();
        let second = ReferenceSet::compute(&input, &layout).unwrap();

        for ((_, a), (_, b)) in first.labelled().iter().zip(second.labelled().iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_constant_input_is_exact() {
        let n = 1 << 20;
        let input = InputVector::constant(n, 1.0);
        let layout = GroupLayout::new(n, 256).unwrap();
        let refs = ReferenceSet::compute(&input, &layout).unwrap();

        for (label, value) in refs.labelled() {
            assert_eq!(value, n as f32, "reference '{}' is not exact", label);
        }
    }
}
