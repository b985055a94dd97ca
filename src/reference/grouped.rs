//! Host simulation of the device's two-level reduction
//!
//! The input is cut into contiguous groups of `group_size` elements. Each
//! group is reduced on its own (ascending index within the group), then the
//! per-group results are reduced in ascending group order. Running this
//! with and without compensation separates error caused by the changed
//! reduction order from error introduced by the device itself.

use serde::Serialize;

use crate::accumulator::{sum_slice, Compensation};
use crate::config::GroupLayout;
use crate::error::{ReductionError, Result};
use crate::input::InputVector;

/// One reduced value per work-group, in group order
///
/// Built once by collecting every group's result; there is no way to
/// modify an element afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialSums {
    sums: Vec<f32>,
}

impl PartialSums {
    /// Wrap per-group results produced elsewhere (e.g. read back from a
    /// device buffer)
    pub fn from_vec(sums: Vec<f32>) -> Self {
        Self { sums }
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.sums.len()
    }

    /// Whether there are no groups
    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Read-only view of the per-group values
    pub fn as_slice(&self) -> &[f32] {
        &self.sums
    }

    /// Reduce the partial sums in ascending group order
    pub fn combine(&self, compensation: Compensation) -> f32 {
        sum_slice(&self.sums, compensation)
    }

    /// Check that exactly one value per group is present
    pub fn expect_groups(self, layout: &GroupLayout) -> Result<Self> {
        if self.sums.len() != layout.group_count() {
            return Err(ReductionError::Transfer {
                stage: "read partial sums",
                status: None,
            });
        }
        Ok(self)
    }
}

/// Reduce every group of `input` on its own
///
/// # Errors
///
/// [`ReductionError::Configuration`] if `layout` was built for a different
/// element count than `input.len()`.
pub fn group_partial_sums(
    input: &InputVector,
    layout: &GroupLayout,
    compensation: Compensation,
) -> Result<PartialSums> {
    check_layout_matches(input, layout)?;
    let sums = input
        .as_slice()
        .chunks_exact(layout.group_size())
        .map(|group| sum_slice(group, compensation))
        .collect();
    Ok(PartialSums { sums })
}

/// Two-level sum with the same strategy at both levels
pub fn grouped_sum(
    input: &InputVector,
    layout: &GroupLayout,
    compensation: Compensation,
) -> Result<f32> {
    Ok(group_partial_sums(input, layout, compensation)?.combine(compensation))
}

/// Naive in-group sums, naive sum of groups
pub fn plain_grouped(input: &InputVector, layout: &GroupLayout) -> Result<f32> {
    grouped_sum(input, layout, Compensation::Plain)
}

/// Kahan in-group sums, Kahan sum of groups
pub fn kahan_grouped(input: &InputVector, layout: &GroupLayout) -> Result<f32> {
    grouped_sum(input, layout, Compensation::Kahan)
}

pub(crate) fn check_layout_matches(input: &InputVector, layout: &GroupLayout) -> Result<()> {
    if input.len() != layout.element_count() {
        return Err(ReductionError::config(format!(
            "layout covers {} elements but the input has {}",
            layout.element_count(),
            input.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::sequential::{kahan_sequential, plain_sequential};

    #[test]
    fn test_partial_sums_per_group() {
        let input = InputVector::from_values((1..=8).map(|v| v as f32).collect());
        let layout = GroupLayout::new(8, 4).unwrap();

        let partials = group_partial_sums(&input, &layout, Compensation::Plain).unwrap();
        assert_eq!(partials.as_slice(), &[10.0, 26.0]);
        assert_eq!(partials.combine(Compensation::Plain), 36.0);
    }

    #[test]
    fn test_partition_law() {
        let input = InputVector::uniform(1 << 14, 3);
        let layout = GroupLayout::new(1 << 14, 64).unwrap();

        let partials = group_partial_sums(&input, &layout, Compensation::Plain).unwrap();
        let combined = partials.combine(Compensation::Plain);
        assert_eq!(
            combined.to_bits(),
            plain_grouped(&input, &layout).unwrap().to_bits()
        );
    }

    #[test]
    fn test_single_group_collapses_to_sequential() {
        let input = InputVector::uniform(4096, 5);
        let layout = GroupLayout::new(4096, 4096).unwrap();

        assert_eq!(plain_grouped(&input, &layout).unwrap(), plain_sequential(&input));
        assert_eq!(kahan_grouped(&input, &layout).unwrap(), kahan_sequential(&input));
    }

    #[test]
    fn test_singleton_groups_collapse_to_sequential() {
        let input = InputVector::uniform(4096, 6);
        let layout = GroupLayout::new(4096, 1).unwrap();

        assert_eq!(plain_grouped(&input, &layout).unwrap(), plain_sequential(&input));
        let kahan = kahan_grouped(&input, &layout).unwrap();
        let reference = kahan_sequential(&input);
        assert!((kahan - reference).abs() <= reference.abs() * f32::EPSILON);
    }

    #[test]
    fn test_layout_must_match_input() {
        let input = InputVector::constant(100, 1.0);
        let layout = GroupLayout::new(200, 10).unwrap();
        assert!(group_partial_sums(&input, &layout, Compensation::Kahan).is_err());
    }

    #[test]
    fn test_expect_groups_rejects_short_buffers() {
        let layout = GroupLayout::new(16, 4).unwrap();
        assert!(PartialSums::from_vec(vec![0.0; 4]).expect_groups(&layout).is_ok());
        assert!(PartialSums::from_vec(vec![0.0; 3]).expect_groups(&layout).is_err());
    }
}
