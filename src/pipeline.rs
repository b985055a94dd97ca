//! End-to-end reduction run
//!
//! One call produces everything a run reports: the four host references,
//! the device reduction (or the reason it failed), and the validation
//! report comparing the two.

use tracing::{info, warn};

use crate::config::GroupLayout;
use crate::device::ComputeBackend;
use crate::error::{ReductionError, Result};
use crate::input::InputVector;
use crate::orchestrator::{reduce_on_device, DeviceReduction};
use crate::reference::ReferenceSet;
use crate::validation::ValidationReport;

/// Everything produced by [`run_reduction_pipeline`]
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    /// Layout the run used
    pub layout: GroupLayout,
    /// Host references, always available
    pub references: ReferenceSet,
    /// Device reduction, or the error that stopped it
    pub device: std::result::Result<DeviceReduction, ReductionError>,
}

impl PipelineOutcome {
    /// Whether the device reduction completed
    pub fn dispatch_ok(&self) -> bool {
        self.device.is_ok()
    }

    /// Host-combined sum of the device partials; `None` if the device
    /// reduction failed
    pub fn device_sum(&self) -> Option<f32> {
        self.device.as_ref().ok().map(|d| d.device_sum)
    }

    pub fn device_error(&self) -> Option<&ReductionError> {
        self.device.as_ref().err()
    }

    /// Comparison of the device sum against the references, if there is one
    pub fn report(&self) -> Option<ValidationReport> {
        self.device_sum()
            .map(|sum| ValidationReport::new(self.references, sum))
    }
}

/// Run the full pipeline over `input` with work-groups of `group_size`
///
/// # Errors
///
/// Only configuration problems are returned as `Err`: a group size that is
/// zero or does not divide the input, or one the backend's device cannot
/// run. They are detected before the backend is asked to do anything.
/// Compilation, dispatch and transfer failures are reported through
/// [`PipelineOutcome::device`] instead, next to the host references.
///
/// # Examples
///
/// ```
/// use groupsum::{run_reduction_pipeline, HostBackend, InputVector};
///
/// let mut backend = HostBackend::new();
/// let input = InputVector::constant(4096, 1.0);
/// let outcome = run_reduction_pipeline(&mut backend, &input, 256).unwrap();
///
/// assert_eq!(outcome.device_sum(), Some(4096.0));
/// assert!(outcome.report().unwrap().agrees_with_kahan_grouped(1e-6));
/// ```
pub fn run_reduction_pipeline<B>(
    backend: &mut B,
    input: &InputVector,
    group_size: usize,
) -> Result<PipelineOutcome>
where
    B: ComputeBackend,
{
    let layout = GroupLayout::new(input.len(), group_size)?;
    backend.device().check_layout(&layout)?;

    info!(
        elements = layout.element_count(),
        group_size = layout.group_size(),
        groups = layout.group_count(),
        backend = backend.name(),
        "starting reduction run"
    );

    let references = ReferenceSet::compute(input, &layout)?;

    let device = reduce_on_device(backend, input, &layout);
    match &device {
        Ok(reduction) => info!(device_sum = reduction.device_sum, "device reduction complete"),
        Err(e) => warn!(error = %e, "device reduction failed, no device sum"),
    }

    Ok(PipelineOutcome {
        layout,
        references,
        device,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::host::HostBackend;
    use crate::error::ErrorKind;

    #[test]
    fn test_non_divisible_group_size() {
        let mut backend = HostBackend::new();
        let input = InputVector::constant(1000, 1.0);

        let err = run_reduction_pipeline(&mut backend, &input, 7).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!backend.is_compiled());
    }

    #[test]
    fn test_zero_group_size() {
        let mut backend = HostBackend::new();
        let input = InputVector::constant(1024, 1.0);
        assert!(run_reduction_pipeline(&mut backend, &input, 0).is_err());
    }

    #[test]
    fn test_group_size_equal_to_input() {
        let mut backend = HostBackend::new();
        let input = InputVector::uniform(1024, 3);

        let outcome = run_reduction_pipeline(&mut backend, &input, 1024).unwrap();
        let reduction = outcome.device.as_ref().unwrap();
        assert_eq!(reduction.partial_sums.len(), 1);
        assert_eq!(outcome.references.kahan_grouped, outcome.references.kahan_sequential);
    }

    #[test]
    fn test_outcome_accessors() {
        let mut backend = HostBackend::new();
        let input = InputVector::constant(2048, 0.5);

        let outcome = run_reduction_pipeline(&mut backend, &input, 128).unwrap();
        assert!(outcome.dispatch_ok());
        assert!(outcome.device_error().is_none());
        assert_eq!(outcome.device_sum(), Some(1024.0));
        assert_eq!(outcome.report().unwrap().device_sum, 1024.0);
    }
}
