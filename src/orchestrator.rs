//! Runs the work-group reduction on a compute backend
//!
//! Drives a [`ComputeBackend`] through one reduction: layout check,
//! kernel build, a single dispatch over the whole input, the blocking
//! wait, and the host-side combination of the per-group results.

use serde::Serialize;
use tracing::debug;

use crate::accumulator::Compensation;
use crate::config::GroupLayout;
use crate::device::{ComputeBackend, PendingReduction, REDUCTION_KERNEL_ENTRY, REDUCTION_KERNEL_SOURCE};
use crate::error::Result;
use crate::input::InputVector;
use crate::reference::PartialSums;

/// Result of a completed device reduction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceReduction {
    /// One value per work-group, as read back from the device
    pub partial_sums: PartialSums,
    /// Naive host-side sum of `partial_sums`
    pub device_sum: f32,
}

/// Reduce `input` on the backend's device
///
/// # Errors
///
/// - `Configuration` if the device cannot run `layout` (checked before any
///   device work) or `layout` does not match the input length.
/// - `Compilation` if the kernel fails to build.
/// - `Dispatch` / `Transfer` if the runtime reports a failure, or the
///   device returns the wrong number of partial sums.
///
/// No device sum is produced on error.
pub fn reduce_on_device<B>(
    backend: &mut B,
    input: &InputVector,
    layout: &GroupLayout,
) -> Result<DeviceReduction>
where
    B: ComputeBackend,
{
    backend.device().check_layout(layout)?;

    debug!(backend = backend.name(), "building reduction kernel");
    backend.compile(REDUCTION_KERNEL_SOURCE, REDUCTION_KERNEL_ENTRY)?;

    let pending = backend.dispatch(input, layout)?;
    debug!(groups = layout.group_count(), "dispatched, waiting for completion");
    let partial_sums = pending.wait()?.expect_groups(layout)?;

    let device_sum = partial_sums.combine(Compensation::Plain);
    Ok(DeviceReduction {
        partial_sums,
        device_sum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::host::HostBackend;
    use crate::device::DeviceInfo;
    use crate::error::ErrorKind;
    use crate::reference::{group_partial_sums, plain_grouped};

    #[test]
    fn test_constant_input_on_host_backend() {
        let mut backend = HostBackend::new();
        let input = InputVector::constant(1 << 16, 1.0);
        let layout = GroupLayout::new(1 << 16, 256).unwrap();

        let result = reduce_on_device(&mut backend, &input, &layout).unwrap();
        assert_eq!(result.partial_sums.len(), 256);
        assert!(result.partial_sums.as_slice().iter().all(|&s| s == 256.0));
        assert_eq!(result.device_sum, 65_536.0);
    }

    #[test]
    fn test_device_partials_close_to_host_simulation() {
        let mut backend = HostBackend::new();
        let input = InputVector::uniform(1 << 16, 10);
        let layout = GroupLayout::new(1 << 16, 256).unwrap();

        let device = reduce_on_device(&mut backend, &input, &layout).unwrap();
        let host = group_partial_sums(&input, &layout, Compensation::Plain).unwrap();

        for (d, h) in device.partial_sums.as_slice().iter().zip(host.as_slice()) {
            assert!((d - h).abs() <= h.abs() * 1e-5, "device {} vs host {}", d, h);
        }
        let reference = plain_grouped(&input, &layout).unwrap();
        assert!((device.device_sum - reference).abs() <= reference * 1e-5);
    }

    #[test]
    fn test_oversized_group_is_a_configuration_error() {
        let mut small = DeviceInfo::host_emulator();
        small.max_work_group_size = 64;
        let mut backend = HostBackend::with_device(small);

        let input = InputVector::constant(1024, 1.0);
        let layout = GroupLayout::new(1024, 128).unwrap();

        let err = reduce_on_device(&mut backend, &input, &layout).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!backend.is_compiled());
    }
}
