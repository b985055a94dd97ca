//! Host emulation of the work-group reduction kernel
//!
//! Runs the same pairwise tree the OpenCL kernel runs, one rayon task per
//! work-group, so the pipeline (and its tests) can run on machines without
//! a compute runtime. The result is bit-identical to what a conforming
//! device produces with the bundled kernel, since float addition order is
//! the same.

use std::marker::PhantomData;

use rayon::prelude::*;
use tracing::debug;

use super::{ComputeBackend, DeviceInfo, DeviceKind, PendingReduction};
use crate::config::GroupLayout;
use crate::error::{ReductionError, Result};
use crate::input::InputVector;
use crate::reference::grouped::check_layout_matches;
use crate::reference::PartialSums;

/// Work-group limit advertised by the emulated device
pub const HOST_MAX_WORK_GROUP_SIZE: usize = 1024;

/// Local memory advertised by the emulated device (64 KiB)
pub const HOST_LOCAL_MEM_SIZE: u64 = 64 * 1024;

impl DeviceInfo {
    /// Capabilities reported by [`HostBackend`] by default
    pub fn host_emulator() -> Self {
        DeviceInfo {
            name: "host emulator".to_string(),
            vendor: "groupsum".to_string(),
            kind: DeviceKind::Cpu,
            compute_units: num_cpus::get() as u32,
            // Host memory is not queried
            global_mem_size: 0,
            local_mem_size: HOST_LOCAL_MEM_SIZE,
            max_work_group_size: HOST_MAX_WORK_GROUP_SIZE,
            max_work_item_dimensions: 3,
            max_work_item_sizes: vec![HOST_MAX_WORK_GROUP_SIZE, HOST_MAX_WORK_GROUP_SIZE, 64],
        }
    }
}

/// Reduce one work-group the way the kernel does
///
/// The upper half of the active range is folded onto the lower half until
/// one value remains. Odd counts leave the middle element untouched for
/// the next round.
pub fn tree_reduce(group: &[f32]) -> f32 {
    if group.is_empty() {
        return 0.0;
    }
    let mut scratch = group.to_vec();
    let mut active = scratch.len();
    while active > 1 {
        let upper = (active + 1) / 2;
        for lid in 0..active - upper {
            scratch[lid] += scratch[lid + upper];
        }
        active = upper;
    }
    scratch[0]
}

/// Compute backend that emulates the device on the host
#[derive(Debug, Clone)]
pub struct HostBackend {
    device: DeviceInfo,
    entry_point: Option<String>,
}

impl HostBackend {
    /// Backend advertising [`DeviceInfo::host_emulator`]
    pub fn new() -> Self {
        Self::with_device(DeviceInfo::host_emulator())
    }

    /// Backend advertising custom limits, e.g. to reproduce a small device
    pub fn with_device(device: DeviceInfo) -> Self {
        Self {
            device,
            entry_point: None,
        }
    }

    /// Whether a kernel has been compiled
    pub fn is_compiled(&self) -> bool {
        self.entry_point.is_some()
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Completed host reduction awaiting `wait`
pub struct HostPending<'a> {
    sums: Vec<f32>,
    _input: PhantomData<&'a InputVector>,
}

impl PendingReduction for HostPending<'_> {
    fn wait(self) -> Result<PartialSums> {
        Ok(PartialSums::from_vec(self.sums))
    }
}

impl ComputeBackend for HostBackend {
    type Pending<'a> = HostPending<'a>;

    fn name(&self) -> &'static str {
        "host"
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(vec![self.device.clone()])
    }

    fn device(&self) -> &DeviceInfo {
        &self.device
    }

    fn compile(&mut self, source: &str, entry_point: &str) -> Result<()> {
        // No compiler here: only check that the entry point is declared.
        let signature = format!("__kernel void {}(", entry_point);
        if !source.contains(&signature) {
            self.entry_point = None;
            return Err(ReductionError::Compilation {
                build_log: format!(
                    "host emulator: no kernel named '{}' in source",
                    entry_point
                ),
            });
        }
        debug!(entry_point, "host kernel ready");
        self.entry_point = Some(entry_point.to_string());
        Ok(())
    }

    fn dispatch<'a>(
        &'a self,
        input: &'a InputVector,
        layout: &GroupLayout,
    ) -> Result<HostPending<'a>> {
        if self.entry_point.is_none() {
            return Err(ReductionError::Dispatch {
                stage: "bind kernel",
                status: None,
            });
        }
        check_layout_matches(input, layout)?;

        let sums = input
            .as_slice()
            .par_chunks_exact(layout.group_size())
            .map(tree_reduce)
            .collect();

        Ok(HostPending {
            sums,
            _input: PhantomData,
        })
    }
}
