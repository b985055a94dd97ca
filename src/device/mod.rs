//! Compute-device collaborators
//!
//! The pipeline never talks to a compute runtime directly. It drives a
//! [`ComputeBackend`], which owns device selection, kernel compilation,
//! buffer transfers and dispatch. Two implementations exist:
//!
//! - [`host::HostBackend`]: runs the reduction kernel's algorithm on the
//!   host, one rayon task per work-group. Always available.
//! - `opencl::OpenClBackend`: the OpenCL runtime, behind the `opencl`
//!   feature.
//!
//! A dispatch hands back a pending handle that borrows the input. Partial
//! sums can only be obtained by consuming that handle with
//! [`PendingReduction::wait`], which blocks until the device reports
//! completion.

pub mod host;
#[cfg(feature = "opencl")]
pub mod opencl;

use std::fmt;

use serde::Serialize;

use crate::config::{DevicePreference, GroupLayout};
use crate::error::{ReductionError, Result};
use crate::input::InputVector;
use crate::reference::PartialSums;

/// OpenCL C source of the work-group reduction kernel
pub const REDUCTION_KERNEL_SOURCE: &str = include_str!("kernels/work_groups.cl");

/// Entry point of [`REDUCTION_KERNEL_SOURCE`]
pub const REDUCTION_KERNEL_ENTRY: &str = "sum";

/// Broad class of a compute device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Gpu,
    Cpu,
    Accelerator,
    Other,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeviceKind::Gpu => "GPU",
            DeviceKind::Cpu => "CPU",
            DeviceKind::Accelerator => "accelerator",
            DeviceKind::Other => "other",
        };
        f.write_str(label)
    }
}

/// Capabilities of one discovered device
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Human-readable device name
    pub name: String,
    /// Vendor string
    pub vendor: String,
    pub kind: DeviceKind,
    /// Parallel compute units
    pub compute_units: u32,
    /// Global memory in bytes, `0` when the backend does not report it
    pub global_mem_size: u64,
    /// Work-group local memory in bytes
    pub local_mem_size: u64,
    /// Largest work-group the device accepts
    pub max_work_group_size: usize,
    /// Number of work-item dimensions
    pub max_work_item_dimensions: u32,
    /// Largest work-item count per dimension
    pub max_work_item_sizes: Vec<usize>,
}

impl DeviceInfo {
    /// Number of `f32` values that fit in local memory
    pub fn floats_per_local_memory(&self) -> u64 {
        self.local_mem_size / std::mem::size_of::<f32>() as u64
    }

    /// Check that this device can run `layout` with the bundled kernel
    ///
    /// # Errors
    ///
    /// [`ReductionError::Configuration`] when the group size exceeds the
    /// device's work-group limit (or its first work-item dimension), or a
    /// group's scratch array does not fit in local memory.
    pub fn check_layout(&self, layout: &GroupLayout) -> Result<()> {
        let group_size = layout.group_size();
        if group_size > self.max_work_group_size {
            return Err(ReductionError::config(format!(
                "group size {} exceeds the max work-group size {} of '{}'",
                group_size, self.max_work_group_size, self.name
            )));
        }
        if let Some(&limit) = self.max_work_item_sizes.first() {
            if group_size > limit {
                return Err(ReductionError::config(format!(
                    "group size {} exceeds the max work-item size {} of '{}'",
                    group_size, limit, self.name
                )));
            }
        }
        let scratch = layout.scratch_bytes_per_group();
        if scratch > self.local_mem_size {
            return Err(ReductionError::config(format!(
                "work-group scratch of {} bytes exceeds the {} bytes of local memory on '{}'",
                scratch, self.local_mem_size, self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Device name: {} ({}, {})", self.name, self.kind, self.vendor)?;
        writeln!(f, "\tMax compute units: {}", self.compute_units)?;
        if self.global_mem_size == 0 {
            writeln!(f, "\tGlobal memory size: not reported")?;
        } else {
            writeln!(
                f,
                "\tGlobal memory size: {} ({} mb)",
                self.global_mem_size,
                self.global_mem_size / 1_000_000
            )?;
        }
        writeln!(
            f,
            "\tLocal memory size: {} ({} kb)",
            self.local_mem_size,
            self.local_mem_size / 1000
        )?;
        writeln!(f, "\tMax work group size: {}", self.max_work_group_size)?;
        writeln!(f, "\tMax work item dimensions: {}", self.max_work_item_dimensions)?;
        writeln!(f, "\tMax work item sizes: {:?}", self.max_work_item_sizes)?;
        write!(
            f,
            "\tFloats per local memory: {}",
            self.floats_per_local_memory()
        )
    }
}

/// Index of the device `preference` picks, or `None` if `devices` is empty
pub fn select_device(devices: &[DeviceInfo], preference: DevicePreference) -> Option<usize> {
    if devices.is_empty() {
        return None;
    }
    match preference {
        DevicePreference::First => Some(0),
        DevicePreference::PreferGpu => Some(
            devices
                .iter()
                .position(|d| d.kind == DeviceKind::Gpu)
                .unwrap_or(0),
        ),
    }
}

/// An in-flight reduction
///
/// Dropping it without waiting discards the result. The only way to get
/// the partial sums is `wait`, which blocks until the device is done.
pub trait PendingReduction {
    /// Block until the dispatch completes, then read back one value per
    /// work-group
    fn wait(self) -> Result<PartialSums>;
}

/// A compute runtime able to run the work-group reduction
pub trait ComputeBackend {
    /// Handle for a dispatch in flight. It borrows the input, so the
    /// input cannot change until the handle is consumed or dropped.
    type Pending<'a>: PendingReduction
    where
        Self: 'a;

    /// Short backend label used in logs and reports
    fn name(&self) -> &'static str;

    /// Every device this backend can see
    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// The device reductions run on
    fn device(&self) -> &DeviceInfo;

    /// Build `source` for the selected device and keep `entry_point` ready
    /// for dispatch
    ///
    /// # Errors
    ///
    /// [`ReductionError::Compilation`] carrying the build log.
    fn compile(&mut self, source: &str, entry_point: &str) -> Result<()>;

    /// Upload `input` and enqueue one reduction covering all of it:
    /// global size `layout.element_count()`, local size
    /// `layout.group_size()`
    ///
    /// # Errors
    ///
    /// [`ReductionError::Transfer`] for buffer failures,
    /// [`ReductionError::Dispatch`] when no kernel is compiled or the
    /// enqueue is rejected.
    fn dispatch<'a>(
        &'a self,
        input: &'a InputVector,
        layout: &GroupLayout,
    ) -> Result<Self::Pending<'a>>;
}
