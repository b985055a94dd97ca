//! OpenCL compute backend
//!
//! Enumerates every platform's devices, picks one according to
//! [`DevicePreference`], builds the reduction kernel and runs it with one
//! work-group per input group.
//!
//! ```text
//! ┌──────────────┐  write   ┌──────────────────┐  read   ┌──────────────┐
//! │  Host input  │────────▶│  sum kernel      │───────▶│ partial sums │
//! │  N floats    │          │  N/G work-groups │  wait   │ G per group  │
//! └──────────────┘          └──────────────────┘         └──────────────┘
//! ```
//!
//! Every runtime status is checked. Enumeration, kernel creation and
//! enqueue failures become [`ReductionError::Dispatch`], buffer failures
//! [`ReductionError::Transfer`], and a failed build
//! [`ReductionError::Compilation`] with the runtime's build log.
//!
//! This module is only available when compiled with the `opencl` feature:
//! ```bash
//! cargo build --features opencl
//! ```

#![cfg(feature = "opencl")]

use std::marker::PhantomData;
use std::ptr;

use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::device::{
    Device, CL_DEVICE_TYPE_ACCELERATOR, CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_CPU,
    CL_DEVICE_TYPE_GPU,
};
use opencl3::error_codes::{ClError, CL_DEVICE_NOT_FOUND};
use opencl3::event::Event;
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::memory::{Buffer, CL_MEM_READ_ONLY, CL_MEM_WRITE_ONLY};
use opencl3::platform::get_platforms;
use opencl3::program::Program;
use opencl3::types::{cl_device_id, cl_device_type, cl_float, CL_BLOCKING};
use tracing::{debug, info};

use super::{select_device, ComputeBackend, DeviceInfo, DeviceKind, PendingReduction};
use crate::config::{DevicePreference, GroupLayout};
use crate::error::{ReductionError, Result};
use crate::input::InputVector;
use crate::reference::grouped::check_layout_matches;
use crate::reference::PartialSums;

fn dispatch_failure(stage: &'static str) -> impl Fn(ClError) -> ReductionError {
    move |err| ReductionError::Dispatch {
        stage,
        status: Some(err.0),
    }
}

fn transfer_failure(stage: &'static str) -> impl Fn(ClError) -> ReductionError {
    move |err| ReductionError::Transfer {
        stage,
        status: Some(err.0),
    }
}

fn device_kind(device_type: cl_device_type) -> DeviceKind {
    if device_type & CL_DEVICE_TYPE_GPU != 0 {
        DeviceKind::Gpu
    } else if device_type & CL_DEVICE_TYPE_CPU != 0 {
        DeviceKind::Cpu
    } else if device_type & CL_DEVICE_TYPE_ACCELERATOR != 0 {
        DeviceKind::Accelerator
    } else {
        DeviceKind::Other
    }
}

fn describe(device: &Device) -> Result<DeviceInfo> {
    let query = dispatch_failure("query device info");
    Ok(DeviceInfo {
        name: device.name().map_err(&query)?.trim().to_string(),
        vendor: device.vendor().map_err(&query)?.trim().to_string(),
        kind: device_kind(device.dev_type().map_err(&query)?),
        compute_units: device.max_compute_units().map_err(&query)?,
        global_mem_size: device.global_mem_size().map_err(&query)?,
        local_mem_size: device.local_mem_size().map_err(&query)?,
        max_work_group_size: device.max_work_group_size().map_err(&query)?,
        max_work_item_dimensions: device.max_work_item_dimensions().map_err(&query)?,
        max_work_item_sizes: device.max_work_item_sizes().map_err(&query)?,
    })
}

/// Every device on every platform, in platform order
///
/// A platform without devices is skipped rather than treated as an error.
fn discover() -> Result<Vec<(cl_device_id, DeviceInfo)>> {
    let platforms = get_platforms().map_err(dispatch_failure("enumerate platforms"))?;

    let mut found = Vec::new();
    for platform in platforms {
        let ids = match platform.get_devices(CL_DEVICE_TYPE_ALL) {
            Ok(ids) => ids,
            Err(err) if err.0 == CL_DEVICE_NOT_FOUND => continue,
            Err(err) => return Err(dispatch_failure("enumerate devices")(err)),
        };
        for id in ids {
            let info = describe(&Device::new(id))?;
            found.push((id, info));
        }
    }
    Ok(found)
}

/// List the capabilities of every OpenCL device on this machine
pub fn probe_devices() -> Result<Vec<DeviceInfo>> {
    Ok(discover()?.into_iter().map(|(_, info)| info).collect())
}

/// OpenCL compute backend
///
/// Owns the context and command queue of the selected device. Create it
/// once and reuse it across pipeline runs.
pub struct OpenClBackend {
    _device: Device,
    info: DeviceInfo,
    context: Context,
    queue: CommandQueue,
    compiled: Option<(Program, Kernel)>,
}

impl std::fmt::Debug for OpenClBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenClBackend")
            .field("device", &self.info.name)
            .field("compiled", &self.compiled.is_some())
            .finish_non_exhaustive()
    }
}

impl OpenClBackend {
    /// Select a device by `preference` and set up its context and queue
    ///
    /// # Errors
    ///
    /// [`ReductionError::Configuration`] when no device is found,
    /// [`ReductionError::Dispatch`] when the runtime rejects a query or
    /// the context/queue creation.
    pub fn new(preference: DevicePreference) -> Result<Self> {
        let mut devices = discover()?;
        let infos: Vec<DeviceInfo> = devices.iter().map(|(_, info)| info.clone()).collect();
        let index = select_device(&infos, preference)
            .ok_or_else(|| ReductionError::config("no OpenCL device found"))?;
        let (id, info) = devices.swap_remove(index);

        let device = Device::new(id);
        let context = Context::from_device(&device).map_err(dispatch_failure("create context"))?;

        // The OpenCL 1.2 entry point, for runtimes without 2.0 support.
        #[allow(deprecated)]
        let queue = CommandQueue::create_default(&context, 0)
            .map_err(dispatch_failure("create command queue"))?;

        info!(device = %info.name, kind = %info.kind, "selected OpenCL device");
        Ok(Self {
            _device: device,
            info,
            context,
            queue,
            compiled: None,
        })
    }
}

/// Kernel in flight on an OpenCL queue
///
/// Holds the device buffers alive until the kernel has completed and the
/// partial sums have been read back.
pub struct OpenClPending<'a> {
    queue: &'a CommandQueue,
    kernel_event: Event,
    _input_buffer: Buffer<cl_float>,
    output_buffer: Buffer<cl_float>,
    group_count: usize,
    _input: PhantomData<&'a InputVector>,
}

impl PendingReduction for OpenClPending<'_> {
    fn wait(self) -> Result<PartialSums> {
        self.kernel_event
            .wait()
            .map_err(dispatch_failure("kernel execution"))?;

        let mut sums = vec![0.0 as cl_float; self.group_count];
        let read_event = unsafe {
            self.queue
                .enqueue_read_buffer(&self.output_buffer, CL_BLOCKING, 0, &mut sums, &[])
                .map_err(transfer_failure("read partial sums"))?
        };
        read_event
            .wait()
            .map_err(transfer_failure("read partial sums"))?;

        Ok(PartialSums::from_vec(sums))
    }
}

impl ComputeBackend for OpenClBackend {
    type Pending<'a> = OpenClPending<'a>;

    fn name(&self) -> &'static str {
        "opencl"
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>> {
        probe_devices()
    }

    fn device(&self) -> &DeviceInfo {
        &self.info
    }

    fn compile(&mut self, source: &str, entry_point: &str) -> Result<()> {
        self.compiled = None;

        // On failure the runtime hands back the build log as the error.
        let program = Program::create_and_build_from_source(&self.context, source, "")
            .map_err(|build_log| ReductionError::Compilation { build_log })?;

        let kernel = Kernel::create(&program, entry_point).map_err(|err| {
            ReductionError::Compilation {
                build_log: format!(
                    "kernel '{}' could not be created (status {})",
                    entry_point, err.0
                ),
            }
        })?;

        debug!(entry_point, device = %self.info.name, "OpenCL kernel built");
        self.compiled = Some((program, kernel));
        Ok(())
    }

    fn dispatch<'a>(
        &'a self,
        input: &'a InputVector,
        layout: &GroupLayout,
    ) -> Result<OpenClPending<'a>> {
        let (_, kernel) = self.compiled.as_ref().ok_or(ReductionError::Dispatch {
            stage: "bind kernel",
            status: None,
        })?;
        check_layout_matches(input, layout)?;

        let element_count = layout.element_count();
        let group_count = layout.group_count();

        let mut input_buffer = unsafe {
            Buffer::<cl_float>::create(
                &self.context,
                CL_MEM_READ_ONLY,
                element_count,
                ptr::null_mut(),
            )
            .map_err(transfer_failure("create input buffer"))?
        };
        let output_buffer = unsafe {
            Buffer::<cl_float>::create(&self.context, CL_MEM_WRITE_ONLY, group_count, ptr::null_mut())
                .map_err(transfer_failure("create output buffer"))?
        };

        let write_event = unsafe {
            self.queue
                .enqueue_write_buffer(&mut input_buffer, CL_BLOCKING, 0, input.as_slice(), &[])
                .map_err(transfer_failure("write input buffer"))?
        };
        write_event
            .wait()
            .map_err(transfer_failure("write input buffer"))?;

        let kernel_event = unsafe {
            ExecuteKernel::new(kernel)
                .set_arg(&input_buffer)
                .set_arg(&output_buffer)
                .set_arg_local_buffer(layout.scratch_bytes_per_group() as usize)
                .set_global_work_size(element_count)
                .set_local_work_size(layout.group_size())
                .enqueue_nd_range(&self.queue)
                .map_err(dispatch_failure("enqueue kernel"))?
        };
        debug!(
            global = element_count,
            local = layout.group_size(),
            groups = group_count,
            "reduction kernel enqueued"
        );

        Ok(OpenClPending {
            queue: &self.queue,
            kernel_event,
            _input_buffer: input_buffer,
            output_buffer,
            group_count,
            _input: PhantomData,
        })
    }
}
