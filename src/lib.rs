//! # groupsum: work-group summation with host validation
//!
//! Sums a large `f32` vector the way a GPU does it, split into fixed-size
//! work-groups that are reduced in parallel, then checks the result
//! against host references with different rounding behaviour.
//!
//! ## Overview
//!
//! - Compensated (Kahan) and naive accumulation behind one [`Accumulator`] trait
//! - Sequential and grouped host references ([`ReferenceSet`])
//! - A [`ComputeBackend`] abstraction with a host emulator and, behind the
//!   `opencl` feature, an OpenCL backend
//! - A [`ValidationReport`] putting the device sum next to every reference
//!
//! ## Usage
//!
//! ```
//! use groupsum::{run_reduction_pipeline, HostBackend, InputVector};
//!
//! let mut backend = HostBackend::new();
//! let input = InputVector::uniform(1 << 16, 10);
//!
//! let outcome = run_reduction_pipeline(&mut backend, &input, 256).unwrap();
//! let report = outcome.report().unwrap();
//! assert!(report.agrees_with_kahan_grouped(1e-3));
//! ```
//!
//! Configuration errors (a group size that does not divide the input, or
//! that the device cannot run) come back as `Err`. Any later device failure
//! leaves the host references intact and is reported in the outcome.

pub mod accumulator;
pub mod config;
pub mod device;
pub mod error;
pub mod input;
pub mod orchestrator;
pub mod pipeline;
pub mod reference;
pub mod validation;

// Re-export primary components
pub use accumulator::{sum_slice, Accumulator, Compensation, KahanState, NaiveState};
pub use config::{BackendKind, DevicePreference, GroupLayout, PipelineConfig};
pub use device::host::HostBackend;
pub use device::{ComputeBackend, DeviceInfo, DeviceKind, PendingReduction};
pub use error::{ErrorKind, ReductionError, Result};
pub use input::InputVector;
pub use orchestrator::{reduce_on_device, DeviceReduction};
pub use pipeline::{run_reduction_pipeline, PipelineOutcome};
pub use reference::{PartialSums, ReferenceSet};
pub use validation::{Discrepancy, ValidationReport};

#[cfg(feature = "opencl")]
pub use device::opencl::OpenClBackend;

/// Version information for the groupsum library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
