//! Configuration and work-group layout for the reduction pipeline

use serde::{Deserialize, Serialize};

use crate::error::{ReductionError, Result};

/// Default number of input elements (2^20)
pub const DEFAULT_ELEMENT_COUNT: usize = 1 << 20;

/// Default work-group width
pub const DEFAULT_GROUP_SIZE: usize = 256;

/// Default seed for generated inputs
pub const DEFAULT_SEED: u64 = 10;

/// Default relative tolerance between the device sum and the grouped
/// Kahan reference. 4096 groups of 256 float32 adds leave roughly this
/// much headroom.
pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 1e-3;

/// Partition of N elements into equal contiguous work-groups
///
/// The only constructor validates the layout, so holding a `GroupLayout`
/// means `element_count == group_size * group_count` with both sizes
/// non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupLayout {
    element_count: usize,
    group_size: usize,
    group_count: usize,
}

impl GroupLayout {
    /// Validate and build a layout
    ///
    /// # Errors
    ///
    /// Returns [`ReductionError::Configuration`] when either size is zero or
    /// `element_count` is not an exact multiple of `group_size`. Nothing is
    /// truncated or padded.
    ///
    /// # Examples
    ///
    /// ```
    /// use groupsum::GroupLayout;
    ///
    /// let layout = GroupLayout::new(1 << 20, 256).unwrap();
    /// assert_eq!(layout.group_count(), 4096);
    ///
    /// assert!(GroupLayout::new(1000, 7).is_err());
    /// ```
    pub fn new(element_count: usize, group_size: usize) -> Result<Self> {
        if group_size == 0 {
            return Err(ReductionError::config("group size must be positive"));
        }
        if element_count == 0 {
            return Err(ReductionError::config("input vector is empty"));
        }
        if element_count % group_size != 0 {
            return Err(ReductionError::config(format!(
                "element count {} is not a multiple of group size {}",
                element_count, group_size
            )));
        }
        Ok(Self {
            element_count,
            group_size,
            group_count: element_count / group_size,
        })
    }

    /// Total number of elements (N)
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Elements per work-group
    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Number of work-groups (N / group size)
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// Bytes of work-group local memory one group needs for its scratch
    /// array (one `f32` per work-item)
    pub fn scratch_bytes_per_group(&self) -> u64 {
        (self.group_size * std::mem::size_of::<f32>()) as u64
    }

    /// Index range of one group within the input
    pub fn group_range(&self, group: usize) -> std::ops::Range<usize> {
        let start = group * self.group_size;
        start..start + self.group_size
    }
}

/// Which compute collaborator runs the device phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process emulation of the device kernel
    Host,
    /// OpenCL runtime (requires the `opencl` feature)
    OpenCl,
}

/// How to pick a device among the enumerated ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DevicePreference {
    /// The first GPU, falling back to the first device of any kind
    PreferGpu,
    /// The first device reported
    First,
}

/// Configuration for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Number of input elements
    pub element_count: usize,

    /// Work-group width
    pub group_size: usize,

    /// Seed for the generated input
    pub seed: u64,

    /// Compute collaborator
    pub backend: BackendKind,

    /// Device selection policy
    pub device_preference: DevicePreference,

    /// Accepted relative difference between the device sum and the
    /// grouped Kahan reference. Applied by callers, not by the pipeline.
    pub relative_tolerance: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            element_count: DEFAULT_ELEMENT_COUNT,
            group_size: DEFAULT_GROUP_SIZE,
            seed: DEFAULT_SEED,
            backend: BackendKind::Host,
            device_preference: DevicePreference::PreferGpu,
            relative_tolerance: DEFAULT_RELATIVE_TOLERANCE,
        }
    }
}

impl PipelineConfig {
    /// Validate the element count and group size of this configuration
    pub fn layout(&self) -> Result<GroupLayout> {
        GroupLayout::new(self.element_count, self.group_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_layout() {
        let layout = PipelineConfig::default().layout().unwrap();
        assert_eq!(layout.element_count(), 1_048_576);
        assert_eq!(layout.group_size(), 256);
        assert_eq!(layout.group_count(), 4096);
        assert_eq!(layout.scratch_bytes_per_group(), 1024);
    }

    #[test]
    fn test_rejects_non_dividing_group_size() {
        let err = GroupLayout::new(1000, 7).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("not a multiple"));
    }

    #[test]
    fn test_rejects_zero_sizes() {
        assert!(GroupLayout::new(1024, 0).is_err());
        assert!(GroupLayout::new(0, 256).is_err());
    }

    #[test]
    fn test_group_ranges_tile_the_input() {
        let layout = GroupLayout::new(12, 4).unwrap();
        assert_eq!(layout.group_range(0), 0..4);
        assert_eq!(layout.group_range(2), 8..12);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = PipelineConfig {
            backend: BackendKind::OpenCl,
            ..PipelineConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"backend\":\"opencl\""));
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.backend, BackendKind::OpenCl);
        assert_eq!(parsed.group_size, DEFAULT_GROUP_SIZE);
    }
}
