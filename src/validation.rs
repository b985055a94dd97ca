//! Comparison of device output against host references
//!
//! Puts the device-derived sum next to the four host references and
//! reports how far apart they are. No verdict is reached here; acceptance
//! policy belongs to the caller (see [`ValidationReport::agrees_with_kahan_grouped`]
//! for the common one).

use std::fmt;

use serde::Serialize;

use crate::reference::ReferenceSet;

/// Absolute and relative distance between two sums
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Discrepancy {
    /// `|value - reference|`
    pub absolute: f64,
    /// `absolute / |reference|`; `0` when both are zero, infinite when only
    /// the reference is. NaN in either input propagates to both fields.
    pub relative: f64,
}

impl Discrepancy {
    /// Distance of `value` from `reference`, computed in `f64`
    pub fn between(value: f32, reference: f32) -> Self {
        let absolute = (value as f64 - reference as f64).abs();
        let scale = (reference as f64).abs();
        let relative = if absolute.is_nan() || scale.is_nan() {
            f64::NAN
        } else if scale > 0.0 {
            absolute / scale
        } else if absolute == 0.0 {
            0.0
        } else {
            f64::INFINITY
        };
        Self { absolute, relative }
    }
}

/// One named comparison in a report
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Comparison {
    pub label: &'static str,
    pub value: f32,
    pub reference: f32,
    pub discrepancy: Discrepancy,
}

impl Comparison {
    fn new(label: &'static str, value: f32, reference: f32) -> Self {
        Self {
            label,
            value,
            reference,
            discrepancy: Discrepancy::between(value, reference),
        }
    }
}

/// The five sums of a pipeline run and how they relate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub references: ReferenceSet,
    pub device_sum: f32,
    /// Device sum against each reference, then the two reduction-order
    /// comparisons between host references
    pub comparisons: Vec<Comparison>,
}

impl ValidationReport {
    /// Compare `device_sum` against every reference
    pub fn new(references: ReferenceSet, device_sum: f32) -> Self {
        let mut comparisons: Vec<Comparison> = references
            .labelled()
            .iter()
            .map(|&(label, reference)| Comparison::new(label, device_sum, reference))
            .collect();

        // Host-only pairs: grouping effect with and without compensation.
        comparisons.push(Comparison::new(
            "grouped vs sequential",
            references.plain_grouped,
            references.plain_sequential,
        ));
        comparisons.push(Comparison::new(
            "grouped vs sequential, kahan",
            references.kahan_grouped,
            references.kahan_sequential,
        ));

        Self {
            references,
            device_sum,
            comparisons,
        }
    }

    /// Device sum against the grouped Kahan reference, the apples-to-apples
    /// baseline for the device
    pub fn device_vs_kahan_grouped(&self) -> Discrepancy {
        Discrepancy::between(self.device_sum, self.references.kahan_grouped)
    }

    /// Whether the device sum is within `relative_tolerance` of the grouped
    /// Kahan reference
    pub fn agrees_with_kahan_grouped(&self, relative_tolerance: f64) -> bool {
        self.device_vs_kahan_grouped().relative <= relative_tolerance
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, value) in self.references.labelled() {
            writeln!(f, "Sum of all numbers ({}) = {:.6}", label, value)?;
        }
        writeln!(
            f,
            "Sum of all numbers (device, reduced on host) = {:.6}",
            self.device_sum
        )?;
        writeln!(f)?;
        writeln!(f, "{:<32} {:>14} {:>14}", "comparison", "absolute", "relative")?;
        for c in &self.comparisons {
            let label = if c.label.starts_with("host") {
                format!("device vs {}", c.label)
            } else {
                c.label.to_string()
            };
            writeln!(
                f,
                "{:<32} {:>14.6} {:>14.3e}",
                label, c.discrepancy.absolute, c.discrepancy.relative
            )?;
        }
        Ok(())
    }
}
