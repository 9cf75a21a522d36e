//! Software-enforced axis travel limits
//!
//! Lightweight boundary checking for motion primitives. Limits do not stop
//! motion mid-move; the controller checks each primitive's endpoints
//! immediately before handing it to the executor.

use std::collections::HashMap;

use millstream_core::data::AXIS_LETTERS;
use millstream_core::{ControlError, MachinePosition, MotionPrimitive};

/// Per-axis `(min, max)` travel bounds in machine-space millimeters.
///
/// Axes without an entry are unbounded.
#[derive(Debug, Clone, Default)]
pub struct SoftLimits {
    limits: HashMap<char, (f64, f64)>,
}

impl SoftLimits {
    /// Build a limit table from `(axis letter, (min, max))` pairs.
    pub fn new(limits: impl IntoIterator<Item = (char, (f64, f64))>) -> Self {
        Self {
            limits: limits.into_iter().collect(),
        }
    }

    /// Bounds configured for an axis, if any.
    pub fn bounds(&self, axis: char) -> Option<(f64, f64)> {
        self.limits.get(&axis).copied()
    }

    /// Check a single point against the configured bounds.
    pub fn check_point(&self, point: &MachinePosition) -> Result<(), ControlError> {
        for (i, &axis) in AXIS_LETTERS.iter().enumerate() {
            let Some((min, max)) = self.bounds(axis) else {
                continue;
            };
            let value = point.axis(i);
            if value < min || value > max {
                return Err(ControlError::SoftLimit {
                    axis,
                    value,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Check both endpoints of a primitive.
    ///
    /// Sufficient for straight-line interpolation, which is all the
    /// interpreter emits.
    pub fn check_primitive(&self, primitive: &MotionPrimitive) -> Result<(), ControlError> {
        self.check_point(&primitive.start)?;
        self.check_point(&primitive.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use millstream_core::MotionKind;

    fn table() -> SoftLimits {
        SoftLimits::new([
            ('X', (0.0, 300.0)),
            ('Y', (0.0, 300.0)),
            ('Z', (-100.0, 0.0)),
        ])
    }

    #[test]
    fn test_in_bounds_passes() {
        let limits = table();
        assert!(limits
            .check_point(&MachinePosition::new(150.0, 10.0, -50.0))
            .is_ok());
    }

    #[test]
    fn test_out_of_bounds_names_axis_and_bounds() {
        let limits = table();
        let err = limits
            .check_point(&MachinePosition::new(301.0, 0.0, 0.0))
            .unwrap_err();
        assert_eq!(
            err,
            ControlError::SoftLimit {
                axis: 'X',
                value: 301.0,
                min: 0.0,
                max: 300.0
            }
        );
    }

    #[test]
    fn test_unconfigured_axis_is_unbounded() {
        let limits = SoftLimits::new([('X', (0.0, 10.0))]);
        assert!(limits
            .check_point(&MachinePosition::new(5.0, 9999.0, -9999.0))
            .is_ok());
    }

    #[test]
    fn test_primitive_checks_both_endpoints() {
        let limits = table();
        let bad_end = MotionPrimitive::new(
            MotionKind::Linear,
            MachinePosition::new(10.0, 10.0, 0.0),
            MachinePosition::new(10.0, 310.0, 0.0),
            10.0,
        );
        assert!(limits.check_primitive(&bad_end).is_err());

        let bad_start = MotionPrimitive::new(
            MotionKind::Rapid,
            MachinePosition::new(-1.0, 0.0, 0.0),
            MachinePosition::new(5.0, 0.0, 0.0),
            50.0,
        );
        assert!(limits.check_primitive(&bad_start).is_err());
    }
}
