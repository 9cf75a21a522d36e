//! Modal interpreter state
//!
//! Modal state persists across G-code lines until explicitly changed: units,
//! distance mode, arc plane, sticky motion mode, feedrate, the active work
//! coordinate system, and the current machine position. It is mutated only by
//! the interpreter that owns it; prescan and runtime each construct their own
//! instance so neither can observe the other.

use std::collections::HashMap;
use std::fmt;

use millstream_core::{MachinePosition, Units};

/// Distance mode, selected by G90 / G91.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMode {
    /// Axis words are absolute coordinates (G90). The default.
    Absolute,
    /// Axis words are offsets from the current position (G91).
    Incremental,
}

impl fmt::Display for DistanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMode::Absolute => write!(f, "absolute (G90)"),
            DistanceMode::Incremental => write!(f, "incremental (G91)"),
        }
    }
}

/// Arc plane, selected by G17 / G18 / G19.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    /// XY plane (G17). The default.
    Xy,
    /// XZ plane (G18).
    Xz,
    /// YZ plane (G19).
    Yz,
}

impl Plane {
    /// Axis storage indices as (first-in-plane, second-in-plane, normal).
    pub fn axis_indices(&self) -> (usize, usize, usize) {
        match self {
            Plane::Xy => (0, 1, 2),
            Plane::Xz => (0, 2, 1),
            Plane::Yz => (1, 2, 0),
        }
    }

    /// Center-offset parameter letters for this plane.
    pub fn offset_letters(&self) -> (char, char) {
        match self {
            Plane::Xy => ('I', 'J'),
            Plane::Xz => ('I', 'K'),
            Plane::Yz => ('J', 'K'),
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plane::Xy => write!(f, "XY (G17)"),
            Plane::Xz => write!(f, "XZ (G18)"),
            Plane::Yz => write!(f, "YZ (G19)"),
        }
    }
}

/// Active motion mode (G0 / G1 / G2 / G3). Sticky across lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionMode {
    /// Rapid traverse (G0).
    Rapid,
    /// Linear feed move (G1).
    Linear,
    /// Clockwise arc (G2).
    ArcCw,
    /// Counter-clockwise arc (G3).
    ArcCcw,
}

impl fmt::Display for MotionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionMode::Rapid => write!(f, "G0"),
            MotionMode::Linear => write!(f, "G1"),
            MotionMode::ArcCw => write!(f, "G2"),
            MotionMode::ArcCcw => write!(f, "G3"),
        }
    }
}

/// Number of work coordinate system slots (G54..G59).
pub const WCS_SLOTS: usize = 6;

/// Modal CNC state carried across lines of one interpretation session.
#[derive(Debug, Clone)]
pub struct ModalState {
    /// Active programming units (G20/G21).
    pub units: Units,
    /// Absolute vs incremental positioning (G90/G91).
    pub distance_mode: DistanceMode,
    /// Active arc plane (G17/G18/G19).
    pub plane: Plane,
    /// Sticky motion mode; unset until the first motion G word.
    pub motion_mode: Option<MotionMode>,
    /// Active feedrate in mm/min; unset until the first F word.
    pub feedrate_mm_min: Option<f64>,
    /// Current machine-space position (mm).
    pub position: MachinePosition,
    /// Active work coordinate system index (0 = G54 .. 5 = G59).
    pub wcs_index: usize,
    /// Maximum chord-to-arc deviation when segmenting arcs (mm).
    pub arc_tolerance: f64,
    /// Maximum wall-clock duration any emitted segment may represent (s).
    pub max_segment_time: f64,

    // WCS offsets are a placeholder of zeros until the feature is designed;
    // resolve_target applies them so the plumbing is already in place.
    work_offsets: [[f64; 3]; WCS_SLOTS],
}

impl ModalState {
    /// Create modal state with the given segmentation configuration.
    ///
    /// Prescan and runtime must be constructed with identical values here
    /// for their primitive streams to match.
    pub fn new(arc_tolerance: f64, max_segment_time: f64) -> Self {
        Self {
            units: Units::Mm,
            distance_mode: DistanceMode::Absolute,
            plane: Plane::Xy,
            motion_mode: None,
            feedrate_mm_min: None,
            position: MachinePosition::default(),
            wcs_index: 0,
            arc_tolerance,
            max_segment_time,
            work_offsets: [[0.0; 3]; WCS_SLOTS],
        }
    }

    /// Scale factor from active programming units to millimeters.
    pub fn units_scale(&self) -> f64 {
        self.units.scale_to_mm()
    }

    /// Update the feedrate from an F word, applying unit scaling.
    pub fn update_feedrate(&mut self, f: f64) {
        self.feedrate_mm_min = Some(f * self.units_scale());
    }

    /// Offset of the active work coordinate system (currently all zeros).
    pub fn work_offset(&self) -> [f64; 3] {
        self.work_offsets[self.wcs_index]
    }

    /// Resolve the axis words of a line into an absolute machine target.
    ///
    /// Axes not named keep their current position. In absolute mode the word
    /// value (unit-scaled) plus the active work offset is the target; in
    /// incremental mode the word value is added to the current position.
    pub fn resolve_target(&self, params: &HashMap<char, f64>) -> MachinePosition {
        let scale = self.units_scale();
        let offset = self.work_offset();
        let mut resolved = self.position;
        for (i, axis) in millstream_core::data::AXIS_LETTERS.iter().enumerate() {
            if let Some(value) = params.get(axis) {
                let value = value * scale;
                match self.distance_mode {
                    DistanceMode::Absolute => resolved.set_axis(i, value + offset[i]),
                    DistanceMode::Incremental => {
                        resolved.set_axis(i, resolved.axis(i) + value)
                    }
                }
            }
        }
        resolved
    }
}

impl Default for ModalState {
    fn default() -> Self {
        Self::new(0.01, 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = ModalState::default();
        assert_eq!(state.units, Units::Mm);
        assert_eq!(state.distance_mode, DistanceMode::Absolute);
        assert_eq!(state.plane, Plane::Xy);
        assert_eq!(state.motion_mode, None);
        assert_eq!(state.feedrate_mm_min, None);
        assert_eq!(state.wcs_index, 0);
    }

    #[test]
    fn test_feedrate_scaling() {
        let mut state = ModalState::default();
        state.update_feedrate(600.0);
        assert_eq!(state.feedrate_mm_min, Some(600.0));

        state.units = Units::Inch;
        state.update_feedrate(60.0);
        assert_eq!(state.feedrate_mm_min, Some(60.0 * 25.4));
    }

    #[test]
    fn test_resolve_target_absolute() {
        let mut state = ModalState::default();
        state.position = MachinePosition::new(1.0, 2.0, 3.0);
        let params = HashMap::from([('X', 10.0), ('Z', -4.0)]);
        let target = state.resolve_target(&params);
        assert_eq!(target, MachinePosition::new(10.0, 2.0, -4.0));
    }

    #[test]
    fn test_resolve_target_incremental() {
        let mut state = ModalState::default();
        state.distance_mode = DistanceMode::Incremental;
        state.position = MachinePosition::new(5.0, 5.0, 0.0);
        let params = HashMap::from([('X', -5.0), ('Y', 5.0)]);
        let target = state.resolve_target(&params);
        assert_eq!(target, MachinePosition::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn test_resolve_target_inch_scaling() {
        let mut state = ModalState::default();
        state.units = Units::Inch;
        let params = HashMap::from([('X', 1.0)]);
        let target = state.resolve_target(&params);
        assert_eq!(target.x, 25.4);
    }

    #[test]
    fn test_plane_indices() {
        assert_eq!(Plane::Xy.axis_indices(), (0, 1, 2));
        assert_eq!(Plane::Xz.axis_indices(), (0, 2, 1));
        assert_eq!(Plane::Yz.axis_indices(), (1, 2, 0));
        assert_eq!(Plane::Xz.offset_letters(), ('I', 'K'));
    }
}
