//! The G-code interpreter
//!
//! Turns parsed lines into fully-resolved motion primitives, mutating the
//! modal state it owns. Interpretation is deterministic: the same modal
//! state and the same parsed line always produce identical output.
//!
//! Within one line, modal updates are applied in a fixed order before any
//! motion is computed: units (G20/G21), plane (G17/G18/G19), distance mode
//! (G90/G91), work coordinate system (G54..G59), feedrate (F), then the
//! motion mode. G words are dispatched through an explicit modal-group
//! table; two G words from the same group on one line is an error.

use std::fmt;

use millstream_core::{GcodeError, MachinePosition, MotionKind, MotionPrimitive, Units};

use crate::arc;
use crate::modal::{DistanceMode, ModalState, MotionMode, Plane};
use crate::parser::ParsedLine;

/// Modal groups of the supported G words.
///
/// One word per group per line; the groups are applied in the order they
/// are declared here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModalGroup {
    Units,
    Plane,
    Distance,
    Wcs,
    Motion,
}

impl fmt::Display for ModalGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModalGroup::Units => write!(f, "units"),
            ModalGroup::Plane => write!(f, "plane"),
            ModalGroup::Distance => write!(f, "distance"),
            ModalGroup::Wcs => write!(f, "work coordinate"),
            ModalGroup::Motion => write!(f, "motion"),
        }
    }
}

/// Dispatch table: G number to modal group. `None` means unsupported.
fn modal_group(g: u16) -> Option<ModalGroup> {
    match g {
        0..=3 => Some(ModalGroup::Motion),
        17..=19 => Some(ModalGroup::Plane),
        20 | 21 => Some(ModalGroup::Units),
        54..=59 => Some(ModalGroup::Wcs),
        90 | 91 => Some(ModalGroup::Distance),
        _ => None,
    }
}

/// Parameter letters the interpreter consumes for geometry and feed.
const GEOMETRY_PARAMS: [char; 8] = ['X', 'Y', 'Z', 'I', 'J', 'K', 'R', 'F'];

/// Render a word number the way it was written (G2, G38.2, M5).
fn word_name(letter: char, value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}{}", letter, value as i64)
    } else {
        format!("{}{}", letter, value)
    }
}

/// One-line modal update slots, collected before any state is mutated.
#[derive(Default)]
struct LineModals {
    units: Option<u16>,
    plane: Option<u16>,
    distance: Option<u16>,
    wcs: Option<u16>,
    motion: Option<u16>,
}

impl LineModals {
    fn slot(&mut self, group: ModalGroup) -> &mut Option<u16> {
        match group {
            ModalGroup::Units => &mut self.units,
            ModalGroup::Plane => &mut self.plane,
            ModalGroup::Distance => &mut self.distance,
            ModalGroup::Wcs => &mut self.wcs,
            ModalGroup::Motion => &mut self.motion,
        }
    }
}

/// Interprets parsed G-code lines against owned modal state.
#[derive(Debug)]
pub struct Interpreter {
    state: ModalState,
    rapid_feedrate_mm_min: f64,
    strict: bool,
}

impl Interpreter {
    /// Create an interpreter owning `state`.
    ///
    /// `rapid_feedrate_mm_min` is the machine's rapid traverse rate; rapids
    /// are segmented and reported at this feedrate. It participates in
    /// segmentation, so prescan and runtime must agree on it.
    pub fn new(state: ModalState, rapid_feedrate_mm_min: f64) -> Self {
        Self {
            state,
            rapid_feedrate_mm_min,
            strict: false,
        }
    }

    /// Enable or disable strict mode. In strict mode unsupported G/M words
    /// fail interpretation instead of being logged and skipped.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Read-only view of the modal state.
    pub fn state(&self) -> &ModalState {
        &self.state
    }

    /// Interpret one parsed line, emitting zero or more motion primitives.
    pub fn interpret(
        &mut self,
        parsed: &ParsedLine,
    ) -> Result<Vec<MotionPrimitive>, GcodeError> {
        let line = parsed.line_number;

        let modals = self.collect_modals(parsed)?;
        self.warn_unused_params(parsed);

        // Apply modal updates in dispatch order, motion last.
        if let Some(g) = modals.units {
            self.state.units = if g == 20 { Units::Inch } else { Units::Mm };
        }
        if let Some(g) = modals.plane {
            self.state.plane = match g {
                17 => Plane::Xy,
                18 => Plane::Xz,
                _ => Plane::Yz,
            };
        }
        if let Some(g) = modals.distance {
            self.state.distance_mode = if g == 90 {
                DistanceMode::Absolute
            } else {
                DistanceMode::Incremental
            };
        }
        if let Some(g) = modals.wcs {
            self.state.wcs_index = (g - 54) as usize;
        }
        if let Some(f) = parsed.param('F') {
            if f <= 0.0 {
                return Err(GcodeError::ModalConflict {
                    line,
                    reason: format!("feedrate must be positive, got F{}", f),
                });
            }
            self.state.update_feedrate(f);
        }
        if let Some(g) = modals.motion {
            self.state.motion_mode = Some(match g {
                0 => MotionMode::Rapid,
                1 => MotionMode::Linear,
                2 => MotionMode::ArcCw,
                _ => MotionMode::ArcCcw,
            });
        }

        // A line emits motion when it names an axis, or when an active arc
        // mode is given a center (the full-circle form needs no axis words).
        let has_axis = parsed.has_any_param(&['X', 'Y', 'Z']);
        let is_arc = matches!(
            self.state.motion_mode,
            Some(MotionMode::ArcCw) | Some(MotionMode::ArcCcw)
        );
        let has_center = parsed.has_any_param(&['I', 'J', 'K', 'R']);
        if !has_axis && !(is_arc && has_center) {
            return Ok(Vec::new());
        }

        let motion = self
            .state
            .motion_mode
            .ok_or_else(|| GcodeError::ModalConflict {
                line,
                reason: "axis words with no motion mode active".into(),
            })?;

        let start = self.state.position;
        let end = self.state.resolve_target(&parsed.params);

        let primitives = match motion {
            MotionMode::Rapid => {
                let feed_mm_s = self.rapid_feedrate_mm_min / 60.0;
                segment_linear(
                    MotionKind::Rapid,
                    start,
                    end,
                    feed_mm_s,
                    self.state.max_segment_time,
                )
            }
            MotionMode::Linear => {
                let feed_mm_s = self.require_feedrate(line)? / 60.0;
                segment_linear(
                    MotionKind::Linear,
                    start,
                    end,
                    feed_mm_s,
                    self.state.max_segment_time,
                )
            }
            MotionMode::ArcCw => self.interpret_arc(parsed, true, start, end)?,
            MotionMode::ArcCcw => self.interpret_arc(parsed, false, start, end)?,
        };

        self.state.position = end;
        Ok(primitives)
    }

    /// Bucket the line's G words into modal groups, rejecting conflicts.
    fn collect_modals(&self, parsed: &ParsedLine) -> Result<LineModals, GcodeError> {
        let line = parsed.line_number;
        let mut modals = LineModals::default();

        for &g in &parsed.gcodes {
            let number = if g.fract() == 0.0 && (0.0..=99.0).contains(&g) {
                Some(g as u16)
            } else {
                None
            };
            match number.and_then(modal_group) {
                Some(group) => {
                    let n = g as u16;
                    let slot = modals.slot(group);
                    if let Some(prev) = *slot {
                        if prev != n {
                            return Err(GcodeError::ModalConflict {
                                line,
                                reason: format!(
                                    "G{} and G{} are both in the {} group",
                                    prev, n, group
                                ),
                            });
                        }
                    } else {
                        *slot = Some(n);
                    }
                }
                None => self.unsupported(line, word_name('G', g))?,
            }
        }
        for &m in &parsed.mcodes {
            // M words have no side effects in this pipeline; they are passed
            // over like any other unimplemented word.
            self.unsupported(line, word_name('M', m))?;
        }
        Ok(modals)
    }

    /// Parameter letters we do not consume are noted but never fatal.
    fn warn_unused_params(&self, parsed: &ParsedLine) {
        for (&letter, &value) in &parsed.params {
            if !GEOMETRY_PARAMS.contains(&letter) {
                tracing::debug!(
                    line = parsed.line_number,
                    word = %word_name(letter, value),
                    "ignoring unused parameter word"
                );
            }
        }
    }

    fn unsupported(&self, line: u32, word: String) -> Result<(), GcodeError> {
        if self.strict {
            Err(GcodeError::UnsupportedWord { line, word })
        } else {
            tracing::warn!(line, word = %word, "ignoring unsupported word");
            Ok(())
        }
    }

    fn require_feedrate(&self, line: u32) -> Result<f64, GcodeError> {
        self.state
            .feedrate_mm_min
            .ok_or(GcodeError::UnresolvedFeedrate { line: Some(line) })
    }

    /// Segment an arc move into linear primitives.
    fn interpret_arc(
        &self,
        parsed: &ParsedLine,
        clockwise: bool,
        start: MachinePosition,
        end: MachinePosition,
    ) -> Result<Vec<MotionPrimitive>, GcodeError> {
        let line = parsed.line_number;
        let state = &self.state;
        let feed_mm_s = self.require_feedrate(line)? / 60.0;

        let (ai, bi, ni) = state.plane.axis_indices();
        let start2 = (start.axis(ai), start.axis(bi));
        let end2 = (end.axis(ai), end.axis(bi));
        let scale = state.units_scale();

        let r_form = parsed.param('R').is_some();
        let center = if let Some(r) = parsed.param('R') {
            arc::center_from_radius(start2, end2, r * scale, clockwise, line)?
        } else {
            let (la, lb) = state.plane.offset_letters();
            let offset = (
                parsed.param(la).unwrap_or(0.0) * scale,
                parsed.param(lb).unwrap_or(0.0) * scale,
            );
            arc::center_from_offsets(start2, offset)
        };

        // Full circles are only meaningful in the IJK form.
        let geo = arc::solve(start2, end2, center, clockwise, !r_form, line)?;
        let n = arc::segment_count(
            geo.radius,
            geo.sweep.abs(),
            state.arc_tolerance,
            feed_mm_s,
            state.max_segment_time,
        );

        // The out-of-plane axis travels linearly in arc parameter.
        let normal_start = start.axis(ni);
        let normal_delta = end.axis(ni) - normal_start;

        let mut primitives = Vec::with_capacity(n);
        let mut prev = start;
        for i in 1..=n {
            let next = if i == n {
                // Land exactly on the commanded endpoint.
                end
            } else {
                let t = i as f64 / n as f64;
                let (a, b) = geo.point_at(t);
                let mut p = MachinePosition::default();
                p.set_axis(ai, a);
                p.set_axis(bi, b);
                p.set_axis(ni, normal_start + normal_delta * t);
                p
            };
            primitives.push(MotionPrimitive::new(
                MotionKind::Linear,
                prev,
                next,
                feed_mm_s,
            ));
            prev = next;
        }
        Ok(primitives)
    }
}

/// Segment a linear or rapid move into time-bounded primitives.
///
/// The move is split into `ceil(distance / (feed * max_segment_time))`
/// equal segments whose last endpoint is exactly the commanded end, so no
/// round-off accumulates. A commanded zero-length move emits a single
/// zero-length primitive.
pub fn segment_linear(
    kind: MotionKind,
    start: MachinePosition,
    end: MachinePosition,
    feed_mm_s: f64,
    max_segment_time: f64,
) -> Vec<MotionPrimitive> {
    let distance = start.distance_to(&end);
    if distance == 0.0 {
        return vec![MotionPrimitive::new(kind, start, end, feed_mm_s)];
    }

    let max_segment_length = feed_mm_s * max_segment_time;
    let count = if max_segment_length > 0.0 {
        ((distance / max_segment_length).ceil() as usize).max(1)
    } else {
        1
    };

    let mut primitives = Vec::with_capacity(count);
    let mut prev = start;
    for i in 1..=count {
        let next = if i == count {
            end
        } else {
            start.lerp(&end, i as f64 / count as f64)
        };
        primitives.push(MotionPrimitive::new(kind, prev, next, feed_mm_s));
        prev = next;
    }
    primitives
}
