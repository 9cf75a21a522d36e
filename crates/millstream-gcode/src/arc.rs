//! Arc geometry and chord-tolerance segmentation
//!
//! G2/G3 arcs are solved here into a center, radius, start angle and signed
//! sweep, then sized into a chord count. The interpreter walks the chords
//! and emits linear primitives; arcs never leave the G-code layer as arcs.
//!
//! Both center formats are supported: IJK offsets (center relative to the
//! start point) and the R form (center reconstructed from the chord and a
//! signed radius, where R < 0 selects the long way around).

use std::f64::consts::TAU;

use millstream_core::GcodeError;

/// Endpoints closer than this (per in-plane axis) are treated as coincident,
/// which turns an IJK arc into a full circle.
pub const COINCIDENT_EPS: f64 = 1e-9;

/// Fewest chords permitted per full turn.
pub const MIN_SEGMENTS_PER_TURN: f64 = 8.0;

/// Most chords permitted per full turn.
pub const MAX_SEGMENTS_PER_TURN: f64 = 2048.0;

/// A solved arc in its plane: polar description around the center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcGeometry {
    /// Arc center in plane coordinates.
    pub center: (f64, f64),
    /// Arc radius (distance from center to start point).
    pub radius: f64,
    /// Angle of the start point around the center.
    pub start_angle: f64,
    /// Signed sweep: positive counter-clockwise, negative clockwise.
    /// Magnitude is in (0, 2π]; a full circle sweeps exactly 2π.
    pub sweep: f64,
}

impl ArcGeometry {
    /// In-plane point at parameter `t` in [0, 1] along the arc.
    pub fn point_at(&self, t: f64) -> (f64, f64) {
        let angle = self.start_angle + self.sweep * t;
        (
            self.center.0 + self.radius * angle.cos(),
            self.center.1 + self.radius * angle.sin(),
        )
    }

    /// Arc length (radius times sweep magnitude).
    pub fn length(&self) -> f64 {
        self.radius * self.sweep.abs()
    }
}

fn hypot2(dx: f64, dy: f64) -> f64 {
    (dx * dx + dy * dy).sqrt()
}

/// Center of an IJK-form arc: offset is relative to the start point.
pub fn center_from_offsets(start: (f64, f64), offset: (f64, f64)) -> (f64, f64) {
    (start.0 + offset.0, start.1 + offset.1)
}

/// Center of an R-form arc.
///
/// Of the two circle centers compatible with the chord and |R|, the one
/// matching the commanded direction is chosen; a negative R flips the choice
/// to take the long way around. Fails when the endpoints coincide or when
/// the chord cannot be spanned by the radius (including the exact boundary
/// `chord == 2|R|`, which has no well-defined short/long distinction).
pub fn center_from_radius(
    start: (f64, f64),
    end: (f64, f64),
    r: f64,
    clockwise: bool,
    line: u32,
) -> Result<(f64, f64), GcodeError> {
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    let chord = hypot2(dx, dy);
    let r_abs = r.abs();

    if chord < COINCIDENT_EPS {
        return Err(GcodeError::ArcGeometry {
            line,
            reason: "R-form arc with identical start and end points".into(),
        });
    }
    if chord >= 2.0 * r_abs {
        return Err(GcodeError::ArcGeometry {
            line,
            reason: format!(
                "arc radius {:.3} too small for chord {:.3}",
                r_abs, chord
            ),
        });
    }

    // Distance from the chord midpoint to the center, along the
    // perpendicular bisector.
    let h = (r_abs * r_abs - (chord / 2.0) * (chord / 2.0)).sqrt();
    let mx = (start.0 + end.0) / 2.0;
    let my = (start.1 + end.1) / 2.0;
    let nx = -dy / chord;
    let ny = dx / chord;

    let c1 = (mx + nx * h, my + ny * h);
    let c2 = (mx - nx * h, my - ny * h);

    // Sign of the cross product tells the turn direction around a center.
    let is_clockwise = |c: (f64, f64)| {
        (start.0 - c.0) * (end.1 - c.1) - (start.1 - c.1) * (end.0 - c.0) < 0.0
    };

    let mut center = if clockwise == is_clockwise(c1) { c1 } else { c2 };

    // Negative R means the long arc: flip to the other center.
    if r < 0.0 {
        center = if center == c1 { c2 } else { c1 };
    }
    Ok(center)
}

/// Solve an arc from endpoints, center, and direction.
///
/// Validates that start and end lie on the same circle within
/// `max(0.002 mm, 1e-4 * radius)`; coincident endpoints become a full
/// circle when `allow_full_circle` is set (IJK form) and an error otherwise.
pub fn solve(
    start: (f64, f64),
    end: (f64, f64),
    center: (f64, f64),
    clockwise: bool,
    allow_full_circle: bool,
    line: u32,
) -> Result<ArcGeometry, GcodeError> {
    let rs = hypot2(start.0 - center.0, start.1 - center.1);
    let re = hypot2(end.0 - center.0, end.1 - center.1);

    if rs < COINCIDENT_EPS || re < COINCIDENT_EPS {
        return Err(GcodeError::ArcGeometry {
            line,
            reason: "arc radius is zero".into(),
        });
    }

    let radius_tolerance = 0.002_f64.max(1e-4 * rs);
    if (rs - re).abs() > radius_tolerance {
        return Err(GcodeError::ArcGeometry {
            line,
            reason: format!(
                "radius mismatch: {:.4} at start, {:.4} at end",
                rs, re
            ),
        });
    }

    let start_angle = (start.1 - center.1).atan2(start.0 - center.0);
    let full_circle = (start.0 - end.0).abs() < COINCIDENT_EPS
        && (start.1 - end.1).abs() < COINCIDENT_EPS;

    let sweep = if full_circle {
        if !allow_full_circle {
            return Err(GcodeError::ArcGeometry {
                line,
                reason: "arc start and end points are identical".into(),
            });
        }
        if clockwise {
            -TAU
        } else {
            TAU
        }
    } else {
        let end_angle = (end.1 - center.1).atan2(end.0 - center.0);
        let mut sweep = end_angle - start_angle;
        if clockwise && sweep > 0.0 {
            sweep -= TAU;
        } else if !clockwise && sweep < 0.0 {
            sweep += TAU;
        }
        if sweep.abs() < 1e-12 {
            return Err(GcodeError::ArcGeometry {
                line,
                reason: "degenerate sweep between distinct endpoints".into(),
            });
        }
        sweep
    };

    Ok(ArcGeometry {
        center,
        radius: rs,
        start_angle,
        sweep,
    })
}

/// Number of chords to emit for an arc.
///
/// The chord-error criterion picks a step angle whose chord deviates from
/// the true arc by at most `tolerance`, clamped to produce between
/// [`MIN_SEGMENTS_PER_TURN`] and [`MAX_SEGMENTS_PER_TURN`] chords per full
/// turn. The `max_segment_time` bound is applied on top, sizing chords as
/// if each were traversed at `feed_mm_s`; whichever demands more chords
/// wins.
pub fn segment_count(
    radius: f64,
    sweep_abs: f64,
    tolerance: f64,
    feed_mm_s: f64,
    max_segment_time: f64,
) -> usize {
    // Deviation of a chord spanning step angle θ is r·(1 - cos(θ/2)).
    let ratio = (1.0 - tolerance / radius).clamp(-1.0, 1.0);
    let step = (2.0 * ratio.acos()).clamp(
        TAU / MAX_SEGMENTS_PER_TURN,
        TAU / MIN_SEGMENTS_PER_TURN,
    );
    let by_tolerance = (sweep_abs / step).ceil() as usize;

    let by_time = if feed_mm_s > 0.0 && max_segment_time > 0.0 {
        let arc_length = radius * sweep_abs;
        (arc_length / (feed_mm_s * max_segment_time)).ceil() as usize
    } else {
        1
    };

    by_tolerance.max(by_time).max(1)
}
