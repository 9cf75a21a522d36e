//! Unit handling for the interpreter and settings layers.
//!
//! All internal geometry is millimeters; feedrates are carried as mm/min in
//! modal state and resolved to mm/s when a motion primitive is built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Millimeters per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Active programming units, selected by G21 (mm) / G20 (inch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Millimeters (G21). The default.
    Mm,
    /// Inches (G20).
    Inch,
}

impl Units {
    /// Scale factor converting a value in these units to millimeters.
    pub fn scale_to_mm(&self) -> f64 {
        match self {
            Units::Mm => 1.0,
            Units::Inch => MM_PER_INCH,
        }
    }

    /// Convert a value between unit systems.
    pub fn convert(value: f64, from: Units, to: Units) -> f64 {
        if from == to {
            return value;
        }
        match (from, to) {
            (Units::Mm, Units::Inch) => value / MM_PER_INCH,
            (Units::Inch, Units::Mm) => value * MM_PER_INCH,
            _ => value,
        }
    }
}

impl Default for Units {
    fn default() -> Self {
        Units::Mm
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Units::Mm => write!(f, "mm"),
            Units::Inch => write!(f, "in"),
        }
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mm" | "metric" => Ok(Units::Mm),
            "inch" | "in" | "imperial" => Ok(Units::Inch),
            _ => Err(format!("Unknown unit system: {}", s)),
        }
    }
}

/// Convert a feedrate in units/min (modal convention) to mm/s.
pub fn feed_to_mm_s(feed_units_min: f64, units: Units) -> f64 {
    feed_units_min * units.scale_to_mm() / 60.0
}
