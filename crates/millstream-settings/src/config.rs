//! Pipeline configuration sections and file persistence
//!
//! The same settings must reach both the prescan and the runtime session;
//! loading them from one place is what keeps the two deterministic with
//! respect to each other.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SettingsError;

/// Interpreter and segmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterSettings {
    /// Maximum chord-to-arc deviation when segmenting arcs (mm).
    pub arc_tolerance_mm: f64,
    /// Maximum wall-clock duration any emitted segment may represent (s).
    pub max_segment_time_s: f64,
    /// Rapid traverse rate carried by G0 primitives (mm/min).
    pub rapid_feedrate_mm_min: f64,
    /// Fail on unsupported G/M words instead of skipping them.
    pub strict: bool,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            arc_tolerance_mm: 0.01,
            max_segment_time_s: 0.5,
            rapid_feedrate_mm_min: 3000.0,
            strict: false,
        }
    }
}

/// Controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Upper bound of the ready queue.
    pub lookahead_primitives: usize,
    /// Stop filling while the executor has more than this queued (s).
    pub queue_high_watermark_s: f64,
    /// Distance between progress events (mm).
    pub progress_increment_mm: f64,
    /// Whether rapids are checked against soft limits.
    pub check_rapid_soft_limits: bool,
    /// Fill-phase budget per pump tick.
    pub pump_max_lines: usize,
    /// Step-phase budget per pump tick.
    pub pump_max_steps: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            lookahead_primitives: 64,
            queue_high_watermark_s: 0.5,
            progress_increment_mm: 1.0,
            check_rapid_soft_limits: true,
            pump_max_lines: 16,
            pump_max_steps: 8,
        }
    }
}

/// Inclusive travel range of one axis (mm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    /// Lower bound (mm).
    pub min: f64,
    /// Upper bound (mm).
    pub max: f64,
}

/// Machine travel settings. Axes without a range are unbounded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    /// X-axis soft limit range.
    pub x_limits: Option<AxisRange>,
    /// Y-axis soft limit range.
    pub y_limits: Option<AxisRange>,
    /// Z-axis soft limit range.
    pub z_limits: Option<AxisRange>,
}

impl MachineSettings {
    /// Configured limits as `(axis letter, (min, max))` pairs.
    pub fn axis_limits(&self) -> Vec<(char, (f64, f64))> {
        [
            ('X', self.x_limits),
            ('Y', self.y_limits),
            ('Z', self.z_limits),
        ]
        .into_iter()
        .filter_map(|(axis, range)| range.map(|r| (axis, (r.min, r.max))))
        .collect()
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Interpreter and segmentation settings.
    pub interpreter: InterpreterSettings,
    /// Controller settings.
    pub controller: ControllerSettings,
    /// Machine travel settings.
    pub machine: MachineSettings,
}

impl Settings {
    /// Load settings from a `.json` or `.toml` file and validate them.
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => {
                return Err(SettingsError::UnsupportedFormat(
                    path.display().to_string(),
                ))
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate and save settings to a `.json` or `.toml` file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        self.validate()?;
        let content = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self)?,
            _ => {
                return Err(SettingsError::UnsupportedFormat(
                    path.display().to_string(),
                ))
            }
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check all sections for out-of-range values.
    pub fn validate(&self) -> Result<(), SettingsError> {
        fn positive(key: &str, value: f64) -> Result<(), SettingsError> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(SettingsError::InvalidSetting {
                    key: key.to_string(),
                    reason: format!("must be positive, got {}", value),
                })
            }
        }

        positive("interpreter.arc_tolerance_mm", self.interpreter.arc_tolerance_mm)?;
        positive(
            "interpreter.max_segment_time_s",
            self.interpreter.max_segment_time_s,
        )?;
        positive(
            "interpreter.rapid_feedrate_mm_min",
            self.interpreter.rapid_feedrate_mm_min,
        )?;

        if self.controller.lookahead_primitives == 0 {
            return Err(SettingsError::InvalidSetting {
                key: "controller.lookahead_primitives".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.controller.queue_high_watermark_s < 0.0 {
            return Err(SettingsError::InvalidSetting {
                key: "controller.queue_high_watermark_s".into(),
                reason: "must not be negative".into(),
            });
        }
        positive(
            "controller.progress_increment_mm",
            self.controller.progress_increment_mm,
        )?;
        if self.controller.pump_max_lines == 0 || self.controller.pump_max_steps == 0 {
            return Err(SettingsError::InvalidSetting {
                key: "controller.pump_max_lines".into(),
                reason: "pump budgets must be at least 1".into(),
            });
        }

        for (axis, (min, max)) in self.machine.axis_limits() {
            if min >= max {
                return Err(SettingsError::InvalidSetting {
                    key: format!("machine.{}_limits", axis.to_ascii_lowercase()),
                    reason: format!("min {} must be below max {}", min, max),
                });
            }
        }
        Ok(())
    }
}
