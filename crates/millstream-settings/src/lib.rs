//! # Millstream Settings
//!
//! Configuration for the millstream pipeline, organized into sections:
//! - Interpreter settings (segmentation, rapid rate, strict mode)
//! - Controller settings (lookahead, backpressure, progress cadence)
//! - Machine settings (soft limit ranges)
//!
//! Settings round-trip through JSON and TOML files and are validated on
//! both load and save.

pub mod config;
pub mod error;

pub use config::{
    AxisRange, ControllerSettings, InterpreterSettings, MachineSettings, Settings,
};
pub use error::SettingsError;
