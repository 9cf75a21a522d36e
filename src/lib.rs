//! # Millstream
//!
//! A streaming CNC execution pipeline: G-code text in, geometry-resolved
//! motion primitives out, driven through a pluggable motion backend with
//! explicit run/hold/cancel control and distance-based progress.
//!
//! ## Architecture
//!
//! Millstream is organized as a workspace with multiple crates:
//!
//! 1. **millstream-core** - Data models, errors, events, units
//! 2. **millstream-gcode** - Parser, modal state, interpreter, arc math
//! 3. **millstream-control** - Streamer, executor, controller, prescan
//! 4. **millstream-settings** - Configuration sections and persistence
//! 5. **millstream** - The offline CLI driver
//!
//! The pipeline is single-threaded cooperative: a driver repeatedly calls
//! the controller's `pump` with a small budget, which is what keeps hold
//! and cancel prompt.

pub use millstream_core::{
    ControlError, Error, EventDispatcher, ExecutionState, ExecutorError, GcodeError,
    JobEvent, MachinePosition, MotionKind, MotionPrimitive, Result, Units,
};

pub use millstream_gcode::{
    parse_line, DistanceMode, Interpreter, ModalState, MotionMode, ParsedLine, Plane,
};

pub use millstream_control::{
    prescan_total_length, ControllerConfig, GcodeStreamer, JobController, MotionExecutor,
    PumpBudget, PumpReport, SimulatedExecutor, SoftLimits,
};

pub use millstream_settings::{Settings, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with console output and `RUST_LOG`
/// environment variable support; defaults to INFO.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
