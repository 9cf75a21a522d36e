//! # Millstream Control
//!
//! The execution half of the millstream pipeline:
//! - Line streamer with lazy file access and idempotent EOF
//! - The motion executor trait and a simulated reference backend
//! - Soft limit checking
//! - The job controller: state machine, bounded lookahead, pump, progress
//! - The prescanner for total-length computation
//!
//! All components are single-threaded cooperative; the driver repeatedly
//! calls [`JobController::pump`] with a per-tick budget.

pub mod controller;
pub mod executor;
pub mod limits;
pub mod prescan;
pub mod streamer;

pub use controller::{ControllerConfig, JobController, PumpBudget, PumpReport};
pub use executor::{MotionExecutor, SimulatedExecutor};
pub use limits::SoftLimits;
pub use prescan::prescan_total_length;
pub use streamer::GcodeStreamer;
