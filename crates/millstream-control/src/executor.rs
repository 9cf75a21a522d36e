//! Motion executor abstraction and the simulated reference backend
//!
//! A [`MotionExecutor`] takes fully-resolved motion primitives and hands
//! them to the underlying motion system. The abstraction allows a real
//! machine-backed executor, the simulator used by the CLI and tests, or
//! future loggers. Implementations must not perform lookahead of their
//! own beyond what their backend requires, and must fail fast on
//! unrecoverable errors.

use std::collections::VecDeque;

use millstream_core::{ExecutorError, MachinePosition, MotionPrimitive};

/// Backend interface the controller drives.
pub trait MotionExecutor {
    /// Enqueue one primitive into the backend motion queue.
    ///
    /// Must not block indefinitely. On error the primitive counts as not
    /// executed.
    fn execute(&mut self, primitive: &MotionPrimitive) -> Result<(), ExecutorError>;

    /// Block until all previously-enqueued motion has completed.
    ///
    /// Offline use only; reactor-style drivers poll [`Self::queued_time`]
    /// down to zero instead.
    fn flush(&mut self) -> Result<(), ExecutorError>;

    /// Total wall-clock duration of motion still queued, in seconds.
    ///
    /// The controller uses this for backpressure and for the completion
    /// check.
    fn queued_time(&self) -> f64;
}

/// Simulated motion backend.
///
/// Keeps a virtual queue of segment durations instead of real motion. The
/// driver advances a simulated clock with [`SimulatedExecutor::advance`];
/// `flush` drains everything at once. Execution statistics (count, length,
/// last feedrate, final position) are recorded for progress plumbing and
/// inspection.
#[derive(Debug, Default)]
pub struct SimulatedExecutor {
    queue: VecDeque<f64>,
    queued_s: f64,
    executed_count: usize,
    executed_length_mm: f64,
    last_feedrate_mm_s: Option<f64>,
    position: MachinePosition,
    fail_after: Option<usize>,
}

impl SimulatedExecutor {
    /// Create an idle simulated backend at the machine origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `execute` fail once `count` primitives have been accepted.
    /// Used to exercise fail-fast paths.
    pub fn with_failure_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Advance the simulated clock, draining queued motion time.
    pub fn advance(&mut self, mut dt: f64) {
        while dt > 0.0 {
            let Some(front) = self.queue.front_mut() else {
                break;
            };
            if *front > dt {
                *front -= dt;
                self.queued_s = (self.queued_s - dt).max(0.0);
                return;
            }
            dt -= *front;
            self.queued_s = (self.queued_s - *front).max(0.0);
            self.queue.pop_front();
        }
        if self.queue.is_empty() {
            self.queued_s = 0.0;
        }
    }

    /// Number of primitives accepted so far.
    pub fn executed_count(&self) -> usize {
        self.executed_count
    }

    /// Total length of accepted motion (mm).
    pub fn executed_length_mm(&self) -> f64 {
        self.executed_length_mm
    }

    /// Feedrate of the most recently accepted primitive (mm/s).
    pub fn last_feedrate_mm_s(&self) -> Option<f64> {
        self.last_feedrate_mm_s
    }

    /// Commanded position after all accepted motion.
    pub fn position(&self) -> MachinePosition {
        self.position
    }
}

impl MotionExecutor for SimulatedExecutor {
    fn execute(&mut self, primitive: &MotionPrimitive) -> Result<(), ExecutorError> {
        if let Some(limit) = self.fail_after {
            if self.executed_count >= limit {
                return Err(ExecutorError::Rejected {
                    reason: format!("injected fault after {} primitives", limit),
                });
            }
        }

        let duration = primitive.duration_s();
        self.queue.push_back(duration);
        self.queued_s += duration;
        self.executed_count += 1;
        self.executed_length_mm += primitive.length_mm;
        self.last_feedrate_mm_s = Some(primitive.feedrate_mm_s);
        self.position = primitive.end;

        tracing::trace!(
            count = self.executed_count,
            %primitive,
            queued_s = self.queued_s,
            "simulated execute"
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ExecutorError> {
        self.queue.clear();
        self.queued_s = 0.0;
        Ok(())
    }

    fn queued_time(&self) -> f64 {
        self.queued_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use millstream_core::MotionKind;

    fn primitive(length: f64, feed: f64) -> MotionPrimitive {
        MotionPrimitive::new(
            MotionKind::Linear,
            MachinePosition::default(),
            MachinePosition::new(length, 0.0, 0.0),
            feed,
        )
    }

    #[test]
    fn test_queued_time_accumulates_and_drains() {
        let mut exec = SimulatedExecutor::new();
        exec.execute(&primitive(10.0, 10.0)).unwrap(); // 1s
        exec.execute(&primitive(5.0, 10.0)).unwrap(); // 0.5s
        assert!((exec.queued_time() - 1.5).abs() < 1e-12);

        exec.advance(1.2);
        assert!((exec.queued_time() - 0.3).abs() < 1e-12);

        exec.advance(10.0);
        assert_eq!(exec.queued_time(), 0.0);
    }

    #[test]
    fn test_flush_drains_everything() {
        let mut exec = SimulatedExecutor::new();
        exec.execute(&primitive(100.0, 10.0)).unwrap();
        assert!(exec.queued_time() > 0.0);
        exec.flush().unwrap();
        assert_eq!(exec.queued_time(), 0.0);
    }

    #[test]
    fn test_records_statistics() {
        let mut exec = SimulatedExecutor::new();
        exec.execute(&primitive(10.0, 10.0)).unwrap();
        exec.execute(&primitive(2.5, 20.0)).unwrap();
        assert_eq!(exec.executed_count(), 2);
        assert!((exec.executed_length_mm() - 12.5).abs() < 1e-12);
        assert_eq!(exec.last_feedrate_mm_s(), Some(20.0));
        assert_eq!(exec.position().x, 2.5);
    }

    #[test]
    fn test_injected_failure() {
        let mut exec = SimulatedExecutor::new().with_failure_after(1);
        exec.execute(&primitive(1.0, 10.0)).unwrap();
        let err = exec.execute(&primitive(1.0, 10.0)).unwrap_err();
        assert!(matches!(err, ExecutorError::Rejected { .. }));
        // The rejected primitive was not recorded.
        assert_eq!(exec.executed_count(), 1);
    }
}
