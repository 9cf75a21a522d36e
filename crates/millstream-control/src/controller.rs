//! Job execution controller
//!
//! Coordinates the whole pipeline for one streamed job:
//! - Pulls lines from the streamer and interprets them into primitives
//! - Maintains a bounded ready queue of lookahead primitives
//! - Executes primitives one at a time while running
//! - Enforces the execution state machine (start / hold / resume / cancel)
//! - Tracks distance-based progress and publishes job events
//!
//! The controller is single-threaded cooperative: a driver (reactor timer
//! on an embedded host, a blocking loop offline) repeatedly calls
//! [`JobController::pump`] with a per-tick budget, which bounds how long
//! the controller can go between chances to observe hold or cancel.

use std::collections::VecDeque;

use millstream_core::{
    ControlError, Error, EventDispatcher, ExecutionState, GcodeError, JobEvent, MotionKind,
    MotionPrimitive, Result,
};
use millstream_gcode::{parser, Interpreter};

use crate::executor::MotionExecutor;
use crate::limits::SoftLimits;
use crate::streamer::GcodeStreamer;

/// Per-tick work budget for [`JobController::pump`].
///
/// Bounds how many source lines are pulled and how many primitives are
/// executed in one invocation, so hold and cancel are observed promptly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpBudget {
    /// Maximum source lines pulled in the fill phase.
    pub max_lines: usize,
    /// Maximum primitives executed in the step phase.
    pub max_steps: usize,
}

impl Default for PumpBudget {
    fn default() -> Self {
        Self {
            max_lines: 16,
            max_steps: 8,
        }
    }
}

/// What one pump invocation actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpReport {
    /// Lines pulled from the streamer.
    pub lines_read: usize,
    /// Primitives handed to the executor.
    pub steps_executed: usize,
    /// Controller state after the tick.
    pub state: ExecutionState,
}

/// Controller tuning knobs.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Upper bound of the ready queue; filling pauses when reached.
    pub lookahead_primitives: usize,
    /// Stop filling while the executor has more than this queued (seconds).
    pub queue_high_watermark_s: f64,
    /// Distance between progress events (mm).
    pub progress_increment_mm: f64,
    /// Whether rapids are checked against soft limits too.
    pub check_rapid_soft_limits: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            lookahead_primitives: 64,
            queue_high_watermark_s: 0.5,
            progress_increment_mm: 1.0,
            check_rapid_soft_limits: true,
        }
    }
}

/// Central execution controller for one streamed CNC job.
pub struct JobController<E: MotionExecutor> {
    executor: E,
    streamer: GcodeStreamer,
    interpreter: Interpreter,
    soft_limits: Option<SoftLimits>,
    config: ControllerConfig,
    events: EventDispatcher,

    state: ExecutionState,
    ready_queue: VecDeque<MotionPrimitive>,
    eof: bool,

    total_length_mm: Option<f64>,
    completed_length_mm: f64,
    last_feedrate_mm_s: Option<f64>,
    next_progress_at_mm: f64,
}

impl<E: MotionExecutor> JobController<E> {
    /// Assemble a controller for one job.
    ///
    /// The interpreter must be freshly constructed for this job; the
    /// controller owns it (and its modal state) for the session.
    pub fn new(
        executor: E,
        streamer: GcodeStreamer,
        interpreter: Interpreter,
        config: ControllerConfig,
    ) -> Self {
        let next_progress_at_mm = config.progress_increment_mm;
        Self {
            executor,
            streamer,
            interpreter,
            soft_limits: None,
            config,
            events: EventDispatcher::default(),
            state: ExecutionState::Idle,
            ready_queue: VecDeque::new(),
            eof: false,
            total_length_mm: None,
            completed_length_mm: 0.0,
            last_feedrate_mm_s: None,
            next_progress_at_mm,
        }
    }

    /// Attach a soft limit table, checked before every executed primitive.
    pub fn with_soft_limits(mut self, limits: SoftLimits) -> Self {
        self.soft_limits = Some(limits);
        self
    }

    /// Event dispatcher; subscribe before pumping to observe the job.
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Set the prescanned total job length for percent/ETA reporting.
    pub fn set_total_length(&mut self, total_mm: f64) {
        self.total_length_mm = Some(total_mm);
    }

    /// Current execution state.
    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Motion handed to the executor so far (mm).
    pub fn completed_length_mm(&self) -> f64 {
        self.completed_length_mm
    }

    /// Primitives buffered ahead of the executor.
    pub fn queued_primitives(&self) -> usize {
        self.ready_queue.len()
    }

    /// The backend, e.g. to drive a simulated clock between pumps.
    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// Read-only backend access.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    // ---- control commands ------------------------------------------------

    /// Begin execution. Only valid from Idle.
    ///
    /// Start and resume both land on Running, so the shared transition
    /// table alone cannot tell them apart; each command checks its own
    /// source state first.
    pub fn start(&mut self) -> Result<()> {
        if self.state != ExecutionState::Idle {
            return Err(ControlError::InvalidTransition {
                from: self.state,
                to: ExecutionState::Running,
            }
            .into());
        }
        self.transition(ExecutionState::Running)?;
        tracing::info!("job started");
        Ok(())
    }

    /// Pause execution (feed hold). Lookahead keeps filling; motion already
    /// handed to the backend completes there. No-op when already holding.
    pub fn feed_hold(&mut self) -> Result<()> {
        if self.state == ExecutionState::Hold {
            return Ok(());
        }
        self.transition(ExecutionState::Hold)?;
        self.publish_progress();
        tracing::info!("feed hold");
        Ok(())
    }

    /// Resume after a feed hold. Only valid from Hold.
    pub fn resume(&mut self) -> Result<()> {
        if self.state != ExecutionState::Hold {
            return Err(ControlError::InvalidTransition {
                from: self.state,
                to: ExecutionState::Running,
            }
            .into());
        }
        self.transition(ExecutionState::Running)?;
        tracing::info!("resumed");
        Ok(())
    }

    /// Cancel the job. Terminal until `reset`; does not abort motion
    /// already handed to the backend. No-op when already cancelled.
    pub fn cancel(&mut self) -> Result<()> {
        if self.state == ExecutionState::Cancelled {
            return Ok(());
        }
        self.transition(ExecutionState::Cancelled)?;
        tracing::info!("cancelled");
        Ok(())
    }

    /// Return to Idle from a terminal state, clearing all job bookkeeping.
    ///
    /// The streamer is not restartable: to run again, build a new
    /// controller over a fresh streamer and interpreter.
    pub fn reset(&mut self) -> Result<()> {
        self.transition(ExecutionState::Idle)?;
        self.ready_queue.clear();
        self.eof = false;
        self.total_length_mm = None;
        self.completed_length_mm = 0.0;
        self.last_feedrate_mm_s = None;
        self.next_progress_at_mm = self.config.progress_increment_mm;
        tracing::info!("reset");
        Ok(())
    }

    // ---- pump ------------------------------------------------------------

    /// One bounded fill-and-step cycle.
    ///
    /// Fill pulls up to `budget.max_lines` source lines through the
    /// interpreter into the ready queue (pausing on lookahead or executor
    /// backpressure); step hands up to `budget.max_steps` primitives to the
    /// executor while running. Any pipeline error cancels the job,
    /// publishes an error event, and is returned.
    pub fn pump(&mut self, budget: PumpBudget) -> Result<PumpReport> {
        if self.state.is_terminal() {
            return Ok(self.report(0, 0));
        }

        let lines_read = self.fill_phase(budget.max_lines)?;
        let steps_executed = self.step_phase(budget.max_steps)?;

        // Completion: input exhausted, nothing buffered anywhere.
        if self.state == ExecutionState::Running
            && self.eof
            && self.ready_queue.is_empty()
            && self.executor.queued_time() == 0.0
        {
            self.transition(ExecutionState::Done)?;
            self.events.publish(JobEvent::Completed {
                total_executed_mm: self.completed_length_mm,
            });
            tracing::info!(
                total_mm = self.completed_length_mm,
                "job complete"
            );
        }

        Ok(self.report(lines_read, steps_executed))
    }

    fn fill_phase(&mut self, max_lines: usize) -> Result<usize> {
        let mut lines_read = 0;
        while lines_read < max_lines
            && !self.eof
            && self.ready_queue.len() < self.config.lookahead_primitives
        {
            if self.executor.queued_time() > self.config.queue_high_watermark_s {
                tracing::debug!(
                    queued_s = self.executor.queued_time(),
                    "backpressure: pausing fill"
                );
                break;
            }

            let line = match self.streamer.next_line() {
                Ok(line) => line,
                Err(e) => return self.fail(e),
            };
            let Some((number, text)) = line else {
                self.eof = true;
                tracing::debug!("input exhausted");
                break;
            };
            lines_read += 1;

            let parsed = match parser::parse_line(&text, number) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => continue,
                Err(e) => return self.fail(e.into()),
            };
            let primitives = match self.interpreter.interpret(&parsed) {
                Ok(primitives) => primitives,
                Err(e) => return self.fail(e.into()),
            };
            self.ready_queue
                .extend(primitives.into_iter().filter(|p| !p.is_zero_length()));
        }
        Ok(lines_read)
    }

    fn step_phase(&mut self, max_steps: usize) -> Result<usize> {
        let mut steps = 0;
        while steps < max_steps && self.state.is_executing() {
            let Some(primitive) = self.ready_queue.pop_front() else {
                break;
            };

            if primitive.feedrate_mm_s <= 0.0 {
                return self.fail(GcodeError::UnresolvedFeedrate { line: None }.into());
            }
            if let Some(limits) = &self.soft_limits {
                let check = primitive.kind != MotionKind::Rapid
                    || self.config.check_rapid_soft_limits;
                if check {
                    if let Err(e) = limits.check_primitive(&primitive) {
                        return self.fail(e.into());
                    }
                }
            }
            if let Err(e) = self.executor.execute(&primitive) {
                // The offending primitive counts as not executed.
                return self.fail(e.into());
            }

            self.completed_length_mm += primitive.length_mm;
            self.last_feedrate_mm_s = Some(primitive.feedrate_mm_s);
            steps += 1;

            if self.completed_length_mm >= self.next_progress_at_mm {
                self.publish_progress();
                while self.next_progress_at_mm <= self.completed_length_mm {
                    self.next_progress_at_mm += self.config.progress_increment_mm;
                }
            }
        }
        Ok(steps)
    }

    // ---- internals -------------------------------------------------------

    fn transition(&mut self, to: ExecutionState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(ControlError::InvalidTransition {
                from: self.state,
                to,
            }
            .into());
        }
        let from = self.state;
        self.state = to;
        self.events.publish(JobEvent::StateChanged { from, to });
        Ok(())
    }

    /// Terminate the job on a pipeline error: publish, cancel, propagate.
    fn fail<T>(&mut self, error: Error) -> Result<T> {
        tracing::error!(%error, "pipeline error, cancelling job");
        self.events.publish(JobEvent::Error {
            kind: error.kind().to_string(),
            message: error.to_string(),
            line: error.line_number(),
        });
        let from = self.state;
        self.state = ExecutionState::Cancelled;
        self.events.publish(JobEvent::StateChanged {
            from,
            to: ExecutionState::Cancelled,
        });
        Err(error)
    }

    fn publish_progress(&self) {
        let percent = self
            .total_length_mm
            .filter(|total| *total > 0.0)
            .map(|total| (self.completed_length_mm / total * 100.0).min(100.0));
        let eta_s = match (self.total_length_mm, self.last_feedrate_mm_s) {
            (Some(total), Some(feed)) if feed > 0.0 => {
                Some((total - self.completed_length_mm).max(0.0) / feed)
            }
            _ => None,
        };
        self.events.publish(JobEvent::Progress {
            completed_mm: self.completed_length_mm,
            total_mm: self.total_length_mm,
            percent,
            eta_s,
        });
    }

    fn report(&self, lines_read: usize, steps_executed: usize) -> PumpReport {
        PumpReport {
            lines_read,
            steps_executed,
            state: self.state,
        }
    }
}
