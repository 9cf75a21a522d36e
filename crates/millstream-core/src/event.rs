//! Job events and the event dispatcher
//!
//! The controller publishes progress, state-change, error, and completion
//! events through a broadcast channel. Subscribers poll with `try_recv`
//! from the driver loop; no async runtime is required.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::data::ExecutionState;

/// Events emitted by the job controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    /// Periodic progress report, emitted every configured distance increment.
    Progress {
        /// Motion handed to the executor so far (mm).
        completed_mm: f64,
        /// Prescanned total job length (mm), when a prescan ran.
        total_mm: Option<f64>,
        /// Completion percentage, when the total is known.
        percent: Option<f64>,
        /// Estimated remaining time in seconds, when total and feedrate are known.
        eta_s: Option<f64>,
    },
    /// The execution state machine moved.
    StateChanged {
        /// State before the transition.
        from: ExecutionState,
        /// State after the transition.
        to: ExecutionState,
    },
    /// A pipeline error cancelled the job.
    Error {
        /// Stable error kind tag (e.g. "parse", "soft_limit").
        kind: String,
        /// Rendered error message.
        message: String,
        /// Source line number, when the error has one.
        line: Option<u32>,
    },
    /// The job ran to completion.
    Completed {
        /// Total motion executed (mm).
        total_executed_mm: f64,
    },
}

impl std::fmt::Display for JobEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobEvent::Progress {
                completed_mm,
                percent,
                eta_s,
                ..
            } => {
                write!(f, "Progress: {:.1}mm", completed_mm)?;
                if let Some(pct) = percent {
                    write!(f, " ({:.1}%)", pct)?;
                }
                match eta_s {
                    Some(eta) => write!(f, " | ETA {}", format_duration(*eta)),
                    None => write!(f, " | ETA ?"),
                }
            }
            JobEvent::StateChanged { from, to } => write!(f, "State: {} -> {}", from, to),
            JobEvent::Error { message, line, .. } => match line {
                Some(line) => write!(f, "Error at line {}: {}", line, message),
                None => write!(f, "Error: {}", message),
            },
            JobEvent::Completed { total_executed_mm } => {
                write!(f, "Completed: {:.1}mm executed", total_executed_mm)
            }
        }
    }
}

/// Render a duration in seconds as "1h 2m 3s" / "2m 5s" / "45s".
pub fn format_duration(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// Event dispatcher for publishing job events to subscribers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    tx: broadcast::Sender<JobEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 128)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Events with no subscribers are dropped silently; the pipeline never
    /// blocks on observers.
    pub fn publish(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_receive() {
        let dispatcher = EventDispatcher::default();
        let mut rx = dispatcher.subscribe();

        dispatcher.publish(JobEvent::StateChanged {
            from: ExecutionState::Idle,
            to: ExecutionState::Running,
        });
        dispatcher.publish(JobEvent::Completed {
            total_executed_mm: 42.0,
        });

        match rx.try_recv().unwrap() {
            JobEvent::StateChanged { from, to } => {
                assert_eq!(from, ExecutionState::Idle);
                assert_eq!(to, ExecutionState::Running);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(rx.try_recv().unwrap(), JobEvent::Completed { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let dispatcher = EventDispatcher::default();
        assert_eq!(dispatcher.subscriber_count(), 0);
        dispatcher.publish(JobEvent::Progress {
            completed_mm: 1.0,
            total_mm: None,
            percent: None,
            eta_s: None,
        });
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45.0), "45s");
        assert_eq!(format_duration(125.0), "2m 5s");
        assert_eq!(format_duration(3723.0), "1h 2m 3s");
        assert_eq!(format_duration(-5.0), "0s");
    }

    #[test]
    fn test_progress_display() {
        let event = JobEvent::Progress {
            completed_mm: 50.0,
            total_mm: Some(100.0),
            percent: Some(50.0),
            eta_s: Some(125.0),
        };
        assert_eq!(event.to_string(), "Progress: 50.0mm (50.0%) | ETA 2m 5s");
    }
}
