//! Error handling for the millstream pipeline
//!
//! Provides structured error types for each layer:
//! - G-code errors (parsing, modal conflicts, arc geometry, feedrate)
//! - Control errors (state machine violations, soft limits)
//! - Executor errors (backend failures)
//!
//! All error types use `thiserror`. Every pipeline error is fail-fast: the
//! controller cancels the job on the first one, nothing is retried.

use thiserror::Error;

use crate::data::ExecutionState;

/// Errors produced while parsing or interpreting G-code.
///
/// All variants carry the source line number so diagnostics can point back
/// into the job file.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GcodeError {
    /// The line could not be lexed into words.
    #[error("Parse error at line {line}, column {column}: {reason}")]
    Parse {
        /// Source line number (1-based).
        line: u32,
        /// Column of the offending character (1-based).
        column: usize,
        /// What went wrong.
        reason: String,
    },

    /// Two G words from the same modal group appeared on one line,
    /// or a motion was commanded with no motion mode ever selected.
    #[error("Modal conflict at line {line}: {reason}")]
    ModalConflict {
        /// Source line number (1-based).
        line: u32,
        /// Description of the conflicting words.
        reason: String,
    },

    /// The commanded arc is geometrically impossible or inconsistent.
    #[error("Arc geometry error at line {line}: {reason}")]
    ArcGeometry {
        /// Source line number (1-based).
        line: u32,
        /// Description of the geometric defect.
        reason: String,
    },

    /// A feed move was commanded before any F word was seen. The line is
    /// absent when the controller catches this at execution time.
    #[error("No feedrate resolved for feed move{}", fmt_at_line(.line))]
    UnresolvedFeedrate {
        /// Source line number (1-based), when known.
        line: Option<u32>,
    },

    /// A word the interpreter does not implement (error only in strict mode).
    #[error("Unsupported word {word} at line {line}")]
    UnsupportedWord {
        /// Source line number (1-based).
        line: u32,
        /// The word as written, e.g. "G38.2" or "T4".
        word: String,
    },
}

fn fmt_at_line(line: &Option<u32>) -> String {
    match line {
        Some(line) => format!(" at line {}", line),
        None => " at execution time".to_string(),
    }
}

impl GcodeError {
    /// Source line the error originated from, when known.
    pub fn line_number(&self) -> Option<u32> {
        match self {
            GcodeError::Parse { line, .. }
            | GcodeError::ModalConflict { line, .. }
            | GcodeError::ArcGeometry { line, .. }
            | GcodeError::UnsupportedWord { line, .. } => Some(*line),
            GcodeError::UnresolvedFeedrate { line } => *line,
        }
    }
}

/// Errors raised by the job controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// A control command was issued in a state that does not allow it.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        /// State the controller was in.
        from: ExecutionState,
        /// State the command asked for.
        to: ExecutionState,
    },

    /// A primitive endpoint lies outside the configured soft limits.
    #[error("{axis}-axis soft limit exceeded: {value:.3} (limits {min} to {max})")]
    SoftLimit {
        /// Offending axis letter.
        axis: char,
        /// The out-of-bounds coordinate (mm).
        value: f64,
        /// Lower bound (mm).
        min: f64,
        /// Upper bound (mm).
        max: f64,
    },
}

/// Errors raised by motion executor backends.
///
/// Backends must fail fast: an error here means the offending primitive was
/// not executed and the job cannot continue.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    /// The backend refused the primitive.
    #[error("Motion backend rejected primitive: {reason}")]
    Rejected {
        /// Why the backend refused it.
        reason: String,
    },

    /// The backend is gone or unusable.
    #[error("Motion backend unavailable: {reason}")]
    Unavailable {
        /// Why the backend cannot accept motion.
        reason: String,
    },
}

/// Unified error type for the pipeline.
///
/// The primary error type used in public APIs; each layer's error converts
/// into it via `From`.
#[derive(Error, Debug)]
pub enum Error {
    /// G-code parsing or interpretation error
    #[error(transparent)]
    Gcode(#[from] GcodeError),

    /// Controller error
    #[error(transparent)]
    Control(#[from] ControlError),

    /// Motion backend error
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a plain message.
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Stable kind tag for events and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Gcode(GcodeError::Parse { .. }) => "parse",
            Error::Gcode(GcodeError::ModalConflict { .. }) => "modal",
            Error::Gcode(GcodeError::ArcGeometry { .. }) => "arc_geometry",
            Error::Gcode(GcodeError::UnresolvedFeedrate { .. }) => "unresolved_feedrate",
            Error::Gcode(GcodeError::UnsupportedWord { .. }) => "unsupported_word",
            Error::Control(ControlError::InvalidTransition { .. }) => "invalid_transition",
            Error::Control(ControlError::SoftLimit { .. }) => "soft_limit",
            Error::Executor(_) => "executor",
            Error::Io(_) => "io",
            Error::Other(_) => "other",
        }
    }

    /// Source line number, when the underlying error has one.
    pub fn line_number(&self) -> Option<u32> {
        match self {
            Error::Gcode(e) => e.line_number(),
            _ => None,
        }
    }
}

/// Result type using the unified [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_location() {
        let err = GcodeError::Parse {
            line: 12,
            column: 5,
            reason: "stray character '@'".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 12"));
        assert!(msg.contains("column 5"));
    }

    #[test]
    fn test_line_number_extraction() {
        let err: Error = GcodeError::UnresolvedFeedrate { line: Some(7) }.into();
        assert_eq!(err.line_number(), Some(7));

        let err: Error = ControlError::SoftLimit {
            axis: 'X',
            value: 310.0,
            min: 0.0,
            max: 300.0,
        }
        .into();
        assert_eq!(err.line_number(), None);
    }

    #[test]
    fn test_transition_error_display() {
        let err = ControlError::InvalidTransition {
            from: ExecutionState::Idle,
            to: ExecutionState::Hold,
        };
        assert_eq!(
            err.to_string(),
            "Invalid state transition from Idle to Hold"
        );
    }
}
