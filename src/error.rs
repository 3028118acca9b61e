//! Error types for context-bound process execution

use std::fmt;
use std::io;
use std::process::ExitStatus;

use thiserror::Error;

use crate::context::CancelCause;

/// Errors produced by a supervised run
#[derive(Debug, Error)]
pub enum RunError {
    /// The process could not be started; the race never began
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    /// Waiting for the process failed at the OS level
    #[error("failed waiting for process: {0}")]
    Wait(#[source] io::Error),

    /// The process ran to completion with a failed exit status
    #[error("process exited with {status}")]
    Exit {
        /// The natural exit status, unchanged
        status: ExitStatus,
    },

    /// Cancellation preempted natural completion
    #[error(transparent)]
    Terminated(#[from] TerminationStatus),
}

/// Report produced when the context is cancelled before the process exits.
///
/// Carries both the cancellation cause and the outcome of the single signal
/// delivery attempt, so a caller can tell "cleanly interrupted" apart from
/// "interrupted but could not be signalled". This value is always
/// failure-shaped, even when the signal itself was delivered without error.
#[derive(Debug)]
pub struct TerminationStatus {
    /// Why the context ended
    pub cause: CancelCause,
    /// `None` if the signal was delivered successfully
    pub signal_result: Option<io::Error>,
}

impl TerminationStatus {
    /// Whether the cancellation signal reached the process
    pub fn signal_delivered(&self) -> bool {
        self.signal_result.is_none()
    }
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.signal_result {
            Some(err) => write!(
                f,
                "context terminated with {}, signal delivery failed: {}",
                self.cause, err
            ),
            None => write!(f, "context terminated with {}, process signalled", self.cause),
        }
    }
}

impl std::error::Error for TerminationStatus {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.signal_result
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for supervised runs
pub type Result<T> = std::result::Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termination_display_with_delivery() {
        let status = TerminationStatus {
            cause: CancelCause::Cancelled,
            signal_result: None,
        };
        assert!(status.signal_delivered());
        let rendered = status.to_string();
        assert!(rendered.contains("context cancelled"));
        assert!(rendered.contains("process signalled"));
    }

    #[test]
    fn termination_display_with_failed_delivery() {
        let status = TerminationStatus {
            cause: CancelCause::DeadlineExceeded,
            signal_result: Some(io::Error::new(io::ErrorKind::NotFound, "no such process")),
        };
        assert!(!status.signal_delivered());
        assert!(status.to_string().contains("signal delivery failed"));
    }

    #[test]
    fn termination_converts_into_run_error() {
        let status = TerminationStatus {
            cause: CancelCause::Cancelled,
            signal_result: None,
        };
        let err: RunError = status.into();
        assert!(matches!(err, RunError::Terminated(_)));
    }
}
