//! The supervised run: race natural completion against cancellation

use std::io;
use std::process::ExitStatus;

use tracing::{debug, warn};

use crate::{
    context::Cancellation,
    error::{Result, RunError, TerminationStatus},
    process::{ProcessHandle, Signal},
};

/// Signal delivered by [`CtxCommand::run`] when the context is cancelled
const DEFAULT_CANCEL_SIGNAL: Signal = Signal::SIGKILL;

/// One of the two raced events
enum RaceOutcome {
    Finished(io::Result<ExitStatus>),
    Cancelled,
}

/// A process bound to a cancellable context.
///
/// Starts the process and waits until either it exits naturally or the
/// context is cancelled, whichever happens first. On cancellation the chosen
/// OS signal is delivered to the process exactly once and the run resolves to
/// a [`TerminationStatus`].
pub struct CtxCommand<P, C> {
    process: P,
    ctx: C,
}

impl<P, C> CtxCommand<P, C>
where
    P: ProcessHandle,
    C: Cancellation,
{
    /// Bundle a context with a prepared, unstarted process
    pub fn new(ctx: C, process: P) -> Self {
        Self { process, ctx }
    }

    /// Run the process, forcibly killing it if the context is cancelled.
    ///
    /// Shorthand for [`run_with_signal`](Self::run_with_signal) with the
    /// platform's forcible-kill signal.
    pub async fn run(self) -> Result<()> {
        self.run_with_signal(DEFAULT_CANCEL_SIGNAL).await
    }

    /// Run the process, delivering `on_cancel` if the context is cancelled.
    ///
    /// Outcomes:
    /// - [`RunError::Spawn`] if the process cannot be started; nothing is
    ///   waited on or signalled.
    /// - `Ok(())` if the process exits successfully before cancellation.
    /// - [`RunError::Exit`] if it exits with a failed status; the status is
    ///   passed through unchanged.
    /// - [`RunError::Terminated`] if the context is cancelled first: the
    ///   signal is delivered once and the report carries the cancellation
    ///   cause together with the delivery result.
    ///
    /// A cancellation that fires after the process has already been observed
    /// to finish is ignored. After a signal is delivered the run returns
    /// without waiting for the process to actually exit; reaping is the
    /// caller's responsibility.
    pub async fn run_with_signal(mut self, on_cancel: Signal) -> Result<()> {
        self.process.start().await.map_err(RunError::Spawn)?;

        let outcome = tokio::select! {
            res = self.process.wait() => RaceOutcome::Finished(res),
            _ = self.ctx.done() => RaceOutcome::Cancelled,
        };

        match outcome {
            RaceOutcome::Finished(res) => {
                let status = res.map_err(RunError::Wait)?;
                debug!(status = %status, "process finished");
                if status.success() {
                    Ok(())
                } else {
                    Err(RunError::Exit { status })
                }
            }
            RaceOutcome::Cancelled => {
                let cause = self.ctx.cause();
                warn!(cause = %cause, signal = %on_cancel, "context cancelled, signalling process");
                let signal_result = self.process.signal(on_cancel).err();
                Err(RunError::Terminated(TerminationStatus {
                    cause,
                    signal_result,
                }))
            }
        }
    }
}
