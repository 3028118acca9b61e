//! # ctxproc
//!
//! **Purpose**: Bind the lifecycle of one external process to a cancellable
//! context.
//!
//! A [`CtxCommand`] starts a prepared process and races its natural
//! completion against cancellation of a shared [`CancelContext`]. If the
//! context is cancelled first, the process receives a chosen OS signal and
//! the run resolves to a [`TerminationStatus`] carrying both the cancellation
//! cause and the outcome of the signal delivery.
//!
//! ## Features
//!
//! - **Supervised runs**: exactly one of natural exit or termination report
//!   per run, never both
//! - **Signal on cancel**: one delivery attempt, defaulting to the forcible
//!   kill signal
//! - **Narrow seams**: [`ProcessHandle`] and [`Cancellation`] traits so the
//!   race can be tested without spawning OS processes
//! - **Output capture**: [`CapturedProcess`] buffers stdout/stderr in memory
//!   and can feed a supplied input stream to stdin
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ctxproc::{CancelCause, CancelContext, ChildProcess, CtxCommand};
//! use tokio::process::Command;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = CancelContext::new();
//!
//! // Some other part of the system decides when to cancel.
//! let canceller = ctx.clone();
//! tokio::spawn(async move {
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     canceller.cancel(CancelCause::DeadlineExceeded);
//! });
//!
//! let mut command = Command::new("sleep");
//! command.arg("60");
//! CtxCommand::new(ctx, ChildProcess::new(command)).run().await?;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod context;
pub mod error;
pub mod process;
pub mod runner;

pub use capture::{CaptureBuffer, CapturedProcess};
pub use context::{CancelCause, CancelContext, Cancellation};
pub use error::{Result, RunError, TerminationStatus};
pub use process::{ChildProcess, ProcessHandle, Signal};
pub use runner::CtxCommand;
