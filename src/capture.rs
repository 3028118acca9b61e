//! In-memory stdout/stderr capture for a supervised process
//!
//! Pure stream plumbing: wires the child's standard streams to pipes before
//! it is started and drains them into shared buffers afterwards. Composes
//! with [`CtxCommand`](crate::CtxCommand) through [`ProcessHandle`].

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::process::{ChildProcess, ProcessHandle, Signal};

type InputStream = Box<dyn AsyncRead + Send + Unpin>;
type SharedBuffer = Arc<Mutex<Vec<u8>>>;

const READ_CHUNK_SIZE: usize = 8192;

/// A process whose stdout and stderr are captured into in-memory buffers.
///
/// An optional input stream can be attached; it is copied into the child's
/// stdin after start and the pipe is closed when the stream ends.
pub struct CapturedProcess {
    inner: ChildProcess,
    input: Option<InputStream>,
    stdout: SharedBuffer,
    stderr: SharedBuffer,
    drains: Vec<JoinHandle<()>>,
}

impl CapturedProcess {
    /// Capture the output of a prepared, unstarted process
    pub fn new(process: ChildProcess) -> Self {
        Self {
            inner: process,
            input: None,
            stdout: Arc::new(Mutex::new(Vec::new())),
            stderr: Arc::new(Mutex::new(Vec::new())),
            drains: Vec::new(),
        }
    }

    /// Attach an input stream to feed the child's stdin
    pub fn with_stdin(mut self, input: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.input = Some(Box::new(input));
        self
    }

    /// Snapshot of the captured stdout bytes
    pub fn stdout(&self) -> Vec<u8> {
        self.stdout_buffer().contents()
    }

    /// Snapshot of the captured stderr bytes
    pub fn stderr(&self) -> Vec<u8> {
        self.stderr_buffer().contents()
    }

    /// Handle to the stdout buffer that outlives the process.
    ///
    /// Useful when the process is handed off to a run that consumes it.
    pub fn stdout_buffer(&self) -> CaptureBuffer {
        CaptureBuffer(self.stdout.clone())
    }

    /// Handle to the stderr buffer that outlives the process
    pub fn stderr_buffer(&self) -> CaptureBuffer {
        CaptureBuffer(self.stderr.clone())
    }
}

/// Cloneable view of a capture buffer
#[derive(Clone)]
pub struct CaptureBuffer(SharedBuffer);

impl CaptureBuffer {
    /// Snapshot of the bytes captured so far
    pub fn contents(&self) -> Vec<u8> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Copy everything a pipe produces into the shared buffer
async fn drain(mut reader: impl AsyncRead + Unpin, buffer: SharedBuffer) {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buffer
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .extend_from_slice(&chunk[..n]);
            }
        }
    }
}

#[async_trait]
impl ProcessHandle for CapturedProcess {
    async fn start(&mut self) -> io::Result<()> {
        {
            let command = self.inner.command_mut();
            command.stdout(Stdio::piped());
            command.stderr(Stdio::piped());
            command.stdin(if self.input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        }

        self.inner.start().await?;

        if let Some(stdout) = self.inner.stdout() {
            self.drains.push(tokio::spawn(drain(stdout, self.stdout.clone())));
        }
        if let Some(stderr) = self.inner.stderr() {
            self.drains.push(tokio::spawn(drain(stderr, self.stderr.clone())));
        }
        if let Some(mut input) = self.input.take() {
            if let Some(mut stdin) = self.inner.stdin() {
                // Writer is deliberately not awaited in wait(): a child may
                // exit without consuming its whole input.
                tokio::spawn(async move {
                    if let Err(err) = tokio::io::copy(&mut input, &mut stdin).await {
                        debug!(error = %err, "stdin stream ended early");
                    }
                    let _ = stdin.shutdown().await;
                });
            }
        }
        Ok(())
    }

    async fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.inner.wait().await;
        // The pipes close when the child exits; settle the drains so the
        // buffers are complete before the outcome is reported. Done on the
        // error branch too, so no drain lingers past a failed wait.
        for handle in self.drains.drain(..) {
            let _ = handle.await;
        }
        status
    }

    fn signal(&mut self, signal: Signal) -> io::Result<()> {
        self.inner.signal(signal)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::context::{CancelCause, CancelContext};
    use crate::error::RunError;
    use crate::CtxCommand;
    use std::time::Duration;
    use tokio::process::Command;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn captures_stdout() {
        let mut command = Command::new("echo");
        command.arg("hello");
        let mut process = CapturedProcess::new(ChildProcess::new(command));

        process.start().await.unwrap();
        let status = process.wait().await.unwrap();
        assert!(status.success());
        assert_eq!(process.stdout(), b"hello\n");
        assert!(process.stderr().is_empty());
    }

    #[tokio::test]
    async fn captures_stderr_separately() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo out; echo err >&2"]);
        let mut process = CapturedProcess::new(ChildProcess::new(command));

        process.start().await.unwrap();
        process.wait().await.unwrap();
        assert_eq!(process.stdout(), b"out\n");
        assert_eq!(process.stderr(), b"err\n");
    }

    #[tokio::test]
    async fn feeds_supplied_input_stream() {
        let mut process = CapturedProcess::new(ChildProcess::new(Command::new("cat")))
            .with_stdin(std::io::Cursor::new(b"piped input".to_vec()));

        process.start().await.unwrap();
        let status = process.wait().await.unwrap();
        assert!(status.success());
        assert_eq!(process.stdout(), b"piped input");
    }

    #[tokio::test]
    async fn failed_wait_leaves_capture_usable() {
        let mut command = Command::new("echo");
        command.arg("later");
        let mut process = CapturedProcess::new(ChildProcess::new(command));

        // Waiting before start fails; the error branch must still settle
        // the drains instead of leaving them behind.
        assert!(process.wait().await.is_err());

        process.start().await.unwrap();
        let status = process.wait().await.unwrap();
        assert!(status.success());
        assert_eq!(process.stdout(), b"later\n");
    }

    #[tokio::test]
    async fn composes_with_supervised_run() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo done"]);
        let process = CapturedProcess::new(ChildProcess::new(command));
        let stdout = process.stdout_buffer();
        let ctx = CancelContext::new();

        let run = CtxCommand::new(ctx, process);
        tokio_test::assert_ok!(run.run().await);
        assert_eq!(stdout.contents(), b"done\n");
    }

    #[tokio::test]
    async fn cancelled_run_still_signals_captured_process() {
        let mut command = Command::new("sleep");
        command.arg("30");
        let process = CapturedProcess::new(ChildProcess::new(command));
        let ctx = CancelContext::new();

        let handle = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel(CancelCause::Cancelled);
        });

        let err = CtxCommand::new(ctx, process).run().await.unwrap_err();
        assert!(matches!(err, RunError::Terminated(_)));
    }
}
