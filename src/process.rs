//! Process descriptor trait and the tokio-backed implementation

use std::io;
use std::process::ExitStatus;

use async_trait::async_trait;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, info};

#[cfg(unix)]
pub use nix::sys::signal::Signal;

/// Minimal stand-in on platforms without POSIX signals; every variant is
/// delivered as a forcible kill.
#[cfg(not(unix))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    SIGINT,
    SIGTERM,
    SIGKILL,
}

#[cfg(not(unix))]
impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Signal::SIGINT => "SIGINT",
            Signal::SIGTERM => "SIGTERM",
            Signal::SIGKILL => "SIGKILL",
        };
        f.write_str(name)
    }
}

/// Handle to a not-yet-started or running external process.
///
/// Exactly the three operations a supervised run needs: start once, wait for
/// the natural exit, deliver one signal. Implemented by [`ChildProcess`] for
/// real OS processes; tests substitute fakes.
#[async_trait]
pub trait ProcessHandle: Send {
    /// Start the process. Fails if it was already started or cannot be
    /// launched.
    async fn start(&mut self) -> io::Result<()>;

    /// Wait for the process to exit and return its status.
    async fn wait(&mut self) -> io::Result<ExitStatus>;

    /// Deliver a signal to the running process.
    fn signal(&mut self, signal: Signal) -> io::Result<()>;
}

/// A prepared external command and, once started, its child process.
///
/// Owns the underlying [`Command`] until [`start`](ProcessHandle::start) is
/// called, then the spawned [`Child`] until it reaches a terminal state.
pub struct ChildProcess {
    command: Command,
    child: Option<Child>,
}

impl ChildProcess {
    /// Wrap a prepared, unstarted command
    pub fn new(command: Command) -> Self {
        Self {
            command,
            child: None,
        }
    }

    /// OS process id, if the process is running
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Name of the program this command runs
    pub(crate) fn program(&self) -> String {
        self.command.as_std().get_program().to_string_lossy().into_owned()
    }

    /// Mutable access to the unstarted command, for stdio wiring
    pub(crate) fn command_mut(&mut self) -> &mut Command {
        &mut self.command
    }

    /// Take the child's stdin handle
    pub fn stdin(&mut self) -> Option<ChildStdin> {
        self.child.as_mut().and_then(|c| c.stdin.take())
    }

    /// Take the child's stdout handle
    pub fn stdout(&mut self) -> Option<ChildStdout> {
        self.child.as_mut().and_then(|c| c.stdout.take())
    }

    /// Take the child's stderr handle
    pub fn stderr(&mut self) -> Option<ChildStderr> {
        self.child.as_mut().and_then(|c| c.stderr.take())
    }
}

#[async_trait]
impl ProcessHandle for ChildProcess {
    async fn start(&mut self) -> io::Result<()> {
        if self.child.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "process already started",
            ));
        }

        debug!(program = %self.program(), "spawning process");
        let child = self.command.spawn()?;
        info!(
            pid = ?child.id(),
            program = %self.program(),
            "process spawned"
        );
        self.child = Some(child);
        Ok(())
    }

    async fn wait(&mut self) -> io::Result<ExitStatus> {
        let child = self.child.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "process not started")
        })?;
        child.wait().await
    }

    fn signal(&mut self, signal: Signal) -> io::Result<()> {
        let child = self.child.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "process not started")
        })?;

        #[cfg(unix)]
        {
            use nix::unistd::Pid;

            // id() is None once the child has been reaped; the process is
            // gone, so report it the way the OS would.
            let pid = child
                .id()
                .ok_or_else(|| io::Error::from_raw_os_error(nix::libc::ESRCH))?;

            debug!(pid = %pid, signal = %signal, "delivering signal");
            nix::sys::signal::kill(Pid::from_raw(pid as i32), signal)
                .map_err(|errno| io::Error::from_raw_os_error(errno as i32))
        }

        #[cfg(not(unix))]
        {
            let _ = signal;
            child.start_kill()
        }
    }
}
