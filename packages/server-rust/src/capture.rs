//! Output capture for debug requests.
//!
//! [`capture_during`] runs a future with the process's stdout and stderr
//! descriptors redirected into pipes. Two blocking forwarders drain the pipes
//! while the future runs, copying every chunk both into an in-memory buffer
//! and to the original destination, so operational output is never lost and
//! the future never blocks on a full pipe.
//!
//! Redirection is scoped: a [`StdioRedirect`] guard restores descriptors 1
//! and 2 on every exit path, including panics inside the future and the
//! future being dropped mid-flight. Captures nest; an inner capture forwards
//! into the outer capture's pipes. Captures on different tasks are
//! serialized, since the descriptors they swap are shared by the process.

use std::future::Future;
use std::panic::AssertUnwindSafe;
#[cfg(unix)]
use std::sync::OnceLock;

use futures_util::FutureExt;

// ---------------------------------------------------------------------------
// Captured / SandboxError
// ---------------------------------------------------------------------------

/// Output captured while a unit of work ran, plus its outcome.
#[derive(Debug)]
pub struct Captured<T> {
    pub stdout: String,
    pub stderr: String,
    /// The unit of work's output, or why the sandbox could not produce it.
    pub outcome: Result<T, SandboxError>,
}

impl<T> Captured<T> {
    fn empty(outcome: Result<T, SandboxError>) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            outcome,
        }
    }
}

/// Failures of the capture sandbox itself.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Pipes or descriptor duplicates could not be created. The unit of work
    /// did not run.
    #[error("failed to redirect output streams: {0}")]
    Setup(#[source] std::io::Error),
    /// The original stdout/stderr could not be reinstated.
    #[error("failed to restore output streams: {0}")]
    Restore(#[source] std::io::Error),
    /// A forwarder failed while draining a pipe.
    #[error("output forwarder failed: {0}")]
    Forwarder(#[source] std::io::Error),
    /// The unit of work panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// capture_during
// ---------------------------------------------------------------------------

#[cfg(unix)]
tokio::task_local! {
    /// Nesting depth of captures on the current task.
    static CAPTURE_DEPTH: usize;
}

/// Held by the outermost capture. Descriptors 1 and 2 are process-wide, so
/// two unrelated captures must never interleave their swaps.
#[cfg(unix)]
fn capture_lock() -> &'static tokio::sync::Mutex<()> {
    static LOCK: OnceLock<tokio::sync::Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| tokio::sync::Mutex::new(()))
}

/// Run `work` with stdout and stderr captured.
///
/// A panic inside `work` is caught and reported as
/// `SandboxError::Panicked`; the captured output up to that point is still
/// returned. Redirect setup failures are reported without running `work`.
///
/// Captures from different tasks run one at a time. A capture started
/// inside `work` on the same task nests without waiting; one started from a
/// task that `work` spawns and awaits would wait forever.
#[cfg(unix)]
pub async fn capture_during<Fut, T>(work: Fut) -> Captured<T>
where
    Fut: Future<Output = T>,
{
    let depth = CAPTURE_DEPTH.try_with(|d| *d).unwrap_or(0);
    let _exclusive = if depth == 0 {
        Some(capture_lock().lock().await)
    } else {
        None
    };
    CAPTURE_DEPTH.scope(depth + 1, redirected(work)).await
}

#[cfg(unix)]
async fn redirected<Fut, T>(work: Fut) -> Captured<T>
where
    Fut: Future<Output = T>,
{
    let (mut redirect, forwarders) = match unix::StdioRedirect::install() {
        Ok(installed) => installed,
        Err(e) => {
            tracing::warn!(error = %e, "output capture unavailable");
            return Captured::empty(Err(SandboxError::Setup(e)));
        }
    };

    let result = AssertUnwindSafe(work).catch_unwind().await;

    // Restoring closes the last write ends, which lets the forwarders hit EOF.
    let restored = redirect.restore();
    drop(redirect);
    if let Err(e) = restored {
        // A descriptor may still point at a pipe, so its drain could block
        // forever. The forwarders are detached instead of joined.
        tracing::error!(error = %e, "output streams not restored, abandoning forwarders");
        return Captured::empty(Err(SandboxError::Restore(e)));
    }
    let (stdout, stderr, drained) = forwarders.join().await;

    let outcome = match (result, drained) {
        (_, Err(e)) => Err(SandboxError::Forwarder(e)),
        (Err(panic), _) => Err(SandboxError::Panicked(panic_message(panic.as_ref()))),
        (Ok(value), Ok(())) => Ok(value),
    };

    Captured {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        outcome,
    }
}

/// Run `work` without redirection; no descriptor-level capture is available.
#[cfg(not(unix))]
pub async fn capture_during<Fut, T>(work: Fut) -> Captured<T>
where
    Fut: Future<Output = T>,
{
    let outcome = AssertUnwindSafe(work)
        .catch_unwind()
        .await
        .map_err(|panic| SandboxError::Panicked(panic_message(panic.as_ref())));
    Captured::empty(outcome)
}

#[cfg(unix)]
pub use unix::StdioRedirect;

// ---------------------------------------------------------------------------
// Unix implementation
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod unix {
    use std::fs::File;
    use std::io::{self, Read, Write};
    use std::os::fd::OwnedFd;

    use nix::unistd::{dup, dup2_stderr, dup2_stdout, pipe};
    use tokio::task::JoinHandle;

    const FORWARD_CHUNK: usize = 8 * 1024;

    fn flush_stdio() {
        // Flush errors surface again on the next write; nothing to do here.
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }

    /// Scope guard holding the original stdout/stderr while they point at
    /// capture pipes. Dropping the guard restores them.
    #[derive(Debug)]
    pub struct StdioRedirect {
        saved_stdout: OwnedFd,
        saved_stderr: OwnedFd,
        pipe_stdout: Option<OwnedFd>,
        pipe_stderr: Option<OwnedFd>,
        active: bool,
    }

    /// Join handles of the two pipe drains.
    pub(super) struct Forwarders {
        stdout: JoinHandle<io::Result<Vec<u8>>>,
        stderr: JoinHandle<io::Result<Vec<u8>>>,
    }

    impl StdioRedirect {
        /// Redirect descriptors 1 and 2 into fresh pipes and start draining
        /// them.
        pub(super) fn install() -> io::Result<(Self, Forwarders)> {
            flush_stdio();

            let (out_read, out_write) = pipe()?;
            let (err_read, err_write) = pipe()?;
            let saved_stdout = dup(io::stdout())?;
            let saved_stderr = dup(io::stderr())?;
            let stdout_sink = File::from(dup(&saved_stdout)?);
            let stderr_sink = File::from(dup(&saved_stderr)?);

            let mut guard = Self {
                saved_stdout,
                saved_stderr,
                pipe_stdout: Some(out_write),
                pipe_stderr: Some(err_write),
                active: false,
            };

            let forwarders = Forwarders {
                stdout: tokio::task::spawn_blocking(move || {
                    forward(File::from(out_read), stdout_sink)
                }),
                stderr: tokio::task::spawn_blocking(move || {
                    forward(File::from(err_read), stderr_sink)
                }),
            };

            // From here on a failure must still restore what was swapped,
            // which the guard's Drop takes care of.
            guard.active = true;
            if let Some(fd) = &guard.pipe_stdout {
                dup2_stdout(fd)?;
            }
            if let Some(fd) = &guard.pipe_stderr {
                dup2_stderr(fd)?;
            }

            Ok((guard, forwarders))
        }

        /// Reinstate the original descriptors and close the pipe write ends.
        /// Idempotent.
        pub fn restore(&mut self) -> io::Result<()> {
            let mut result = Ok(());
            if self.active {
                flush_stdio();
                if let Err(e) = dup2_stdout(&self.saved_stdout) {
                    result = Err(e.into());
                }
                if let Err(e) = dup2_stderr(&self.saved_stderr) {
                    result = Err(e.into());
                }
                self.active = false;
            }
            self.pipe_stdout.take();
            self.pipe_stderr.take();
            result
        }
    }

    impl Drop for StdioRedirect {
        fn drop(&mut self) {
            if let Err(e) = self.restore() {
                tracing::error!(error = %e, "failed to restore stdio after capture");
            }
        }
    }

    impl Forwarders {
        /// Wait for both drains to reach end-of-stream.
        pub(super) async fn join(self) -> (Vec<u8>, Vec<u8>, io::Result<()>) {
            let stdout = flatten(self.stdout.await);
            let stderr = flatten(self.stderr.await);
            match (stdout, stderr) {
                (Ok(out), Ok(err)) => (out, err, Ok(())),
                (Ok(out), Err(e)) => (out, Vec::new(), Err(e)),
                (Err(e), Ok(err)) => (Vec::new(), err, Err(e)),
                (Err(e), Err(_)) => (Vec::new(), Vec::new(), Err(e)),
            }
        }
    }

    fn flatten(
        joined: Result<io::Result<Vec<u8>>, tokio::task::JoinError>,
    ) -> io::Result<Vec<u8>> {
        joined.map_err(io::Error::other)?
    }

    /// Copy `source` into a buffer and into `sink` until EOF.
    fn forward(mut source: File, mut sink: File) -> io::Result<Vec<u8>> {
        let mut captured = Vec::new();
        let mut chunk = [0u8; FORWARD_CHUNK];
        loop {
            let n = match source.read(&mut chunk) {
                Ok(0) => return Ok(captured),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            captured.extend_from_slice(&chunk[..n]);
            // The original destination going away must not stop the drain.
            let _ = sink.write_all(&chunk[..n]);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
