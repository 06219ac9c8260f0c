//! Process-based site builder.
//!
//! Runs the configured build command with the package location and output
//! directory appended:
//!
//! ```text
//! python -m storytime.build <package> <output>
//! ```
//!
//! Each build is a fresh child process, so nothing the build imports or
//! caches survives into the next one.

use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, bail};

use super::{BuildRequest, BuildResult, BuilderFactory, CancellationToken, SiteBuilder};

/// How often a running child is polled for exit or cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Trailing stderr lines kept in a failure message.
const STDERR_TAIL_LINES: usize = 20;

/// Builder that shells out to an external build command.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandBuilder {
    /// Create from a command array (e.g. `["python", "-m", "storytime.build"]`).
    pub fn from_slice<S: AsRef<OsStr>>(cmd: &[S]) -> Self {
        let mut iter = cmd.iter();
        let program = iter
            .next()
            .map(|s| s.as_ref().to_owned())
            .unwrap_or_default();
        let args = iter.map(|s| s.as_ref().to_owned()).collect();
        Self { program, args }
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn spawn(&self, request: &BuildRequest) -> Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .arg(&request.package_location)
            .arg(&request.output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program_name()))
    }
}

impl SiteBuilder for CommandBuilder {
    fn warm_up(&mut self) -> Result<()> {
        if self.program.is_empty() {
            bail!("build command is empty");
        }
        which::which(&self.program)
            .with_context(|| format!("`{}` not found in PATH", self.program_name()))?;
        Ok(())
    }

    fn build(&mut self, request: &BuildRequest, cancel: &CancellationToken) -> BuildResult {
        let mut child = match self.spawn(request) {
            Ok(child) => child,
            Err(e) => return BuildResult::failure(format!("{e:#}")),
        };
        let stderr = child.stderr.take().map(spawn_reader);

        match wait_or_cancel(&mut child, cancel) {
            Ok(Some(status)) if status.success() => {
                // Drain so the reader thread exits.
                let _ = stderr.map(JoinHandle::join);
                BuildResult::success()
            }
            Ok(Some(status)) => {
                let output = stderr
                    .and_then(|h| h.join().ok())
                    .unwrap_or_default();
                let tail = stderr_tail(&output);
                if tail.is_empty() {
                    BuildResult::failure(format!("`{}` exited with {status}", self.program_name()))
                } else {
                    BuildResult::failure(format!(
                        "`{}` exited with {status}\n{tail}",
                        self.program_name()
                    ))
                }
            }
            // Reader is left detached: grandchildren may still hold the pipe.
            Ok(None) => BuildResult::failure("build cancelled"),
            Err(e) => BuildResult::failure(format!("failed waiting for build: {e}")),
        }
    }
}

/// Wait for exit, killing the child if the build is cancelled.
///
/// Returns `Ok(None)` when cancelled.
fn wait_or_cancel(child: &mut Child, cancel: &CancellationToken) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if cancel.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_reader(mut pipe: impl Read + Send + 'static) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn stderr_tail(output: &str) -> String {
    let lines: Vec<&str> = output.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Creates a fresh [`CommandBuilder`] for each worker.
#[derive(Debug, Clone)]
pub struct CommandFactory {
    command: Vec<String>,
}

impl CommandFactory {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl BuilderFactory for CommandFactory {
    fn create(&self) -> Box<dyn SiteBuilder> {
        Box::new(CommandBuilder::from_slice(&self.command))
    }
}
