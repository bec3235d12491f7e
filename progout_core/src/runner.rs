use std::io;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, warn};

use crate::ExecutionResult;
use crate::cache::Runner;
use crate::command::{CommandLine, CommandSpec};
use crate::error::{ExecError, Result};
use crate::split::split_words;

/// The shell used for specs with `shell` enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellProgram {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellProgram {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Default for ShellProgram {
    fn default() -> Self {
        if cfg!(target_os = "windows") {
            Self::new("cmd", vec!["/C".to_string()])
        } else {
            Self::new("/bin/sh", vec!["-c".to_string()])
        }
    }
}

/// Spawns child processes for command specs.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    shell: ShellProgram,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_shell(mut self, shell: ShellProgram) -> Self {
        self.shell = shell;
        self
    }

    /// Limit how long [`get_output`](Self::get_output) waits for a child.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn shell(&self) -> &ShellProgram {
        &self.shell
    }

    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Start `spec` as a child process.
    ///
    /// Standard output is always piped. Standard error is merged into the
    /// same pipe unless the spec hides it, in which case it gets a pipe of
    /// its own that the caller is expected to drain. A nonzero exit status is
    /// not an error; only failing to start the process is.
    pub fn execute(&self, spec: &CommandSpec) -> Result<ProcessHandle> {
        let argv = self.argv(spec)?;
        let Some((program, args)) = argv.split_first() else {
            return Err(ExecError::invalid_shape("command is empty"));
        };

        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        if let Some(dir) = spec.working_directory() {
            command.current_dir(dir);
        }

        let merged = if spec.hides_standard_error() {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
            None
        } else {
            merge_standard_error(&mut command)?
        };

        debug!("Spawning {program} with {} argument(s)", args.len());
        let mut child = command.spawn().map_err(|source| ExecError::SpawnFailure {
            program: program.clone(),
            source,
        })?;
        // The command still owns our copies of the merged pipe's write end;
        // the reader only sees EOF once they are gone.
        drop(command);

        let output = match (merged, child.stdout.take()) {
            (Some(merged), _) => merged,
            (None, Some(stdout)) => OutputStream::Stdout(stdout),
            (None, None) => return Err(io::Error::other("child stdout was not captured").into()),
        };
        let error = child.stderr.take();

        Ok(ProcessHandle {
            child,
            output,
            error,
        })
    }

    /// Run `spec` to completion and capture its trimmed standard output.
    pub async fn get_output(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        let handle = self.execute(spec)?;
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, handle.collect())
                .await
                .map_err(|_| {
                    warn!("Command timed out after {}s: {spec}", limit.as_secs_f64());
                    ExecError::Timeout(limit)
                })?,
            None => handle.collect().await,
        }?;
        debug!("Command exited with {}: {spec}", result.exit_code);
        Ok(result)
    }

    fn argv(&self, spec: &CommandSpec) -> Result<Vec<String>> {
        match spec.command() {
            CommandLine::Text(text) if spec.is_shell() => {
                let mut argv = Vec::with_capacity(self.shell.args.len() + 2);
                argv.push(self.shell.program.clone());
                argv.extend(self.shell.args.iter().cloned());
                argv.push(text.clone());
                Ok(argv)
            }
            CommandLine::Text(text) => split_words(text),
            CommandLine::Argv(argv) => Ok(argv.to_vec()),
        }
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn get_output(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        Self::get_output(self, spec).await
    }
}

#[cfg(unix)]
fn merge_standard_error(command: &mut Command) -> Result<Option<OutputStream>> {
    use std::os::fd::OwnedFd;
    use tokio::net::unix::pipe;

    let (reader, writer) = io::pipe()?;
    command.stdout(writer.try_clone()?).stderr(writer);
    let receiver = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))?;
    Ok(Some(OutputStream::Merged(receiver)))
}

#[cfg(not(unix))]
fn merge_standard_error(command: &mut Command) -> Result<Option<OutputStream>> {
    command.stdout(Stdio::piped()).stderr(Stdio::inherit());
    Ok(None)
}

/// The readable end of a child's output.
#[derive(Debug)]
pub enum OutputStream {
    /// Standard output alone.
    Stdout(ChildStdout),
    /// Standard output and standard error sharing one pipe.
    #[cfg(unix)]
    Merged(tokio::net::unix::pipe::Receiver),
}

impl AsyncRead for OutputStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Stdout(stdout) => Pin::new(stdout).poll_read(cx, buf),
            #[cfg(unix)]
            Self::Merged(receiver) => Pin::new(receiver).poll_read(cx, buf),
        }
    }
}

/// A running child process.
///
/// Dropping the handle before the child exits kills it; the runtime reaps it.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    output: OutputStream,
    error: Option<ChildStderr>,
}

impl ProcessHandle {
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub const fn output_stream(&mut self) -> &mut OutputStream {
        &mut self.output
    }

    /// The separate standard error pipe, present only when it is hidden.
    pub const fn error_stream(&mut self) -> Option<&mut ChildStderr> {
        self.error.as_mut()
    }

    /// Wait for the child to exit.
    ///
    /// Output that is not being read concurrently can fill the pipe and stall
    /// the child; [`ProcessRunner::get_output`] avoids that.
    pub async fn wait(&mut self) -> Result<i32> {
        let status = self.child.wait().await?;
        Ok(exit_code(status))
    }

    /// Kill the child and reap it.
    pub async fn kill(&mut self) -> Result<()> {
        self.child.kill().await?;
        Ok(())
    }

    /// Drain output (and discard hidden stderr) concurrently, then reap.
    async fn collect(mut self) -> Result<ExecutionResult> {
        let Self {
            child,
            output,
            error,
        } = &mut self;

        let mut captured = Vec::new();
        let discard = async {
            match error {
                Some(stderr) => tokio::io::copy(stderr, &mut tokio::io::sink())
                    .await
                    .map(drop),
                None => Ok(()),
            }
        };
        let (read, discarded) = tokio::join!(output.read_to_end(&mut captured), discard);
        read?;
        discarded?;

        let code = exit_code(child.wait().await?);
        ExecutionResult::from_captured(code, captured)
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}
