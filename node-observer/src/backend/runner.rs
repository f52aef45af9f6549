//! Command execution used by both backends.
//!
//! The live client and the database shell are both plain programs: arguments
//! in, optional stdin, exit status plus captured output back.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String], stdin: Option<&str>)
        -> io::Result<CommandOutput>;
}

/// Runs commands as child processes.
///
/// Backend calls have no client-side timeout beyond the poll budget, so a hung
/// child would stall the caller's poll loop; `timeout` bounds each command and
/// the child is killed when it expires.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    async fn spawn_and_collect(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> io::Result<CommandOutput> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            // Dropping the pipe closes stdin so shells read EOF and exit.
            drop(pipe);
        }

        let output = child.wait_with_output().await?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> io::Result<CommandOutput> {
        if log::log_enabled!(log::Level::Debug) {
            match stdin {
                Some(input) => debug!("cmd: echo '{}' | {} {}", input, program, args.join(" ")),
                None => debug!("cmd: {} {}", program, args.join(" ")),
            }
        }

        let start = std::time::Instant::now();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.spawn_and_collect(program, args, stdin))
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("'{}' did not finish within {:?}", program, limit),
                    )
                })?,
            None => self.spawn_and_collect(program, args, stdin).await,
        };

        if log::log_enabled!(log::Level::Debug) {
            debug!("cmd duration: {:.3} sec", start.elapsed().as_secs_f64());
        }
        result
    }
}
