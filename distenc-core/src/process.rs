// ============================================================================
// distenc-core/src/process.rs
// ============================================================================
//
// PROCESS RUNNER: External Process Execution and Abstraction
//
// Spawns external processes (the probe and transcoder binaries) with a fixed
// environment, captures their stdout/stderr, and enforces a deadline. This is
// the single suspension point every other component in the pipeline funnels
// through: `ProcessRunner::run` and `ProcessRunner::run_to_sink` are the only
// places distenc-core awaits a child process.
//
// Modeled as a trait so the encoder driver, probe, and crop detector can be
// exercised in tests against a `MockProcessRunner` instead of real binaries.

use crate::error::{CoreResult, command_failed_error, command_start_error, command_timeout_error};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Result of running an external command to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Abstraction over "spawn a named external command with these args, wait up
/// to `timeout`, and give me back the exit status plus captured output."
#[async_trait::async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program args...`, capturing stdout/stderr into memory.
    ///
    /// Fails with `CoreError::Command` (kind `Failed`) when the exit code is
    /// non-zero, or (kind `Timeout`) when `timeout` elapses first.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> CoreResult<ProcessOutput>;

    /// Run `program args...`, appending combined stdout+stderr to `sink_path`
    /// as it is produced, instead of buffering it in memory. Used by the
    /// encoder driver so multi-gigabyte encode logs do not live on the heap.
    async fn run_to_sink(
        &self,
        program: &str,
        args: &[String],
        sink_path: &Path,
        timeout: Option<Duration>,
    ) -> CoreResult<ExitStatus>;
}

/// Default timeout for probe sub-queries (§5).
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(300);
/// Default timeout for a single crop-detection sample (§5).
pub const CROP_SAMPLE_TIMEOUT: Duration = Duration::from_secs(60);

/// `ProcessRunner` backed by real child processes via `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Builds a `Command` with a fixed environment: the current environment
    /// plus `TERM=dumb` (so the child never emits interactive control
    /// sequences into a captured log) and `MALLOC_ARENA_MAX=2` (discourages
    /// glibc's per-thread arena fragmentation in long-running encoder
    /// children). No shell interposition: args are passed directly to exec.
    fn build_command(program: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.env("TERM", "dumb");
        cmd.env("MALLOC_ARENA_MAX", "2");
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait::async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> CoreResult<ProcessOutput> {
        let mut cmd = Self::build_command(program, args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| command_start_error(program, e))?;

        let wait_fut = child.wait_with_output();
        let output = match timeout {
            Some(d) => match tokio::time::timeout(d, wait_fut).await {
                Ok(res) => res,
                Err(_) => return Err(command_timeout_error(program, d.as_secs())),
            },
            None => wait_fut.await,
        };

        let output = output.map_err(|e| crate::error::command_wait_error(program, e))?;

        if !output.status.success() {
            return Err(command_failed_error(
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        Ok(ProcessOutput {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    async fn run_to_sink(
        &self,
        program: &str,
        args: &[String],
        sink_path: &Path,
        timeout: Option<Duration>,
    ) -> CoreResult<ExitStatus> {
        let mut cmd = Self::build_command(program, args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| command_start_error(program, e))?;
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        let mut sink = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(sink_path)
            .await?;

        let copy_stdout = async {
            if let Some(mut s) = stdout.take() {
                let mut buf = Vec::new();
                tokio::io::AsyncReadExt::read_to_end(&mut s, &mut buf).await?;
                sink.write_all(&buf).await?;
            }
            Ok::<(), std::io::Error>(())
        };

        let wait_fut = async {
            let _ = copy_stdout.await;
            if let Some(mut s) = stderr.take() {
                let mut buf = Vec::new();
                tokio::io::AsyncReadExt::read_to_end(&mut s, &mut buf).await?;
                sink.write_all(&buf).await?;
            }
            child.wait().await
        };

        let status = match timeout {
            Some(d) => match tokio::time::timeout(d, wait_fut).await {
                Ok(res) => res,
                Err(_) => {
                    return Err(command_timeout_error(program, d.as_secs()));
                }
            },
            None => wait_fut.await,
        };

        status.map_err(|e| crate::error::command_wait_error(program, e))
    }
}

/// In-memory `ProcessRunner` fakes used by this crate's own test suite and
/// exposed to downstream crates under the `test-mocks` feature, mirroring
/// the teacher's external-tool mock pattern.
#[cfg(any(test, feature = "test-mocks"))]
pub mod mocks {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::sync::Mutex;

    /// A canned `ProcessRunner` response: either a successful output or a
    /// command failure, returned regardless of which program/args were
    /// requested. Calls are recorded for assertions.
    pub struct MockProcessRunner {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        should_fail: bool,
        pub calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl MockProcessRunner {
        pub fn with_stdout(stdout: impl Into<String>) -> Self {
            Self {
                stdout: stdout.into().into_bytes(),
                stderr: Vec::new(),
                should_fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                stdout: Vec::new(),
                stderr: b"mock failure".to_vec(),
                should_fail: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, program: &str, args: &[String]) {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_string(), args.to_vec()));
        }
    }

    #[async_trait::async_trait]
    impl ProcessRunner for MockProcessRunner {
        async fn run(
            &self,
            program: &str,
            args: &[String],
            _timeout: Option<Duration>,
        ) -> CoreResult<ProcessOutput> {
            self.record(program, args);
            if self.should_fail {
                return Err(command_failed_error(
                    program,
                    ExitStatus::from_raw(256),
                    String::from_utf8_lossy(&self.stderr).into_owned(),
                ));
            }
            Ok(ProcessOutput {
                status: ExitStatus::from_raw(0),
                stdout: self.stdout.clone(),
                stderr: self.stderr.clone(),
            })
        }

        async fn run_to_sink(
            &self,
            program: &str,
            args: &[String],
            sink_path: &Path,
            _timeout: Option<Duration>,
        ) -> CoreResult<ExitStatus> {
            self.record(program, args);
            if !self.stdout.is_empty() || !self.stderr.is_empty() {
                tokio::fs::write(sink_path, [&self.stdout[..], &self.stderr[..]].concat())
                    .await?;
            }
            if self.should_fail {
                return Err(command_failed_error(
                    program,
                    ExitStatus::from_raw(256),
                    String::from_utf8_lossy(&self.stderr).into_owned(),
                ));
            }
            Ok(ExitStatus::from_raw(0))
        }
    }
}
