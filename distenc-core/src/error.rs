// ============================================================================
// distenc-core/src/error.rs
// ============================================================================
//
// ERROR HANDLING: Custom Error Types and Result Definitions
//
// This module defines the error hierarchy shared by every component of the
// distenc-core library: the process runner, media probe, crop detector, zone
// planner, command builder, encoder driver, claim registry, and scheduler.
//
// Each variant corresponds to one of the error kinds named in the design
// (DependencyMissing, ProbeFailed, DurationMissing, CropDetectFailed,
// ProcessFailed, Timeout, ClaimLost, Interrupted), plus the ambient Io,
// PathError, and JsonParseError kinds used by the infrastructure layer.

use std::io;
use std::process::ExitStatus;
use thiserror::Error;

/// The kind of failure that occurred while running an external command.
#[derive(Debug)]
pub enum CommandErrorKind {
    /// Failed to spawn the child process at all.
    Start(io::Error),
    /// Failed while waiting for the child to exit.
    Wait(io::Error),
    /// Child exited with a non-zero status.
    Failed(ExitStatus, String),
    /// The deadline elapsed before the child exited.
    Timeout(u64),
}

#[derive(Debug)]
pub struct CommandError {
    pub command: String,
    pub kind: CommandErrorKind,
}

/// Comprehensive error type for the distenc-core library.
#[derive(Error, Debug)]
pub enum CoreError {
    // ---- I/O and Filesystem Errors ----
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Path error: {0}")]
    PathError(String),

    // ---- External Command Errors ----
    #[error("{}", format_command_error(.0))]
    Command(CommandError),

    // ---- Startup Errors ----
    #[error("Required dependency missing: {0}")]
    DependencyMissing(String),

    // ---- Probe Errors ----
    /// A single probe sub-query (frame rate, HDR, chapters, subtitles) failed.
    /// Non-fatal on its own: the caller converts this to an absent field.
    #[error("Probe sub-query failed for {input}: {message}")]
    ProbeFailed { input: String, message: String },

    /// Duration could not be determined. Fatal for the job.
    #[error("Duration missing for {0}")]
    DurationMissing(String),

    // ---- Crop Detection Errors ----
    #[error("Crop detection failed for {0}: no sample succeeded")]
    CropDetectFailed(String),

    // ---- Parsing Errors ----
    #[error("Failed to parse JSON output: {0}")]
    JsonParseError(String),

    // ---- Job Lifecycle Errors ----
    /// Another worker already holds (or has completed) this job's token.
    /// Recoverable: the caller treats the job as SKIPPED.
    #[error("Claim lost for {0}")]
    ClaimLost(String),

    /// Shutdown was requested (SIGINT/SIGTERM) before or during processing.
    #[error("Interrupted")]
    Interrupted,

    // ---- General ----
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("No input files found")]
    NoFilesFound,
}

pub type CoreResult<T> = Result<T, CoreError>;

fn format_command_error(err: &CommandError) -> String {
    match &err.kind {
        CommandErrorKind::Start(io_err) => {
            format!("Failed to execute {}: {}", err.command, io_err)
        }
        CommandErrorKind::Wait(io_err) => {
            format!("Failed to wait for {}: {}", err.command, io_err)
        }
        CommandErrorKind::Failed(status, stderr) => {
            format!(
                "Command {} failed with status {}. Stderr: {}",
                err.command, status, stderr
            )
        }
        CommandErrorKind::Timeout(secs) => {
            format!("Command {} timed out after {}s", err.command, secs)
        }
    }
}

pub fn command_start_error(command: impl Into<String>, error: io::Error) -> CoreError {
    CoreError::Command(CommandError {
        command: command.into(),
        kind: CommandErrorKind::Start(error),
    })
}

pub fn command_wait_error(command: impl Into<String>, error: io::Error) -> CoreError {
    CoreError::Command(CommandError {
        command: command.into(),
        kind: CommandErrorKind::Wait(error),
    })
}

pub fn command_failed_error(
    command: impl Into<String>,
    status: ExitStatus,
    stderr: impl Into<String>,
) -> CoreError {
    CoreError::Command(CommandError {
        command: command.into(),
        kind: CommandErrorKind::Failed(status, stderr.into()),
    })
}

pub fn command_timeout_error(command: impl Into<String>, secs: u64) -> CoreError {
    CoreError::Command(CommandError {
        command: command.into(),
        kind: CommandErrorKind::Timeout(secs),
    })
}
