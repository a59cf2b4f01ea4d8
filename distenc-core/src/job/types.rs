// ============================================================================
// distenc-core/src/job/types.rs
// ============================================================================
//
// JOB DATA MODEL: EncodingJob and its lifecycle.

use std::path::PathBuf;
use std::time::Instant;

/// Where an `EncodingJob` currently stands in its lifecycle (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

/// Lifecycle record for one input to output pair. `token_path` and
/// `scratch_prefix` are set only after a successful claim.
#[derive(Debug, Clone)]
pub struct EncodingJob {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub token_path: Option<PathBuf>,
    pub scratch_prefix: Option<PathBuf>,
    pub status: JobStatus,
    pub start_time: Option<Instant>,
    pub end_time: Option<Instant>,
    pub error_message: Option<String>,
}

impl EncodingJob {
    pub fn new(input_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            input_path,
            output_path,
            token_path: None,
            scratch_prefix: None,
            status: JobStatus::Pending,
            start_time: None,
            end_time: None,
            error_message: None,
        }
    }

    pub fn mark_claimed(&mut self, token_path: PathBuf, scratch_prefix: PathBuf) {
        self.token_path = Some(token_path);
        self.scratch_prefix = Some(scratch_prefix);
        self.status = JobStatus::InProgress;
        self.start_time = Some(Instant::now());
    }

    pub fn mark_completed(&mut self) {
        self.status = JobStatus::Completed;
        self.end_time = Some(Instant::now());
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error_message = Some(message.into());
        self.end_time = Some(Instant::now());
    }

    pub fn mark_skipped(&mut self) {
        self.status = JobStatus::Skipped;
        self.end_time = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_starts_pending() {
        let job = EncodingJob::new("in.mkv".into(), "out.mkv".into());
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.error_message.is_none());
    }

    #[test]
    fn failed_carries_error_message() {
        let mut job = EncodingJob::new("in.mkv".into(), "out.mkv".into());
        job.mark_failed("boom");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("boom"));
    }
}
