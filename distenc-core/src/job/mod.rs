// ============================================================================
// distenc-core/src/job/mod.rs
// ============================================================================
//
// JOB: lifecycle record, filesystem claim registry, and the per-job encoder
// state machine.

mod driver;
mod registry;
mod types;

pub use driver::{DriverConfig, run_job};
pub use registry::{
    ClaimOutcome, cleanup_scratch_files, error_log_path_for, release_on_completed,
    release_on_failed, token_path_for, try_claim,
};
pub use types::{EncodingJob, JobStatus};
