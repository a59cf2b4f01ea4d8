// ============================================================================
// distenc-core/src/job/registry.rs
// ============================================================================
//
// JOB CLAIM REGISTRY: Filesystem-Atomic Mutual Exclusion
//
// The claim protocol (§4.7) is the system's only cross-process synchronization
// primitive: exclusive file creation (`O_EXCL`, i.e. `create_new(true)`) on a
// shared filesystem. No broker, database, or network round-trip is involved;
// this is deliberate (§1 Non-goals) and must hold across NFS/SMB mounts that
// honor O_EXCL semantics.
//
// AI-ASSISTANT-INFO: at most one worker at any instant holds a token file at
// `token_path` whose status is not `.error_log` and whose output does not yet
// exist (§4.7 cross-worker invariant).

use crate::error::CoreResult;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Outcome of attempting to claim a job.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// This worker now exclusively owns the job; encode it.
    Claimed {
        token_path: PathBuf,
        scratch_prefix: PathBuf,
    },
    /// Output already existed, or another worker holds the token. The
    /// caller marks the job SKIPPED without side effects beyond the
    /// idempotent done-marker touch already performed here.
    NotClaimed,
}

/// Computes `token_dir / <input_basename>.token`.
pub fn token_path_for(token_dir: &Path, input_path: &Path) -> PathBuf {
    let basename = input_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input_path.to_string_lossy().into_owned());
    token_dir.join(format!("{basename}.token"))
}

/// Generates a scratch-file prefix unique to this claim attempt, under
/// `scratch_dir`, so concurrent jobs never collide and cleanup-by-glob
/// (`<scratch_prefix>*`) only ever matches this job's own files.
fn unique_scratch_prefix(scratch_dir: &Path, input_path: &Path) -> PathBuf {
    let stem = input_path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "job".to_string());
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    scratch_dir.join(format!("{stem}_{suffix}"))
}

/// Attempts to claim `input_path` against `output_path`, using `token_dir`
/// and `scratch_dir` for bookkeeping. Step 2/3 of §4.7.
pub async fn try_claim(
    token_dir: &Path,
    scratch_dir: &Path,
    input_path: &Path,
    output_path: &Path,
) -> CoreResult<ClaimOutcome> {
    let token_path = token_path_for(token_dir, input_path);

    if tokio::fs::try_exists(output_path).await.unwrap_or(false) {
        // Idempotent mark-done: touch an empty token so future scans see
        // this input as already handled, then report NOT_CLAIMED.
        let _ = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&token_path)
            .await;
        return Ok(ClaimOutcome::NotClaimed);
    }

    let mut file = match OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&token_path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Ok(ClaimOutcome::NotClaimed);
        }
        Err(e) => return Err(e.into()),
    };

    let pid = std::process::id();
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    file.write_all(format!("Claimed by PID {pid} at {epoch}\n").as_bytes())
        .await?;
    file.flush().await?;

    let scratch_prefix = unique_scratch_prefix(scratch_dir, input_path);
    // §4.7 step 3 / §6: the driver creates a uniquely named scratch file
    // whose path other scratch files (stats, cutree) are derived from and
    // whose prefix the cleanup glob matches against.
    tokio::fs::File::create(&scratch_prefix).await?;

    Ok(ClaimOutcome::Claimed { token_path, scratch_prefix })
}

/// Release on COMPLETED: the token stays put, now serving as the done
/// marker and audit trail (the driver has already appended the encoder log
/// to it by this point).
pub fn release_on_completed() {}

/// Release on FAILED: rename `token_path` to `<token>.error_log`. If the
/// rename itself fails, the token is deleted instead so other workers may
/// retry the input later (§4.7).
pub async fn release_on_failed(token_path: &Path) -> CoreResult<()> {
    let error_log_path = error_log_path_for(token_path);
    match tokio::fs::rename(token_path, &error_log_path).await {
        Ok(()) => Ok(()),
        Err(_) => {
            let _ = tokio::fs::remove_file(token_path).await;
            Ok(())
        }
    }
}

/// The `.error_log` path a failed token is renamed to.
pub fn error_log_path_for(token_path: &Path) -> PathBuf {
    let mut name = token_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".error_log");
    token_path.with_file_name(name)
}

/// Removes every scratch file matching `<scratch_prefix>*`, called
/// unconditionally on exit from the encoder driver regardless of outcome
/// (§4.6 step 4).
pub async fn cleanup_scratch_files(scratch_prefix: &Path) -> CoreResult<()> {
    let parent = scratch_prefix.parent().unwrap_or_else(|| Path::new("."));
    let prefix = scratch_prefix
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut entries = match tokio::fs::read_dir(parent).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if file_name.starts_with(prefix.as_str()) {
            let path = entry.path();
            if path.is_dir() {
                let _ = tokio::fs::remove_dir_all(&path).await;
            } else {
                let _ = tokio::fs::remove_file(&path).await;
            }
        }
    }

    Ok(())
}
