// ============================================================================
// distenc-core/src/discovery.rs
// ============================================================================
//
// INPUT DISCOVERY: Validating the `-i/--inputs` List
//
// Unlike a directory scan, `--inputs` names its files explicitly; discovery's
// job here is just to drop anything that isn't a regular file, logging a
// warning for each (§4.8), rather than to search a filesystem tree.
//
// AI-ASSISTANT-INFO: kept distinct from the scheduler's job construction so
// the "what counts as processable" rule can be tested without a full
// SchedulerConfig.

use std::path::{Path, PathBuf};

/// Filters `candidates` down to regular files, warning about anything
/// dropped (missing path, directory, symlink to nowhere, etc).
pub fn discover_processable_inputs(candidates: &[PathBuf]) -> Vec<PathBuf> {
    candidates
        .iter()
        .filter(|path| {
            if path.is_file() {
                true
            } else {
                log::warn!("dropping non-file input: {}", path.display());
                false
            }
        })
        .cloned()
        .collect()
}

/// The output path an input maps to: same file name, under `output_dir`.
pub fn output_path_for(input_path: &Path, output_dir: &Path) -> Option<PathBuf> {
    Some(output_dir.join(input_path.file_name()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_missing_and_directory_entries() {
        let dir = tempfile::tempdir().unwrap();
        let real_file = dir.path().join("a.mkv");
        std::fs::write(&real_file, b"x").unwrap();
        let missing = dir.path().join("missing.mkv");
        let subdir = dir.path().join("subdir");
        std::fs::create_dir(&subdir).unwrap();

        let kept = discover_processable_inputs(&[real_file.clone(), missing, subdir]);
        assert_eq!(kept, vec![real_file]);
    }

    #[test]
    fn output_path_preserves_file_name() {
        let out = output_path_for(Path::new("/in/Show.mkv"), Path::new("/out")).unwrap();
        assert_eq!(out, PathBuf::from("/out/Show.mkv"));
    }
}
