//! Command-line argument parsing for distenc.
//!
//! Responsibilities:
//! - Define the command-line interface structure
//! - Parse and validate user-provided arguments
//!
//! Mirrors the flag set one cooperating worker process needs to join a
//! shared batch: where to find inputs, where to put outputs, where the
//! shared scratch/token directories live, and which preset to encode with.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "distenc - distributed batch H.265 transcoder",
    long_about = "Claims and encodes inputs from a shared filesystem alongside \
                  any number of cooperating worker processes, with no central \
                  broker: exclusive file creation on the token directory is \
                  the only coordination point."
)]
pub struct Cli {
    /// One or more input file paths to process.
    #[arg(
        short = 'i',
        long = "inputs",
        required_unless_present = "list_presets",
        num_args = 1..
    )]
    pub inputs: Vec<PathBuf>,

    /// Directory encoded outputs are written to.
    #[arg(short = 'o', long = "output-dir", required_unless_present = "list_presets")]
    pub output_dir: Option<PathBuf>,

    /// Directory for per-job scratch files (stats files, pass-1 logs).
    #[arg(short = 's', long = "scratch-dir", required_unless_present = "list_presets")]
    pub scratch_dir: Option<PathBuf>,

    /// Shared directory holding claim tokens. Must be reachable by every
    /// cooperating worker process.
    #[arg(short = 't', long = "token-dir", required_unless_present = "list_presets")]
    pub token_dir: Option<PathBuf>,

    /// Name of the preset section (`[preset_<name>]`) to encode with.
    #[arg(short = 'p', long = "preset", required_unless_present = "list_presets")]
    pub preset: Option<String>,

    /// Path to the preset/config file. Defaults to `distenc.ini` in the
    /// current directory.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Maximum number of concurrently encoding jobs.
    #[arg(short = 'j', long = "jobs", default_value_t = 1)]
    pub jobs: usize,

    /// Force one-pass encoding regardless of the preset's `crf_or_rate`.
    #[arg(short = '1', long = "one-pass")]
    pub one_pass: bool,

    /// Title-sequence zone rate, `"seconds,multiplier"`.
    #[arg(long = "title-rate")]
    pub title_rate: Option<String>,

    /// Closing-credits zone rate, `"seconds,multiplier"`.
    #[arg(long = "closing-rate")]
    pub closing_rate: Option<String>,

    /// Skip zone rewrites for inputs whose filename contains "E01".
    #[arg(long = "skip-rate-for-first-episodes")]
    pub skip_rate_for_first_episodes: bool,

    /// Print the preset names declared in the config file and exit.
    #[arg(short = 'l', long = "list-presets")]
    pub list_presets: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Write a timestamped log file to this directory instead of logging to
    /// stderr. Useful for a worker launched unattended by a process
    /// supervisor.
    #[arg(long = "log-dir")]
    pub log_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_minimal_required_flags() {
        let cli = Cli::parse_from([
            "distenc",
            "-i",
            "a.mkv",
            "-o",
            "out",
            "-s",
            "scratch",
            "-t",
            "tokens",
            "-p",
            "film",
        ]);
        assert_eq!(cli.inputs, vec![PathBuf::from("a.mkv")]);
        assert_eq!(cli.jobs, 1);
        assert!(!cli.one_pass);
    }

    #[test]
    fn parses_multiple_inputs_and_overrides() {
        let cli = Cli::parse_from([
            "distenc",
            "-i",
            "a.mkv",
            "b.mkv",
            "-o",
            "out",
            "-s",
            "scratch",
            "-t",
            "tokens",
            "-p",
            "film",
            "-j",
            "4",
            "--title-rate",
            "30,0.5",
        ]);
        assert_eq!(cli.inputs.len(), 2);
        assert_eq!(cli.jobs, 4);
        assert_eq!(cli.title_rate.as_deref(), Some("30,0.5"));
    }

    #[test]
    fn list_presets_does_not_require_job_flags() {
        let cli = Cli::parse_from(["distenc", "-l", "-c", "presets.ini"]);
        assert!(cli.list_presets);
        assert!(cli.inputs.is_empty());
        assert!(cli.output_dir.is_none());
        assert!(cli.scratch_dir.is_none());
        assert!(cli.token_dir.is_none());
        assert!(cli.preset.is_none());
    }
}
