// ============================================================================
// distenc-cli/src/logging.rs
// ============================================================================
//
// LOGGING SETUP
//
// Two mutually exclusive sinks, exactly one of which becomes the process's
// global logger: `env_logger` to stderr for ordinary interactive runs, where
// `RUST_LOG` keeps working the way every other Rust tool honors it; or
// `log4rs` to a timestamped file under `--scratch-dir/logs` when the caller
// wants an on-disk record instead (e.g. a worker launched unattended by a
// process supervisor). `-v/--verbose` raises the console default filter one
// notch when `RUST_LOG` is unset.

use anyhow::Result;
use env_logger::Env;
use log::LevelFilter;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;

/// Returns the current local timestamp formatted for log file names.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Initializes logging for the process. `log_file_dir` selects the sink:
/// `Some(dir)` installs the `log4rs` file appender under `dir`; `None`
/// installs `env_logger` against stderr.
pub fn init_logging(verbose: bool, log_file_dir: Option<&Path>) -> Result<()> {
    match log_file_dir {
        Some(dir) => init_file_logging(dir, if verbose { LevelFilter::Debug } else { LevelFilter::Info }),
        None => {
            init_console_logging(verbose);
            Ok(())
        }
    }
}

fn init_console_logging(verbose: bool) {
    let default_filter = if verbose { "distenc=debug" } else { "distenc=info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())
        })
        .init();
}

fn init_file_logging(log_dir: &Path, level: LevelFilter) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(format!("distenc_run_{}.log", timestamp()));

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] {m}{n}",
        )))
        .build(&log_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(file_appender)))
        .build(Root::builder().appender("file").build(level))?;

    log4rs::init_config(config)?;
    Ok(())
}
