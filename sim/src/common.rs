//! Common utility functions for the simulation binary.
//!
//! This module contains:
//! - Logger initialization
//! - Output path validation and per-trial file naming
//! - Summary statistics across Monte Carlo trials

use std::error::Error;
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

/// Initialize the logger with the specified configuration.
///
/// # Arguments
/// * `log_level` - Log level string (off, error, warn, info, debug, trace)
/// * `log_file` - Optional path to log file (logs to stderr if None)
///
/// # Errors
/// Returns an error if the log file cannot be opened or logger initialization fails.
pub fn init_logger(log_level: &str, log_file: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    use std::io::Write;

    let level = log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
        log::LevelFilter::Info
    });

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Some(log_path) = log_file {
        ensure_parent_dir(log_path)?;
        let target = Box::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.try_init()?;
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Validate an output file path, creating its parent directory if needed.
///
/// # Errors
/// Returns an error if the path names an existing directory or the parent cannot be created.
pub fn validate_output_path(output: &Path) -> Result<(), Box<dyn Error>> {
    if output.is_dir() {
        return Err(format!(
            "Output path '{}' is a directory; expected a file path.",
            output.display()
        )
        .into());
    }
    ensure_parent_dir(output)
}

/// Output path for one trial of a multi-trial run: `{stem}_trial{NNN}.{ext}`.
pub fn trial_output_path(output: &Path, trial: usize) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("results");
    let file_name = match output.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{stem}_trial{trial:03}.{ext}"),
        None => format!("{stem}_trial{trial:03}"),
    };
    output.with_file_name(file_name)
}

/// Spread of the final-window estimation error across independent trials.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialSummary {
    pub trials: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl TrialSummary {
    pub fn from_errors(errors: &[f64]) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        let n = errors.len() as f64;
        let mean = errors.iter().sum::<f64>() / n;
        let variance = errors.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
        Some(TrialSummary {
            trials: errors.len(),
            mean,
            std_dev: variance.sqrt(),
            min: errors.iter().copied().fold(f64::INFINITY, f64::min),
            max: errors.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

impl Display for TrialSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} trials: mean error {:.3} (std {:.3}, min {:.3}, max {:.3})",
            self.trials, self.mean, self.std_dev, self.min, self.max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_validate_output_path_creates_parent() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("nested").join("run.csv");
        validate_output_path(&output).unwrap();
        assert!(output.parent().unwrap().exists());
    }

    #[test]
    fn test_validate_output_path_rejects_directory() {
        let dir = tempdir().unwrap();
        assert!(validate_output_path(dir.path()).is_err());
    }

    #[test]
    fn test_trial_output_path() {
        let path = trial_output_path(Path::new("out/run.csv"), 7);
        assert_eq!(path, PathBuf::from("out/run_trial007.csv"));
        let bare = trial_output_path(Path::new("run"), 12);
        assert_eq!(bare, PathBuf::from("run_trial012"));
    }

    #[test]
    fn test_trial_summary() {
        let summary = TrialSummary::from_errors(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(summary.trials, 3);
        assert!((summary.mean - 2.0).abs() < 1e-12);
        assert!((summary.std_dev - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 3.0);
        assert!(summary.to_string().starts_with("3 trials"));
        assert!(TrialSummary::from_errors(&[]).is_none());
    }
}
