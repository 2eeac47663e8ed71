//! Command line arguments for the annotator binary

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

/// Append head pose angles to 68-point landmark records
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directories holding images and their landmark records
    #[arg(required_unless_present = "print_config")]
    pub roots: Vec<PathBuf>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Worker threads (0 for one per core)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Write landmark and pose overlays into this directory
    #[arg(long)]
    pub annotate_dir: Option<PathBuf>,

    /// Re-estimate records that already carry a pose and report disagreements
    #[arg(long)]
    pub include_annotated: bool,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,
}

impl Args {
    /// Log filter used when `RUST_LOG` is not set
    #[must_use]
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    /// Override configuration values given on the command line.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(jobs) = self.jobs {
            config.batch.jobs = jobs;
        }
        if let Some(dir) = &self.annotate_dir {
            config.batch.annotate_dir = Some(dir.clone());
        }
        if self.include_annotated {
            config.batch.skip_annotated = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["head-pose-annotator", "data"]).unwrap();
        assert_eq!(args.roots, vec![PathBuf::from("data")]);
        assert_eq!(args.jobs, None);
        assert!(!args.include_annotated);
        assert_eq!(args.default_log_filter(), "info");

        let mut config = Config::default();
        args.apply_to(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "head-pose-annotator",
            "-j",
            "3",
            "--annotate-dir",
            "out",
            "--include-annotated",
            "-d",
            "a",
            "b",
        ])
        .unwrap();
        assert_eq!(args.roots.len(), 2);
        assert_eq!(args.default_log_filter(), "debug");

        let mut config = Config::default();
        args.apply_to(&mut config);
        assert_eq!(config.batch.jobs, 3);
        assert_eq!(config.batch.annotate_dir, Some(PathBuf::from("out")));
        assert!(!config.batch.skip_annotated);
    }

    #[test]
    fn test_roots_required() {
        assert!(Args::try_parse_from(["head-pose-annotator"]).is_err());
        let args = Args::try_parse_from(["head-pose-annotator", "--print-config"]).unwrap();
        assert!(args.roots.is_empty());
    }

    #[test]
    fn test_invalid_jobs() {
        assert!(Args::try_parse_from(["head-pose-annotator", "-j", "many", "data"]).is_err());
    }
}
