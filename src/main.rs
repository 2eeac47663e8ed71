//! Batch head pose annotator for 68-point landmark records.

use anyhow::{Context, Result};
use clap::Parser;
use head_pose_annotator::{batch::run_batch, cli::Args, config::Config};
use log::{error, info};

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(args.default_log_filter()));

    // Load configuration if provided
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config file {}", config_path.display()))?
    } else {
        Config::default()
    };
    args.apply_to(&mut config);

    if args.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let summary = run_batch(&args.roots, &config).inspect_err(|e| error!("Batch aborted: {e}"))?;

    info!(
        "Done: {} of {} records annotated",
        summary.annotated,
        summary.total()
    );

    Ok(())
}
