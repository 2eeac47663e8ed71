//! Batch annotation of landmark records next to face images.
//!
//! Each image under a root directory is expected to have a sibling landmark
//! record with the same stem and a `.txt` extension. Records are estimated in
//! parallel and the pose line is appended to every record that succeeds.
//! Records that fail on their own are logged and skipped; configuration and
//! calibration errors abort the whole batch.

use crate::{
    config::{BatchConfig, Config, RecordConfig},
    constants::RECORD_EXTENSION,
    landmark_file::{append_pose, read_record},
    overlay::draw_annotations,
    pose_estimation::{PoseEstimate, PoseEstimator},
    rotation::EulerAngles,
    Error, Result,
};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Counts of what a batch run did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    /// Records that received a pose line
    pub annotated: usize,
    /// Records that already carried a pose line
    pub already_annotated: usize,
    /// Records left untouched, with the reason
    pub skipped: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    /// Number of images seen
    #[must_use]
    pub fn total(&self) -> usize {
        self.annotated + self.already_annotated + self.skipped.len()
    }
}

/// What happened to a single record.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// A pose line was appended
    Annotated(EulerAngles),
    /// The record already had a pose line and was left as is
    AlreadyAnnotated,
    /// The record already had a pose line and was re-estimated without writing
    Verified {
        /// Pose line found in the record
        recorded: EulerAngles,
        /// Freshly estimated pose, rounded like a pose line
        estimated: EulerAngles,
    },
}

/// List images directly inside `root` whose extension is one of `extensions`, sorted by path.
///
/// Extensions compare case-insensitively.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory cannot be read.
pub fn discover_images(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)));
        if matches {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Landmark record belonging to an image
#[must_use]
pub fn record_path_for(image: &Path) -> PathBuf {
    image.with_extension(RECORD_EXTENSION)
}

/// Runs pose annotation over directories of images and landmark records.
#[derive(Debug)]
pub struct BatchRunner {
    estimator: PoseEstimator,
    record: RecordConfig,
    batch: BatchConfig,
}

impl BatchRunner {
    /// Create a runner from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate, or the
    /// overlay directory cannot be created.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        if let Some(dir) = &config.batch.annotate_dir {
            fs::create_dir_all(dir)?;
        }
        Ok(Self {
            estimator: PoseEstimator::new(config.camera, config.solver)?,
            record: config.record,
            batch: config.batch.clone(),
        })
    }

    /// Estimate and annotate the record belonging to one image.
    ///
    /// # Errors
    ///
    /// Returns any error raised while reading the record, estimating the
    /// pose, appending the pose line or writing the overlay.
    pub fn process_sample(&self, image: &Path) -> Result<SampleOutcome> {
        let record_path = record_path_for(image);
        let record = read_record(&record_path, &self.record)?;

        if let Some(recorded) = record.pose {
            if self.batch.skip_annotated {
                return Ok(SampleOutcome::AlreadyAnnotated);
            }
            let estimated = self.estimator.estimate_from_landmarks(&record.landmarks)?.euler_angles.rounded();
            return Ok(SampleOutcome::Verified { recorded, estimated });
        }

        // Decode the image before touching the record so a broken image leaves it unannotated.
        let mut canvas = match &self.batch.annotate_dir {
            Some(_) => Some(image::open(image)?.to_rgb8()),
            None => None,
        };

        let pose = self.estimator.estimate_from_landmarks(&record.landmarks)?;
        debug!(
            "{}: {} (rmse {:.3} px, {} evaluations)",
            record_path.display(),
            pose.euler_angles,
            pose.reprojection_rmse,
            pose.evaluations
        );
        append_pose(&record_path, &pose.euler_angles)?;

        if let (Some(canvas), Some(dir)) = (canvas.as_mut(), &self.batch.annotate_dir) {
            if let Err(e) = self.save_overlay(canvas, dir, image, &record.landmarks, &pose) {
                warn!("Overlay for {} not written: {e}", image.display());
            }
        }

        Ok(SampleOutcome::Annotated(pose.euler_angles))
    }

    fn save_overlay(
        &self,
        canvas: &mut image::RgbImage,
        dir: &Path,
        image: &Path,
        landmarks: &[(i32, i32)],
        pose: &PoseEstimate,
    ) -> Result<()> {
        let file_name = image
            .file_name()
            .ok_or_else(|| Error::OutOfRange(format!("{} has no file name", image.display())))?;
        draw_annotations(canvas, landmarks, pose, self.estimator.intrinsics());
        canvas.save(dir.join(file_name))?;
        Ok(())
    }

    /// Annotate every image found directly under each root.
    ///
    /// # Errors
    ///
    /// Returns an error if a root cannot be listed, the worker pool cannot
    /// be built, or a sample fails with a fatal error.
    pub fn run(&self, roots: &[PathBuf]) -> Result<BatchSummary> {
        let mut images = Vec::new();
        for root in roots {
            let found = discover_images(root, &self.batch.extensions)?;
            info!("Found {} images in {}", found.len(), root.display());
            images.extend(found);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.batch.jobs)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build worker pool: {e}")))?;

        let outcomes: Vec<(PathBuf, Result<SampleOutcome>)> = pool.install(|| {
            images
                .into_par_iter()
                .map(|image| {
                    let outcome = self.process_sample(&image);
                    (image, outcome)
                })
                .collect()
        });

        let mut summary = BatchSummary::default();
        for (image, outcome) in outcomes {
            match outcome {
                Ok(SampleOutcome::Annotated(_)) => summary.annotated += 1,
                Ok(SampleOutcome::AlreadyAnnotated) => summary.already_annotated += 1,
                Ok(SampleOutcome::Verified { recorded, estimated }) => {
                    if recorded != estimated {
                        warn!(
                            "{}: recorded pose {recorded} differs from estimate {estimated}",
                            record_path_for(&image).display()
                        );
                    }
                    summary.already_annotated += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Skipping {}: {e}", record_path_for(&image).display());
                    summary.skipped.push((image, e.to_string()));
                }
            }
        }

        info!(
            "Annotated {} records, {} already annotated, {} skipped",
            summary.annotated,
            summary.already_annotated,
            summary.skipped.len()
        );
        Ok(summary)
    }
}

/// Annotate all records under `roots` with the given configuration.
///
/// # Errors
///
/// See [`BatchRunner::new`] and [`BatchRunner::run`].
pub fn run_batch(roots: &[PathBuf], config: &Config) -> Result<BatchSummary> {
    BatchRunner::new(config)?.run(roots)
}
