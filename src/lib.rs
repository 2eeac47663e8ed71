//! Head pose estimation from 68-point facial landmarks.
//!
//! This library recovers the rotation of a head relative to a calibrated
//! camera from a single set of 2D facial landmarks:
//! - A fixed 14-point 3D face model paired with landmark indices
//! - A Perspective-n-Point solver (linear initialisation followed by
//!   Levenberg-Marquardt refinement of the reprojection error)
//! - An RQ decomposition of `[R | t]` into pitch, yaw and roll
//!
//! On top of the solver sit a reader and append-only writer for landmark
//! record files, image overlays and a parallel batch annotator.
//!
//! The estimation pipeline consists of:
//! 1. Selecting the 14 model landmarks from the 68-point set
//! 2. Solving for the pose that projects the model onto them
//! 3. Decomposing the pose into Euler angles in degrees
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```no_run
//! use head_pose_annotator::{config::RecordConfig, landmark_file::read_record, pose_estimation::PoseEstimator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let estimator = PoseEstimator::default();
//!
//! // 68 landmarks in pixel coordinates
//! let landmarks = read_record("indoor_001.txt", &RecordConfig::default())?.landmarks;
//!
//! match estimator.estimate_from_landmarks(&landmarks) {
//!     Ok(pose) => println!(
//!         "Pitch: {:.2}°, Yaw: {:.2}°, Roll: {:.2}°",
//!         pose.euler_angles.pitch, pose.euler_angles.yaw, pose.euler_angles.roll
//!     ),
//!     // degenerate or non-converging samples carry no pose
//!     Err(e) if e.is_recoverable_per_sample() => eprintln!("No pose for this sample: {e}"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Annotating a Record File
//!
//! ```no_run
//! use head_pose_annotator::{
//!     config::RecordConfig,
//!     landmark_file::{append_pose, read_record},
//!     pose_estimation::PoseEstimator,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let record = read_record("indoor_001.txt", &RecordConfig::default())?;
//! if !record.is_annotated() {
//!     let pose = PoseEstimator::default().estimate_from_landmarks(&record.landmarks)?;
//!     append_pose("indoor_001.txt", &pose.euler_angles)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Batch Processing
//!
//! ```no_run
//! use head_pose_annotator::{batch::run_batch, config::Config};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::default();
//! config.batch.annotate_dir = Some(PathBuf::from("overlays"));
//!
//! let summary = run_batch(&[PathBuf::from("300W/01_Indoor")], &config)?;
//! println!("{} annotated, {} skipped", summary.annotated, summary.skipped.len());
//! # Ok(())
//! # }
//! ```

/// Camera intrinsics, distortion and point projection
pub mod camera;

/// 3D face model and landmark correspondence
pub mod face_model;

/// Rotation representations and RQ decomposition into Euler angles
pub mod rotation;

/// Head pose estimation module using `PnP` algorithm
pub mod pose_estimation;

/// Landmark record reading and pose line writing
pub mod landmark_file;

/// Landmark and pose cube overlays
pub mod overlay;

/// Parallel annotation of record directories
pub mod batch;

/// Command line interface definition
pub mod cli;

/// Utility functions for rounding and numeric conversions
pub mod utils;

/// Error types and result handling
pub mod error;

/// Constants used throughout the library
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
pub use pose_estimation::{estimate_pose, PoseEstimate, PoseEstimator};
pub use rotation::EulerAngles;
