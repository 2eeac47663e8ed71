//! Configuration management for the head pose annotator

use crate::{
    camera::CameraIntrinsics,
    constants::{
        DEFAULT_FTOL, DEFAULT_GTOL, DEFAULT_HEADER_LINES, DEFAULT_IMAGE_EXTENSIONS, DEFAULT_MAX_ITERATIONS,
        DEFAULT_XTOL, NUM_FACIAL_LANDMARKS,
    },
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera the landmarks were captured with
    pub camera: CameraIntrinsics,

    /// Pose solver configuration
    pub solver: SolverConfig,

    /// Landmark record layout
    pub record: RecordConfig,

    /// Batch processing configuration
    pub batch: BatchConfig,
}

/// Levenberg-Marquardt stopping criteria
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Evaluation budget, multiplied by the parameter count plus one
    pub max_iterations: usize,

    /// Relative tolerance on the cost reduction
    pub ftol: f64,

    /// Relative tolerance on the parameter step
    pub xtol: f64,

    /// Orthogonality tolerance between residuals and Jacobian columns
    pub gtol: f64,
}

/// Landmark record layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    /// Lines preceding the first coordinate line
    pub header_lines: usize,

    /// Number of coordinate lines
    pub point_count: usize,
}

/// Batch processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Image file extensions to scan for, without the dot
    pub extensions: Vec<String>,

    /// Leave records that already end with a pose line untouched
    pub skip_annotated: bool,

    /// Worker threads, 0 for one per core
    pub jobs: usize,

    /// Write landmark and pose overlays into this directory
    pub annotate_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: CameraIntrinsics::calibrated(),
            solver: SolverConfig::default(),
            record: RecordConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            ftol: DEFAULT_FTOL,
            xtol: DEFAULT_XTOL,
            gtol: DEFAULT_GTOL,
        }
    }
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            header_lines: DEFAULT_HEADER_LINES,
            point_count: NUM_FACIAL_LANDMARKS,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_IMAGE_EXTENSIONS.iter().map(ToString::to_string).collect(),
            skip_annotated: true,
            jobs: 0,
            annotate_dir: None,
        }
    }
}

impl SolverConfig {
    /// Validate stopping criteria
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] for a zero budget or negative / non-finite tolerances.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::ConfigError(
                "Solver max_iterations must be greater than 0".to_string(),
            ));
        }
        for (name, value) in [("ftol", self.ftol), ("xtol", self.xtol), ("gtol", self.gtol)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::ConfigError(format!(
                    "Solver {name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML for this schema.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the text is not valid YAML for this schema.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Serialize configuration to YAML text
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCalibration`] for malformed camera parameters and
    /// [`Error::ConfigError`] for any other invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.camera.validate()?;
        self.solver.validate()?;

        if self.record.point_count != NUM_FACIAL_LANDMARKS {
            return Err(Error::ConfigError(format!(
                "Record point_count must be {NUM_FACIAL_LANDMARKS}, got {}",
                self.record.point_count
            )));
        }

        if self.batch.extensions.is_empty() {
            return Err(Error::ConfigError(
                "At least one image extension is required".to_string(),
            ));
        }
        if let Some(ext) = self.batch.extensions.iter().find(|e| e.is_empty() || e.starts_with('.')) {
            return Err(Error::ConfigError(format!(
                "Image extensions are given without a leading dot, got {ext:?}"
            )));
        }
        if let Some(dir) = &self.batch.annotate_dir {
            if dir.is_file() {
                return Err(Error::ConfigError(format!(
                    "Annotation directory is a file: {}",
                    dir.display()
                )));
            }
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head Pose Annotator Configuration

# Calibrated camera (row-major matrix; distortion k1 k2 p1 p2 k3)
camera:
  camera_matrix: [653.0839199346667, 0.0, 319.5, 0.0, 653.0839199346667, 239.5, 0.0, 0.0, 1.0]
  distortion: [0.0708346336844071, 0.06914019373717535, 0.0, 0.0, -1.3073460323689292]

# Levenberg-Marquardt stopping criteria
solver:
  max_iterations: 100
  ftol: 1.0e-12
  xtol: 1.0e-12
  gtol: 0.0

# Landmark record layout
record:
  header_lines: 3
  point_count: 68

# Batch processing
batch:
  extensions: ["jpg", "png"]
  skip_annotated: true
  jobs: 0
  annotate_dir: null
"#;
