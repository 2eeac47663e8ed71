//! Error types for the head pose annotator.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Input has the wrong shape (landmark count, mismatched 2D/3D lengths)
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Too few correspondences to constrain a pose
    #[error("Insufficient points: need at least {required} correspondences, got {actual}")]
    InsufficientPoints {
        /// Minimum number of correspondences the solver accepts
        required: usize,
        /// Number of correspondences supplied
        actual: usize,
    },

    /// Correspondences are coincident, collinear or non-finite
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// The iterative pose fit failed to converge to a usable pose
    #[error("Numerical divergence: {0}")]
    NumericalDivergence(String),

    /// Camera matrix or distortion coefficients are malformed
    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),

    /// Landmark record does not follow the expected layout
    #[error("Record format error at line {line}: {message}")]
    RecordFormat {
        /// 1-based line number of the offending line
        line: usize,
        /// What was wrong with it
        message: String,
    },

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding, encoding or saving failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Whether the error invalidates every subsequent call, not just the current sample.
    ///
    /// A batch must stop when this returns `true`.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidCalibration(_) | Self::ConfigError(_))
    }

    /// Whether a batch may skip the offending record and carry on.
    #[must_use]
    pub fn is_recoverable_per_sample(&self) -> bool {
        !self.is_fatal()
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::InvalidCalibration("fx <= 0".into()).is_fatal());
        assert!(Error::ConfigError("bad yaml".into()).is_fatal());

        let per_sample = [
            Error::OutOfRange("67 landmarks".into()),
            Error::InsufficientPoints { required: 4, actual: 3 },
            Error::DegenerateGeometry("coincident".into()),
            Error::NumericalDivergence("lost patience".into()),
            Error::RecordFormat {
                line: 5,
                message: "expected 2 values".into(),
            },
        ];
        for err in per_sample {
            assert!(!err.is_fatal(), "{err} should not be fatal");
            assert!(err.is_recoverable_per_sample());
        }
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientPoints { required: 4, actual: 2 };
        assert_eq!(
            err.to_string(),
            "Insufficient points: need at least 4 correspondences, got 2"
        );

        let err = Error::RecordFormat {
            line: 12,
            message: "not a number".into(),
        };
        assert_eq!(err.to_string(), "Record format error at line 12: not a number");
    }
}
