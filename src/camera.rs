//! Pinhole camera with Brown-Conrady lens distortion.

use crate::{
    constants::{
        CALIBRATED_CAMERA_MATRIX, CALIBRATED_DISTORTION, EPSILON, MIN_DEPTH, UNDISTORT_ITERATIONS,
        UNDISTORT_MAX_HALVINGS, UNDISTORT_TOLERANCE,
    },
    rotation::rodrigues,
    Error, Result,
};
use nalgebra::{Matrix2, Matrix3, Point2, Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Camera matrix and lens distortion determined by a prior calibration.
///
/// The matrix is stored row-major; distortion coefficients are ordered
/// `(k1, k2, p1, p2, k3)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// 3×3 focal length / principal point matrix, row-major
    pub camera_matrix: [f64; 9],

    /// Lens distortion coefficients `(k1, k2, p1, p2, k3)`
    pub distortion: [f64; 5],
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self::calibrated()
    }
}

impl CameraIntrinsics {
    /// The intrinsics the landmark corpus was captured with.
    #[must_use]
    pub const fn calibrated() -> Self {
        Self {
            camera_matrix: CALIBRATED_CAMERA_MATRIX,
            distortion: CALIBRATED_DISTORTION,
        }
    }

    /// Build intrinsics from a camera matrix and distortion coefficients.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCalibration`] if the parameters fail [`Self::validate`].
    pub fn new(camera_matrix: [f64; 9], distortion: [f64; 5]) -> Result<Self> {
        let intrinsics = Self {
            camera_matrix,
            distortion,
        };
        intrinsics.validate()?;
        Ok(intrinsics)
    }

    /// The camera matrix as a nalgebra matrix.
    #[must_use]
    pub fn k_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_row_slice(&self.camera_matrix)
    }

    /// Horizontal focal length in pixels
    #[must_use]
    pub fn fx(&self) -> f64 {
        self.camera_matrix[0]
    }

    /// Vertical focal length in pixels
    #[must_use]
    pub fn fy(&self) -> f64 {
        self.camera_matrix[4]
    }

    /// Principal point in pixels
    #[must_use]
    pub fn principal_point(&self) -> Point2<f64> {
        Point2::new(self.camera_matrix[2], self.camera_matrix[5])
    }

    /// Check that the parameters describe a usable pinhole camera.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCalibration`] if:
    /// - any entry is not finite
    /// - a focal length is not positive
    /// - the matrix is not upper triangular with bottom row `(0, 0, 1)`
    /// - the matrix is singular
    pub fn validate(&self) -> Result<()> {
        if let Some(v) = self.camera_matrix.iter().find(|v| !v.is_finite()) {
            return Err(Error::InvalidCalibration(format!("camera matrix entry {v} is not finite")));
        }
        if let Some(v) = self.distortion.iter().find(|v| !v.is_finite()) {
            return Err(Error::InvalidCalibration(format!(
                "distortion coefficient {v} is not finite"
            )));
        }
        if self.fx() <= 0.0 || self.fy() <= 0.0 {
            return Err(Error::InvalidCalibration(format!(
                "focal lengths must be positive, got fx={} fy={}",
                self.fx(),
                self.fy()
            )));
        }

        let k = &self.camera_matrix;
        if k[3].abs() > EPSILON || k[6].abs() > EPSILON || k[7].abs() > EPSILON {
            return Err(Error::InvalidCalibration(
                "camera matrix must be upper triangular".to_string(),
            ));
        }
        if (k[8] - 1.0).abs() > EPSILON {
            return Err(Error::InvalidCalibration(format!(
                "camera matrix must end with 1, got {}",
                k[8]
            )));
        }
        if self.k_matrix().determinant().abs() < EPSILON {
            return Err(Error::InvalidCalibration("camera matrix is singular".to_string()));
        }

        Ok(())
    }

    /// Apply the lens distortion model to an ideal normalised image point.
    #[must_use]
    pub fn distort(&self, normalized: &Vector2<f64>) -> Vector2<f64> {
        let [k1, k2, p1, p2, k3] = self.distortion;
        let (x, y) = (normalized.x, normalized.y);

        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + k1 * r2 + k2 * r4 + k3 * r6;

        let x_tan = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let y_tan = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;

        Vector2::new(x * radial + x_tan, y * radial + y_tan)
    }

    /// Jacobian of [`Self::distort`] at an ideal normalised point.
    #[must_use]
    pub fn distortion_jacobian(&self, normalized: &Vector2<f64>) -> Matrix2<f64> {
        let [k1, k2, p1, p2, k3] = self.distortion;
        let (x, y) = (normalized.x, normalized.y);

        let r2 = x * x + y * y;
        let radial = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;
        let d_radial = k1 + 2.0 * k2 * r2 + 3.0 * k3 * r2 * r2;
        let cross = 2.0 * x * y * d_radial + 2.0 * p1 * x + 2.0 * p2 * y;

        Matrix2::new(
            radial + 2.0 * x * x * d_radial + 2.0 * p1 * y + 6.0 * p2 * x,
            cross,
            cross,
            radial + 2.0 * y * y * d_radial + 6.0 * p1 * y + 2.0 * p2 * x,
        )
    }

    /// Invert [`Self::distort`] by damped Newton iteration.
    ///
    /// Returns `None` when no ideal point maps onto `distorted`: beyond the
    /// fold of the radial polynomial, for non-finite input, or when the
    /// iteration does not converge.
    #[must_use]
    pub fn undistort(&self, distorted: &Vector2<f64>) -> Option<Vector2<f64>> {
        let residual = |point: &Vector2<f64>| {
            let error = self.distort(point) - distorted;
            error.iter().all(|v| v.is_finite()).then_some(error)
        };

        let mut undistorted = *distorted;
        let mut error = residual(&undistorted)?;
        for _ in 0..UNDISTORT_ITERATIONS {
            if error.norm() < UNDISTORT_TOLERANCE {
                return Some(undistorted);
            }
            let step = self.distortion_jacobian(&undistorted).try_inverse()? * error;

            let mut scale = 1.0;
            let mut accepted = None;
            for _ in 0..UNDISTORT_MAX_HALVINGS {
                let candidate = undistorted - step * scale;
                match residual(&candidate) {
                    Some(candidate_error) if candidate_error.norm() < error.norm() => {
                        accepted = Some((candidate, candidate_error));
                        break;
                    }
                    _ => scale *= 0.5,
                }
            }
            (undistorted, error) = accepted?;
        }
        (error.norm() < UNDISTORT_TOLERANCE).then_some(undistorted)
    }

    /// Map a distorted normalised point to pixels.
    #[must_use]
    pub fn to_pixel(&self, distorted: &Vector2<f64>) -> Point2<f64> {
        let k = &self.camera_matrix;
        Point2::new(
            k[0] * distorted.x + k[1] * distorted.y + k[2],
            k[4] * distorted.y + k[5],
        )
    }

    /// Map a pixel to distorted normalised coordinates.
    #[must_use]
    pub fn from_pixel(&self, pixel: &Point2<f64>) -> Vector2<f64> {
        let k = &self.camera_matrix;
        let y = (pixel.y - k[5]) / k[4];
        let x = (pixel.x - k[2] - k[1] * y) / k[0];
        Vector2::new(x, y)
    }

    /// Observed pixel to ideal (undistorted) normalised image coordinates.
    ///
    /// Returns `None` where [`Self::undistort`] has no solution.
    #[must_use]
    pub fn normalize_pixel(&self, pixel: &Point2<f64>) -> Option<Vector2<f64>> {
        self.undistort(&self.from_pixel(pixel))
    }

    /// Project a camera-frame point to pixels.
    ///
    /// Returns `None` for points on or behind the image plane.
    #[must_use]
    pub fn project_camera_point(&self, point: &Vector3<f64>) -> Option<Point2<f64>> {
        if point.z <= MIN_DEPTH {
            return None;
        }
        let normalized = Vector2::new(point.x / point.z, point.y / point.z);
        Some(self.to_pixel(&self.distort(&normalized)))
    }

    /// Project model points through a pose given as rotation vector and translation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DegenerateGeometry`] if a point lands on or behind the image plane.
    pub fn project_points(
        &self,
        points: &[Point3<f64>],
        rotation_vector: &Vector3<f64>,
        translation: &Vector3<f64>,
    ) -> Result<Vec<Point2<f64>>> {
        let rotation = rodrigues(rotation_vector);
        points
            .iter()
            .map(|p| {
                let camera_point = rotation * p.coords + translation;
                self.project_camera_point(&camera_point).ok_or_else(|| {
                    Error::DegenerateGeometry(format!(
                        "point ({:.3}, {:.3}, {:.3}) projects behind the camera",
                        p.x, p.y, p.z
                    ))
                })
            })
            .collect()
    }
}
