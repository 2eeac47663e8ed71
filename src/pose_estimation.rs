use crate::{
    camera::CameraIntrinsics,
    config::SolverConfig,
    constants::{
        EPSILON, FLATNESS_RATIO, MIN_DEPTH, MIN_DLT_POINTS, MIN_PNP_POINTS, MIN_POINT_SPREAD, SVD_MAX_ITERATIONS,
    },
    face_model::{build_correspondence, cube_points, model_points},
    rotation::{decompose_projection_matrix, pose_matrix, rodrigues, rotation_vector, EulerAngles},
    Error, Result,
};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use log::debug;
use nalgebra::{
    storage::Owned, DMatrix, DVector, Dyn, Matrix2, Matrix3, Matrix3x4, Matrix4, Point2, Point3, Vector2, Vector3,
};

/// Relative step of the central-difference Jacobian
const JACOBIAN_STEP: f64 = 1e-6;

/// Pose of the face model in the camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseEstimate {
    /// Axis-angle rotation, model to camera
    pub rotation_vector: Vector3<f64>,
    /// Translation, model to camera, in model units
    pub translation_vector: Vector3<f64>,
    /// Pitch, yaw and roll in degrees
    pub euler_angles: EulerAngles,
    /// Root-mean-square reprojection error in pixels
    pub reprojection_rmse: f64,
    /// Residual evaluations spent by the refinement
    pub evaluations: usize,
}

impl PoseEstimate {
    /// Rotation as a 3×3 matrix
    #[must_use]
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        rodrigues(&self.rotation_vector)
    }

    /// `[R | t]`
    #[must_use]
    pub fn pose_matrix(&self) -> Matrix3x4<f64> {
        pose_matrix(&self.rotation_matrix(), &self.translation_vector)
    }

    /// Project model-frame points through this pose.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DegenerateGeometry`] if a point lands behind the camera.
    pub fn reproject(&self, intrinsics: &CameraIntrinsics, points: &[Point3<f64>]) -> Result<Vec<Point2<f64>>> {
        intrinsics.project_points(points, &self.rotation_vector, &self.translation_vector)
    }

    /// Pixel positions of the reprojection cube corners, for overlays.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DegenerateGeometry`] if a corner lands behind the camera.
    pub fn reproject_cube(&self, intrinsics: &CameraIntrinsics) -> Result<Vec<Point2<f64>>> {
        self.reproject(intrinsics, &cube_points())
    }
}

/// How much of 3D space a model point set spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelShape {
    Planar,
    Volumetric,
}

/// A refined pose and how well it explains the observations.
#[derive(Debug, Clone)]
struct Candidate {
    params: DVector<f64>,
    rmse: f64,
    evaluations: usize,
}

/// Pixel reprojection residuals over the pose vector `(rx, ry, rz, tx, ty, tz)`.
struct ReprojectionProblem<'a> {
    intrinsics: &'a CameraIntrinsics,
    image: &'a [Point2<f64>],
    model: &'a [Point3<f64>],
    params: DVector<f64>,
}

impl ReprojectionProblem<'_> {
    fn residuals_at(&self, params: &DVector<f64>) -> Option<DVector<f64>> {
        let rotation = rodrigues(&Vector3::new(params[0], params[1], params[2]));
        let translation = Vector3::new(params[3], params[4], params[5]);

        let mut residuals = DVector::zeros(2 * self.image.len());
        for (i, (model, observed)) in self.model.iter().zip(self.image).enumerate() {
            let camera_point = rotation * model.coords + translation;
            if camera_point.z.abs() < MIN_DEPTH {
                return None;
            }
            let normalized = Vector2::new(camera_point.x / camera_point.z, camera_point.y / camera_point.z);
            let pixel = self.intrinsics.to_pixel(&self.intrinsics.distort(&normalized));
            residuals[2 * i] = pixel.x - observed.x;
            residuals[2 * i + 1] = pixel.y - observed.y;
        }

        residuals.iter().all(|r| r.is_finite()).then_some(residuals)
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for ReprojectionProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        self.residuals_at(&self.params)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let mut jacobian = DMatrix::zeros(2 * self.image.len(), self.params.len());
        for j in 0..self.params.len() {
            let step = JACOBIAN_STEP * self.params[j].abs().max(1.0);
            let mut forward = self.params.clone();
            let mut backward = self.params.clone();
            forward[j] += step;
            backward[j] -= step;
            let column = (self.residuals_at(&forward)? - self.residuals_at(&backward)?) / (2.0 * step);
            jacobian.set_column(j, &column);
        }
        Some(jacobian)
    }
}

/// Head pose estimator solving the Perspective-n-Point problem against a fixed camera.
#[derive(Debug, Clone)]
pub struct PoseEstimator {
    intrinsics: CameraIntrinsics,
    solver: SolverConfig,
}

impl Default for PoseEstimator {
    fn default() -> Self {
        Self {
            intrinsics: CameraIntrinsics::calibrated(),
            solver: SolverConfig::default(),
        }
    }
}

impl PoseEstimator {
    /// Create a pose estimator for the given camera.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The intrinsics are malformed ([`Error::InvalidCalibration`])
    /// - The solver settings are out of range ([`Error::ConfigError`])
    pub fn new(intrinsics: CameraIntrinsics, solver: SolverConfig) -> Result<Self> {
        intrinsics.validate()?;
        solver.validate()?;
        log::info!(
            "Initializing PoseEstimator with fx={:.3} fy={:.3}, max {} iterations",
            intrinsics.fx(),
            intrinsics.fy(),
            solver.max_iterations
        );
        Ok(Self { intrinsics, solver })
    }

    /// Camera the estimator projects through
    #[must_use]
    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// Estimate head pose from a full 68-point landmark set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if the set does not hold 68 points, or
    /// any error of [`Self::estimate_pose`].
    pub fn estimate_from_landmarks(&self, landmarks: &[(i32, i32)]) -> Result<PoseEstimate> {
        let image_points = build_correspondence(landmarks)?;
        self.estimate_pose(&image_points, &model_points())
    }

    /// Estimate the pose that projects `model_points` onto `image_points`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The two slices differ in length ([`Error::OutOfRange`])
    /// - Fewer than four pairs are given ([`Error::InsufficientPoints`])
    /// - Either point set is non-finite, coincident or collinear ([`Error::DegenerateGeometry`])
    /// - The fit does not converge to a pose in front of the camera ([`Error::NumericalDivergence`])
    pub fn estimate_pose(&self, image_points: &[Point2<f64>], model_points: &[Point3<f64>]) -> Result<PoseEstimate> {
        if image_points.len() != model_points.len() {
            return Err(Error::OutOfRange(format!(
                "{} image points paired with {} model points",
                image_points.len(),
                model_points.len()
            )));
        }
        if image_points.len() < MIN_PNP_POINTS {
            return Err(Error::InsufficientPoints {
                required: MIN_PNP_POINTS,
                actual: image_points.len(),
            });
        }
        check_image_points(image_points)?;
        let shape = model_shape(model_points)?;

        let linear_seed = if image_points.len() >= MIN_DLT_POINTS && shape == ModelShape::Volumetric {
            let seed = dlt_seed(&self.intrinsics, image_points, model_points);
            if seed.is_none() {
                debug!("DLT initialisation rejected, falling back to weak perspective seeds");
            }
            seed
        } else {
            debug!(
                "DLT initialisation unavailable for {} points ({:?} model)",
                image_points.len(),
                shape
            );
            None
        };

        let candidate = match linear_seed {
            Some(seed) => self
                .refine(seed, image_points, model_points)
                .or_else(|e| {
                    debug!("Refinement from DLT seed failed: {e}");
                    self.refine_from_weak_perspective(image_points, model_points)
                })?,
            None => self.refine_from_weak_perspective(image_points, model_points)?,
        };

        let rotation_vector = Vector3::new(candidate.params[0], candidate.params[1], candidate.params[2]);
        let translation_vector = Vector3::new(candidate.params[3], candidate.params[4], candidate.params[5]);
        let pose = pose_matrix(&rodrigues(&rotation_vector), &translation_vector);
        let euler_angles = decompose_projection_matrix(&pose).euler;

        debug!(
            "Pose solved: {} (rmse {:.4} px, {} evaluations)",
            euler_angles, candidate.rmse, candidate.evaluations
        );

        Ok(PoseEstimate {
            rotation_vector,
            translation_vector,
            euler_angles,
            reprojection_rmse: candidate.rmse,
            evaluations: candidate.evaluations,
        })
    }

    /// Levenberg-Marquardt refinement from a seed pose.
    fn refine(&self, seed: DVector<f64>, image: &[Point2<f64>], model: &[Point3<f64>]) -> Result<Candidate> {
        let problem = ReprojectionProblem {
            intrinsics: &self.intrinsics,
            image,
            model,
            params: seed,
        };

        let lm = LevenbergMarquardt::new()
            .with_ftol(self.solver.ftol)
            .with_xtol(self.solver.xtol)
            .with_gtol(self.solver.gtol)
            .with_patience(self.solver.max_iterations.max(1));
        let (problem, report) = lm.minimize(problem);

        let converged = report.termination.was_successful()
            || matches!(report.termination, TerminationReason::NoImprovementPossible(_));
        if !converged {
            return Err(Error::NumericalDivergence(format!(
                "solver stopped with {:?} after {} evaluations",
                report.termination, report.number_of_evaluations
            )));
        }

        let params = problem.params();
        let residuals = problem
            .residuals_at(&params)
            .ok_or_else(|| Error::NumericalDivergence("non-finite residuals at solution".to_string()))?;

        let rotation = rodrigues(&Vector3::new(params[0], params[1], params[2]));
        let translation = Vector3::new(params[3], params[4], params[5]);
        if model.iter().any(|p| (rotation * p.coords + translation).z <= MIN_DEPTH) {
            return Err(Error::NumericalDivergence(
                "solution places the model behind the camera".to_string(),
            ));
        }

        #[allow(clippy::cast_precision_loss)] // point counts are tiny
        let rmse = (residuals.norm_squared() / image.len() as f64).sqrt();

        Ok(Candidate {
            params,
            rmse,
            evaluations: report.number_of_evaluations,
        })
    }

    /// Refine from weak perspective seeds facing towards and away from the camera, keeping the best fit.
    fn refine_from_weak_perspective(&self, image: &[Point2<f64>], model: &[Point3<f64>]) -> Result<Candidate> {
        let seeds = [Matrix3::identity(), EulerAngles::new(180.0, 0.0, 0.0).to_rotation_matrix()];

        let mut best: Option<Candidate> = None;
        let mut last_error = None;
        for rotation in &seeds {
            let seed = weak_perspective_seed(&self.intrinsics, image, model, rotation);
            match self.refine(seed, image, model) {
                Ok(candidate) => {
                    if best.as_ref().map_or(true, |b| candidate.rmse < b.rmse) {
                        best = Some(candidate);
                    }
                }
                Err(e) => last_error = Some(e),
            }
        }

        best.ok_or_else(|| {
            last_error.unwrap_or_else(|| Error::NumericalDivergence("no seed converged".to_string()))
        })
    }
}

/// Estimate a pose with the default solver settings.
///
/// # Errors
///
/// Returns [`Error::InvalidCalibration`] for malformed intrinsics, or any
/// error of [`PoseEstimator::estimate_pose`].
pub fn estimate_pose(
    image_points: &[Point2<f64>],
    model_points: &[Point3<f64>],
    intrinsics: &CameraIntrinsics,
) -> Result<PoseEstimate> {
    intrinsics.validate()?;
    let estimator = PoseEstimator {
        intrinsics: *intrinsics,
        solver: SolverConfig::default(),
    };
    estimator.estimate_pose(image_points, model_points)
}

fn check_image_points(points: &[Point2<f64>]) -> Result<()> {
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(Error::DegenerateGeometry("non-finite image coordinate".to_string()));
    }

    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let centroid = points.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / n;
    let covariance = points.iter().fold(Matrix2::zeros(), |acc, p| {
        let d = p.coords - centroid;
        acc + d * d.transpose()
    }) / n;

    if covariance.iter().any(|v| !v.is_finite()) {
        return Err(Error::DegenerateGeometry("image point spread overflows".to_string()));
    }
    let eigenvalues = covariance.symmetric_eigenvalues();
    let largest = eigenvalues.max().max(0.0);
    let smallest = eigenvalues.min().max(0.0);

    if largest.sqrt() < MIN_POINT_SPREAD {
        return Err(Error::DegenerateGeometry("image points are coincident".to_string()));
    }
    if smallest / largest < FLATNESS_RATIO {
        return Err(Error::DegenerateGeometry("image points are collinear".to_string()));
    }
    Ok(())
}

fn model_shape(points: &[Point3<f64>]) -> Result<ModelShape> {
    if points.iter().any(|p| p.coords.iter().any(|v| !v.is_finite())) {
        return Err(Error::DegenerateGeometry("non-finite model coordinate".to_string()));
    }

    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let centroid = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;
    let covariance = points.iter().fold(Matrix3::zeros(), |acc, p| {
        let d = p.coords - centroid;
        acc + d * d.transpose()
    }) / n;

    if covariance.iter().any(|v| !v.is_finite()) {
        return Err(Error::DegenerateGeometry("model point spread overflows".to_string()));
    }
    let mut eigenvalues: Vec<f64> = covariance.symmetric_eigenvalues().iter().map(|v| v.max(0.0)).collect();
    eigenvalues.sort_by(f64::total_cmp);
    let (smallest, middle, largest) = (eigenvalues[0], eigenvalues[1], eigenvalues[2]);

    if largest.sqrt() < MIN_POINT_SPREAD {
        return Err(Error::DegenerateGeometry("model points are coincident".to_string()));
    }
    if middle / largest < FLATNESS_RATIO {
        return Err(Error::DegenerateGeometry("model points are collinear".to_string()));
    }
    if smallest / largest < FLATNESS_RATIO {
        Ok(ModelShape::Planar)
    } else {
        Ok(ModelShape::Volumetric)
    }
}

fn pose_params(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> DVector<f64> {
    let r = rotation_vector(rotation);
    DVector::from_column_slice(&[r.x, r.y, r.z, translation.x, translation.y, translation.z])
}

/// Direct linear estimate of `[R | t]` on undistorted normalised coordinates.
///
/// Model points are centred and scaled to a mean distance of √3 before the
/// solve. Returns `None` when the estimate is unusable.
fn dlt_seed(intrinsics: &CameraIntrinsics, image: &[Point2<f64>], model: &[Point3<f64>]) -> Option<DVector<f64>> {
    let n = image.len();
    #[allow(clippy::cast_precision_loss)]
    let count = n as f64;

    let centroid = model.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / count;
    let mean_distance = model.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / count;
    if mean_distance < EPSILON {
        return None;
    }
    let scale = 3f64.sqrt() / mean_distance;

    let normalized = undistorted_points(intrinsics, image)?;

    let mut a = DMatrix::<f64>::zeros(2 * n, 12);
    for (i, (uv, point)) in normalized.iter().zip(model).enumerate() {
        let x = (point.coords - centroid) * scale;
        let (r0, r1) = (2 * i, 2 * i + 1);

        for (k, value) in [x.x, x.y, x.z, 1.0].into_iter().enumerate() {
            a[(r0, k)] = value;
            a[(r1, 4 + k)] = value;
            a[(r0, 8 + k)] = -uv.x * value;
            a[(r1, 8 + k)] = -uv.y * value;
        }
    }

    if a.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let svd = a.try_svd(false, true, f64::EPSILON, SVD_MAX_ITERATIONS)?;
    let v_t = svd.v_t?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))?;
    let p_vec = v_t.row(min_idx).transpose();
    let p_normalized = Matrix3x4::from_row_slice(p_vec.as_slice());

    let mut denormalize = Matrix4::identity();
    denormalize.fixed_view_mut::<3, 3>(0, 0).copy_from(&(Matrix3::identity() * scale));
    denormalize.fixed_view_mut::<3, 1>(0, 3).copy_from(&(-centroid * scale));
    let p = p_normalized * denormalize;

    let mut m = p.fixed_view::<3, 3>(0, 0).into_owned();
    let mut t = p.column(3).into_owned();
    if m.determinant() < 0.0 {
        m = -m;
        t = -t;
    }

    // nearest rotation, scale from the mean singular value
    if m.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let svd = m.try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS)?;
    let s = svd.singular_values.mean();
    if s < EPSILON {
        return None;
    }
    let (u, v_t) = (svd.u?, svd.v_t?);
    let mut rotation = u * v_t;
    if rotation.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        rotation = u_flipped * v_t;
    }
    let translation = t / s;

    if model.iter().any(|p| (rotation * p.coords + translation).z <= MIN_DEPTH) {
        return None;
    }
    Some(pose_params(&rotation, &translation))
}

/// Undistorted normalised coordinates of every pixel, or `None` if any lies outside the distortion model.
fn undistorted_points(intrinsics: &CameraIntrinsics, image: &[Point2<f64>]) -> Option<Vec<Vector2<f64>>> {
    image.iter().map(|p| intrinsics.normalize_pixel(p)).collect()
}

/// Seed with a fixed rotation and the translation that matches centroid and spread under scaled orthography.
///
/// Pixels outside the invertible range of the distortion model are used
/// without undistortion; the refinement works on distorted projections.
fn weak_perspective_seed(
    intrinsics: &CameraIntrinsics,
    image: &[Point2<f64>],
    model: &[Point3<f64>],
    rotation: &Matrix3<f64>,
) -> DVector<f64> {
    #[allow(clippy::cast_precision_loss)]
    let count = image.len() as f64;

    let normalized = undistorted_points(intrinsics, image).unwrap_or_else(|| {
        debug!("Image points outside the undistortion range, seeding from distorted coordinates");
        image.iter().map(|p| intrinsics.from_pixel(p)).collect()
    });
    let image_centroid = normalized.iter().fold(Vector2::zeros(), |acc, p| acc + p) / count;
    let image_spread = (normalized.iter().map(|p| (p - image_centroid).norm_squared()).sum::<f64>() / count).sqrt();

    let rotated: Vec<Vector3<f64>> = model.iter().map(|p| rotation * p.coords).collect();
    let model_centroid = rotated.iter().fold(Vector3::zeros(), |acc, p| acc + p) / count;
    let model_spread = (rotated
        .iter()
        .map(|p| (p - model_centroid).xy().norm_squared())
        .sum::<f64>()
        / count)
        .sqrt();

    let depth = model_spread.max(EPSILON) / image_spread.max(EPSILON);
    let translation = Vector3::new(
        image_centroid.x * depth - model_centroid.x,
        image_centroid.y * depth - model_centroid.y,
        depth - model_centroid.z,
    );
    pose_params(rotation, &translation)
}
