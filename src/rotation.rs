//! Rotation representations and projection-matrix decomposition.
//!
//! Euler angles follow the X-Y-Z extrinsic convention: a model point is
//! rotated about the camera X axis by `pitch`, then about Y by `yaw`, then
//! about Z by `roll`, so that `R = Rz(roll) * Ry(yaw) * Rx(pitch)`.

use crate::constants::{ANGLE_DECIMALS, EPSILON};
use crate::utils::round_to_decimals;
use nalgebra::{Matrix3, Matrix3x4, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Head orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngles {
    /// Rotation about the camera X axis
    pub pitch: f64,
    /// Rotation about the camera Y axis, within `[-90, 90]`
    pub yaw: f64,
    /// Rotation about the camera Z axis
    pub roll: f64,
}

impl EulerAngles {
    /// Create angles from degrees.
    #[must_use]
    pub const fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    /// `[pitch, yaw, roll]`
    #[must_use]
    pub fn to_array(self) -> [f64; 3] {
        [self.pitch, self.yaw, self.roll]
    }

    /// The rotation matrix these angles describe.
    #[must_use]
    pub fn to_rotation_matrix(self) -> Matrix3<f64> {
        Rotation3::from_euler_angles(
            self.pitch.to_radians(),
            self.yaw.to_radians(),
            self.roll.to_radians(),
        )
        .into_inner()
    }

    /// Angles rounded to the persisted precision.
    #[must_use]
    pub fn rounded(self) -> Self {
        Self {
            pitch: round_to_decimals(self.pitch, ANGLE_DECIMALS),
            yaw: round_to_decimals(self.yaw, ANGLE_DECIMALS),
            roll: round_to_decimals(self.roll, ANGLE_DECIMALS),
        }
    }
}

impl fmt::Display for EulerAngles {
    /// `"<pitch> <yaw> <roll>"` with three decimals
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.rounded();
        write!(f, "{:.3} {:.3} {:.3}", r.pitch, r.yaw, r.roll)
    }
}

fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Rotation vector (axis scaled by angle in radians) to rotation matrix.
#[must_use]
pub fn rodrigues(rotation_vector: &Vector3<f64>) -> Matrix3<f64> {
    let theta = rotation_vector.norm();
    if theta < EPSILON {
        // first order expansion of the exponential map
        return Matrix3::identity() + skew(rotation_vector);
    }

    let k = skew(&(rotation_vector / theta));
    Matrix3::identity() + k * theta.sin() + k * k * (1.0 - theta.cos())
}

/// Rotation matrix to rotation vector, the inverse of [`rodrigues`].
///
/// The input is re-orthonormalised through a quaternion, so slightly
/// non-orthogonal matrices from a linear solve are accepted.
#[must_use]
pub fn rotation_vector(rotation: &Matrix3<f64>) -> Vector3<f64> {
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*rotation)).scaled_axis()
}

/// Concatenate a rotation matrix and a translation into `[R | t]`.
#[must_use]
pub fn pose_matrix(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Matrix3x4<f64> {
    let mut pose = Matrix3x4::zeros();
    pose.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    pose.set_column(3, translation);
    pose
}

/// Result of [`rq_decompose`]: `m = upper * qz^T * qy^T * qx^T`.
#[derive(Debug, Clone, PartialEq)]
pub struct RqDecomposition {
    /// Upper triangular factor with non-negative leading diagonal entries
    pub upper: Matrix3<f64>,
    /// Orthogonal factor `qz^T * qy^T * qx^T`
    pub rotation: Matrix3<f64>,
    /// Givens rotation that cleared entry (2, 1)
    pub qx: Matrix3<f64>,
    /// Givens rotation that cleared entry (2, 0)
    pub qy: Matrix3<f64>,
    /// Givens rotation that cleared entry (1, 0)
    pub qz: Matrix3<f64>,
    /// Angles of the three Givens rotations
    pub euler: EulerAngles,
}

/// Normalised `(c, s)` for a Givens rotation; identity when both vanish.
fn givens(c: f64, s: f64) -> (f64, f64) {
    let norm = c.hypot(s);
    if norm < EPSILON {
        (1.0, 0.0)
    } else {
        (c / norm, s / norm)
    }
}

/// RQ decomposition of a 3×3 matrix by three Givens rotations.
///
/// Entries (2, 1), (2, 0) and (1, 0) are cleared in that order. Sign
/// ambiguity is resolved so the first two diagonal entries of `upper` are
/// non-negative, folding the flip into `qz`. For a proper rotation `upper`
/// is the identity and `rotation == m`.
#[must_use]
pub fn rq_decompose(m: &Matrix3<f64>) -> RqDecomposition {
    let (c, s) = givens(m[(2, 2)], m[(2, 1)]);
    let qx = Matrix3::new(1.0, 0.0, 0.0, 0.0, c, s, 0.0, -s, c);
    let mut r = m * qx;
    r[(2, 1)] = 0.0;

    let (c, s) = givens(r[(2, 2)], -r[(2, 0)]);
    let qy = Matrix3::new(c, 0.0, -s, 0.0, 1.0, 0.0, s, 0.0, c);
    r *= qy;
    r[(2, 0)] = 0.0;

    let (c, s) = givens(r[(1, 1)], r[(1, 0)]);
    let mut qz = Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0);
    let mut upper = r * qz;
    upper[(1, 0)] = 0.0;

    let flip = if upper[(0, 0)] < 0.0 {
        if upper[(1, 1)] < 0.0 {
            Some(Matrix3::from_diagonal(&Vector3::new(-1.0, -1.0, 1.0)))
        } else {
            Some(Matrix3::from_diagonal(&Vector3::new(-1.0, 1.0, -1.0)))
        }
    } else if upper[(1, 1)] < 0.0 {
        Some(Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, -1.0)))
    } else {
        None
    };
    if let Some(d) = flip {
        upper *= d;
        qz *= d;
    }

    let euler = EulerAngles {
        pitch: qx[(1, 2)].atan2(qx[(1, 1)]).to_degrees(),
        yaw: qy[(2, 0)].atan2(qy[(0, 0)]).to_degrees(),
        roll: qz[(0, 1)].atan2(qz[(0, 0)]).to_degrees(),
    };
    let rotation = qz.transpose() * qy.transpose() * qx.transpose();

    RqDecomposition {
        upper,
        rotation,
        qx,
        qy,
        qz,
        euler,
    }
}

/// Factors of a 3×4 projection matrix `P = U [Q | -Q c]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionDecomposition {
    /// Upper triangular calibration-like factor
    pub intrinsic: Matrix3<f64>,
    /// Rotation factor
    pub rotation: Matrix3<f64>,
    /// Camera centre `c` in model coordinates, absent when the left 3×3 block is singular
    pub camera_center: Option<Vector3<f64>>,
    /// Euler angles of the rotation factor
    pub euler: EulerAngles,
}

/// Decompose a projection matrix into calibration, rotation, camera centre and Euler angles.
///
/// Applied to a pose matrix `[R | t]`, `intrinsic` is the identity,
/// `rotation` is `R` and `camera_center` is `-R^T t`.
#[must_use]
pub fn decompose_projection_matrix(projection: &Matrix3x4<f64>) -> ProjectionDecomposition {
    let m = projection.fixed_view::<3, 3>(0, 0).into_owned();
    let p4 = projection.column(3).into_owned();
    let rq = rq_decompose(&m);
    let camera_center = m.try_inverse().map(|inv| -(inv * p4));

    ProjectionDecomposition {
        intrinsic: rq.upper,
        rotation: rq.rotation,
        camera_center,
        euler: rq.euler,
    }
}
