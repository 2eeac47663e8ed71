//! Canonical 3D face model and 2D/3D correspondence building.
//!
//! The model is a single table pairing each landmark index of the 68-point
//! annotation scheme with its anchor on a face-centred 3D model, so the 2D
//! selection and the 3D points cannot drift out of step.

use crate::{
    constants::{NUM_FACIAL_LANDMARKS, NUM_MODEL_POINTS},
    Error, Result,
};
use nalgebra::{Point2, Point3};

/// One row of the correspondence table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelAnchor {
    /// Index into the 68-point landmark set
    pub landmark: usize,
    /// Anatomical feature the anchor marks
    pub feature: &'static str,
    /// Position on the canonical face model
    pub point: [f64; 3],
}

/// The 14 anchors of the face model, in solver order.
pub type FaceModel3D = [ModelAnchor; NUM_MODEL_POINTS];

/// Eight cube corners in model coordinates.
pub type ReprojectionCube = [[f64; 3]; 8];

/// Landmark indices paired with the canonical 3D face model, in solver order.
pub const FACE_MODEL: FaceModel3D = [
    ModelAnchor { landmark: 17, feature: "left eyebrow outer", point: [6.825897, 6.760612, 4.402142] },
    ModelAnchor { landmark: 21, feature: "left eyebrow inner", point: [1.330353, 7.122144, 6.903745] },
    ModelAnchor { landmark: 22, feature: "right eyebrow inner", point: [-1.330353, 7.122144, 6.903745] },
    ModelAnchor { landmark: 26, feature: "right eyebrow outer", point: [-6.825897, 6.760612, 4.402142] },
    ModelAnchor { landmark: 36, feature: "left eye outer corner", point: [5.311432, 5.485328, 3.987654] },
    ModelAnchor { landmark: 39, feature: "left eye inner corner", point: [1.789930, 5.393625, 4.413414] },
    ModelAnchor { landmark: 42, feature: "right eye inner corner", point: [-1.789930, 5.393625, 4.413414] },
    ModelAnchor { landmark: 45, feature: "right eye outer corner", point: [-5.311432, 5.485328, 3.987654] },
    ModelAnchor { landmark: 31, feature: "nose left wing", point: [2.005628, 1.409845, 6.165652] },
    ModelAnchor { landmark: 35, feature: "nose right wing", point: [-2.005628, 1.409845, 6.165652] },
    ModelAnchor { landmark: 48, feature: "mouth left corner", point: [2.774015, -2.080775, 5.048531] },
    ModelAnchor { landmark: 54, feature: "mouth right corner", point: [-2.774015, -2.080775, 5.048531] },
    ModelAnchor { landmark: 57, feature: "mouth bottom", point: [0.000000, -3.116408, 6.097667] },
    ModelAnchor { landmark: 8, feature: "chin tip", point: [0.000000, -7.415691, 4.070434] },
];

/// Corners of a cube around the model origin, for pose overlays.
pub const REPROJECTION_CUBE: ReprojectionCube = [
    [10.0, 10.0, 10.0],
    [10.0, 10.0, -10.0],
    [10.0, -10.0, -10.0],
    [10.0, -10.0, 10.0],
    [-10.0, 10.0, 10.0],
    [-10.0, 10.0, -10.0],
    [-10.0, -10.0, -10.0],
    [-10.0, -10.0, 10.0],
];

/// Cube edges as index pairs into [`REPROJECTION_CUBE`].
pub const CUBE_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// The 3D face model points in solver order.
#[must_use]
pub fn model_points() -> [Point3<f64>; NUM_MODEL_POINTS] {
    FACE_MODEL.map(|anchor| Point3::from(anchor.point))
}

/// The reprojection cube corners.
#[must_use]
pub fn cube_points() -> [Point3<f64>; 8] {
    REPROJECTION_CUBE.map(Point3::from)
}

/// Select the 14 model landmarks from a 68-point landmark set, in solver order.
///
/// # Errors
///
/// Returns [`Error::OutOfRange`] if the set does not hold exactly 68 points.
pub fn build_correspondence(landmarks: &[(i32, i32)]) -> Result<Vec<Point2<f64>>> {
    if landmarks.len() != NUM_FACIAL_LANDMARKS {
        return Err(Error::OutOfRange(format!(
            "Expected {} landmarks, got {}",
            NUM_FACIAL_LANDMARKS,
            landmarks.len()
        )));
    }

    FACE_MODEL
        .iter()
        .map(|anchor| {
            landmarks
                .get(anchor.landmark)
                .map(|&(x, y)| Point2::new(f64::from(x), f64::from(y)))
                .ok_or_else(|| {
                    Error::OutOfRange(format!(
                        "Landmark {} ({}) missing",
                        anchor.landmark, anchor.feature
                    ))
                })
        })
        .collect()
}
