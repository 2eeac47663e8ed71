//! Helper functions and utilities for tests

#![allow(dead_code)]

use head_pose_annotator::{
    camera::CameraIntrinsics,
    face_model::{model_points, FACE_MODEL},
    rotation::rotation_vector,
    EulerAngles,
};
use nalgebra::{Point2, Vector3};
use std::path::Path;

/// Project the face model through a pose given as Euler angles.
pub fn project_model(angles: EulerAngles, translation: Vector3<f64>) -> Vec<Point2<f64>> {
    let rvec = rotation_vector(&angles.to_rotation_matrix());
    CameraIntrinsics::calibrated()
        .project_points(&model_points(), &rvec, &translation)
        .expect("model in front of the camera")
}

/// A full 68-point landmark set whose model landmarks are the rounded projections of a pose.
///
/// Landmarks outside the model sit at the image centre.
pub fn synthetic_landmarks(angles: EulerAngles, translation: Vector3<f64>) -> Vec<(i32, i32)> {
    let mut landmarks = vec![(320, 240); 68];
    for (anchor, pixel) in FACE_MODEL.iter().zip(project_model(angles, translation)) {
        landmarks[anchor.landmark] = (pixel.x.round() as i32, pixel.y.round() as i32);
    }
    landmarks
}

/// Record file content in the `version / n_points / {` layout, without a pose line.
pub fn record_content(landmarks: &[(i32, i32)]) -> String {
    let mut content = format!("version: 1\nn_points:  {}\n{{\n", landmarks.len());
    for (x, y) in landmarks {
        content.push_str(&format!("{x}.000 {y}.000\n"));
    }
    content.push('}');
    content
}

/// Write a record file next to a blank image of the given size.
pub fn write_sample(dir: &Path, stem: &str, landmarks: &[(i32, i32)], size: (u32, u32)) {
    std::fs::write(dir.join(format!("{stem}.txt")), record_content(landmarks)).expect("write record");
    image::RgbImage::new(size.0, size.1)
        .save(dir.join(format!("{stem}.png")))
        .expect("write image");
}

/// Smallest difference between two angles in degrees, modulo 360.
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Assert two sets of Euler angles agree within `tolerance` degrees, modulo 360.
pub fn assert_angles_close(actual: EulerAngles, expected: EulerAngles, tolerance: f64) {
    for (name, a, e) in [
        ("pitch", actual.pitch, expected.pitch),
        ("yaw", actual.yaw, expected.yaw),
        ("roll", actual.roll, expected.roll),
    ] {
        assert!(
            angle_difference(a, e) <= tolerance,
            "{name}: got {a}, expected {e} (tolerance {tolerance})"
        );
    }
}
