//! Landmark and pose overlays drawn onto RGB images

use crate::{
    camera::CameraIntrinsics,
    face_model::CUBE_EDGES,
    pose_estimation::PoseEstimate,
    utils::safe_cast::f64_to_i64_clamp,
    Error, Result,
};
use image::{Rgb, RgbImage};
use log::debug;
use nalgebra::Point2;

/// Landmark dot colour
pub const LANDMARK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Cube edge colour
pub const CUBE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Landmark dot radius in pixels
pub const LANDMARK_RADIUS: i64 = 1;

// Line endpoints are clamped to this distance outside the image before rasterizing.
const LINE_MARGIN: i64 = 4096;

fn put_clipped(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < i64::from(image.width()) && y < i64::from(image.height()) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Bounds checked above
        image.put_pixel(x as u32, y as u32, color);
    }
}

/// Draw a filled dot, clipped to the image.
pub fn draw_dot(image: &mut RgbImage, center: (i64, i64), radius: i64, color: Rgb<u8>) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_clipped(image, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Draw a one pixel wide line with Bresenham's algorithm, clipped to the image.
pub fn draw_line(image: &mut RgbImage, from: &Point2<f64>, to: &Point2<f64>, color: Rgb<u8>) {
    let (min_x, max_x) = (-LINE_MARGIN, i64::from(image.width()) + LINE_MARGIN);
    let (min_y, max_y) = (-LINE_MARGIN, i64::from(image.height()) + LINE_MARGIN);

    let (mut x0, mut y0) = (f64_to_i64_clamp(from.x, min_x, max_x), f64_to_i64_clamp(from.y, min_y, max_y));
    let (x1, y1) = (f64_to_i64_clamp(to.x, min_x, max_x), f64_to_i64_clamp(to.y, min_y, max_y));

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_clipped(image, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Draw every landmark as a red dot.
pub fn draw_landmarks(image: &mut RgbImage, landmarks: &[(i32, i32)]) {
    for &(x, y) in landmarks {
        draw_dot(image, (i64::from(x), i64::from(y)), LANDMARK_RADIUS, LANDMARK_COLOR);
    }
}

/// Draw the edges of a projected cube in green.
///
/// # Errors
///
/// Returns [`Error::OutOfRange`] unless exactly eight corners are given.
pub fn draw_cube(image: &mut RgbImage, corners: &[Point2<f64>]) -> Result<()> {
    if corners.len() != 8 {
        return Err(Error::OutOfRange(format!(
            "A cube has 8 corners, got {}",
            corners.len()
        )));
    }
    for (a, b) in CUBE_EDGES {
        draw_line(image, &corners[a], &corners[b], CUBE_COLOR);
    }
    Ok(())
}

/// Draw landmarks and the pose cube.
///
/// A cube that cannot be projected, because a corner falls behind the
/// camera, is left out and only the landmarks are drawn.
pub fn draw_annotations(
    image: &mut RgbImage,
    landmarks: &[(i32, i32)],
    pose: &PoseEstimate,
    intrinsics: &CameraIntrinsics,
) {
    draw_landmarks(image, landmarks);
    if let Err(e) = pose.reproject_cube(intrinsics).and_then(|corners| draw_cube(image, &corners)) {
        debug!("Pose cube not drawn: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_color(image: &RgbImage, color: Rgb<u8>) -> usize {
        image.pixels().filter(|p| **p == color).count()
    }

    #[test]
    fn test_dot_shape() {
        let mut image = RgbImage::new(10, 10);
        draw_dot(&mut image, (5, 5), 1, LANDMARK_COLOR);
        // radius 1 covers the centre and its four neighbours
        assert_eq!(count_color(&image, LANDMARK_COLOR), 5);
        assert_eq!(*image.get_pixel(5, 5), LANDMARK_COLOR);
        assert_eq!(*image.get_pixel(4, 5), LANDMARK_COLOR);
        assert_eq!(*image.get_pixel(4, 4), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_dot_is_clipped() {
        let mut image = RgbImage::new(4, 4);
        draw_dot(&mut image, (0, 0), 1, LANDMARK_COLOR);
        assert_eq!(count_color(&image, LANDMARK_COLOR), 3);

        draw_landmarks(&mut image, &[(-50, -50), (100, 2)]);
        assert_eq!(count_color(&image, LANDMARK_COLOR), 3);
    }

    #[test]
    fn test_line_endpoints_and_length() {
        let mut image = RgbImage::new(20, 20);
        draw_line(&mut image, &Point2::new(2.0, 3.0), &Point2::new(12.0, 3.0), CUBE_COLOR);
        assert_eq!(count_color(&image, CUBE_COLOR), 11);
        assert_eq!(*image.get_pixel(2, 3), CUBE_COLOR);
        assert_eq!(*image.get_pixel(12, 3), CUBE_COLOR);

        let mut image = RgbImage::new(20, 20);
        draw_line(&mut image, &Point2::new(0.0, 0.0), &Point2::new(9.0, 9.0), CUBE_COLOR);
        assert_eq!(count_color(&image, CUBE_COLOR), 10);
        assert_eq!(*image.get_pixel(9, 9), CUBE_COLOR);
    }

    #[test]
    fn test_line_far_outside_is_clipped() {
        let mut image = RgbImage::new(16, 16);
        draw_line(&mut image, &Point2::new(-1.0e9, 8.0), &Point2::new(1.0e9, 8.0), CUBE_COLOR);
        assert_eq!(count_color(&image, CUBE_COLOR), 16);

        draw_line(&mut image, &Point2::new(f64::NAN, 0.0), &Point2::new(3.0, 3.0), CUBE_COLOR);
        assert!(count_color(&image, CUBE_COLOR) > 16);
    }

    #[test]
    fn test_draw_cube_requires_eight_corners() {
        let mut image = RgbImage::new(8, 8);
        let corners = vec![Point2::new(1.0, 1.0); 7];
        assert!(matches!(draw_cube(&mut image, &corners), Err(Error::OutOfRange(_))));
        assert_eq!(count_color(&image, CUBE_COLOR), 0);
    }

    #[test]
    fn test_draw_square_cube() {
        let mut image = RgbImage::new(32, 32);
        let square = [(4.0, 4.0), (20.0, 4.0), (20.0, 20.0), (4.0, 20.0)];
        let corners: Vec<Point2<f64>> = square
            .iter()
            .chain(square.iter())
            .map(|&(x, y)| Point2::new(x, y))
            .collect();
        draw_cube(&mut image, &corners).unwrap();
        assert_eq!(*image.get_pixel(12, 4), CUBE_COLOR);
        assert_eq!(*image.get_pixel(20, 12), CUBE_COLOR);
        assert_eq!(*image.get_pixel(12, 12), Rgb([0, 0, 0]));
    }
}
