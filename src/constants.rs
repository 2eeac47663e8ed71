//! Constants used throughout the crate

/// Number of facial landmarks in a full landmark set
pub const NUM_FACIAL_LANDMARKS: usize = 68;

/// Number of landmarks paired with the 3D face model
pub const NUM_MODEL_POINTS: usize = 14;

/// Minimum number of correspondences accepted by the pose solver
pub const MIN_PNP_POINTS: usize = 4;

/// Minimum number of correspondences for the linear (DLT) initialisation
pub const MIN_DLT_POINTS: usize = 6;

/// Calibrated camera matrix, row-major
pub const CALIBRATED_CAMERA_MATRIX: [f64; 9] = [
    653.083_919_934_666_7,
    0.0,
    319.5,
    0.0,
    653.083_919_934_666_7,
    239.5,
    0.0,
    0.0,
    1.0,
];

/// Calibrated lens distortion coefficients `(k1, k2, p1, p2, k3)`
pub const CALIBRATED_DISTORTION: [f64; 5] = [
    0.070_834_633_684_407_1,
    0.069_140_193_737_175_35,
    0.0,
    0.0,
    -1.307_346_032_368_929_2,
];

/// Decimal places used when persisting angles
pub const ANGLE_DECIMALS: i32 = 3;

/// Default Levenberg-Marquardt evaluation budget factor
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Default relative tolerance on the cost reduction
pub const DEFAULT_FTOL: f64 = 1e-12;

/// Default relative tolerance on the parameter step
pub const DEFAULT_XTOL: f64 = 1e-12;

/// Default orthogonality tolerance
pub const DEFAULT_GTOL: f64 = 0.0;

/// Newton iterations used when undistorting observed pixels
pub const UNDISTORT_ITERATIONS: usize = 20;

/// Step halvings tried before an undistortion step is rejected
pub const UNDISTORT_MAX_HALVINGS: usize = 30;

/// Residual below which an undistorted point is accepted, in normalised units
pub const UNDISTORT_TOLERANCE: f64 = 1e-12;

/// Sweep limit for singular value decompositions
pub const SVD_MAX_ITERATIONS: usize = 1000;

/// Spread (pixels or model units) below which a point set counts as coincident
pub const MIN_POINT_SPREAD: f64 = 1e-6;

/// Eigenvalue ratio below which a point set counts as lacking a dimension
pub const FLATNESS_RATIO: f64 = 1e-12;

/// Depth below which a camera-space point counts as on or behind the image plane
pub const MIN_DEPTH: f64 = 1e-9;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;

/// Default header line count of a landmark record (`version`, `n_points`, `{`)
pub const DEFAULT_HEADER_LINES: usize = 3;

/// Default image extensions scanned by the batch runner
pub const DEFAULT_IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "png"];

/// Extension of a landmark record next to its image
pub const RECORD_EXTENSION: &str = "txt";
