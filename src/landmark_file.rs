//! Line-oriented landmark records.
//!
//! A record holds a fixed number of header lines, one `"x y"` line per
//! landmark, an optional `}` footer and, once annotated, a final
//! `"<pitch> <yaw> <roll>"` line appended by [`append_pose`].

use crate::{
    config::RecordConfig,
    rotation::EulerAngles,
    utils::safe_cast::landmark_coordinate,
    Error, Result,
};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// A parsed landmark record.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkRecord {
    /// Header lines, verbatim
    pub header: Vec<String>,
    /// Landmark coordinates in file order
    pub landmarks: Vec<(i32, i32)>,
    /// Pose line already present at the end of the record
    pub pose: Option<EulerAngles>,
}

impl LandmarkRecord {
    /// Whether the record already carries a pose line
    #[must_use]
    pub fn is_annotated(&self) -> bool {
        self.pose.is_some()
    }
}

fn format_error(line: usize, message: impl Into<String>) -> Error {
    Error::RecordFormat {
        line,
        message: message.into(),
    }
}

fn parse_numbers(line: &str, line_no: usize) -> Result<Vec<f64>> {
    line.split_whitespace()
        .map(|field| {
            field
                .parse::<f64>()
                .map_err(|_| format_error(line_no, format!("{field:?} is not a number")))
        })
        .collect()
}

/// Header field `n_points`, when the header declares one.
fn declared_point_count(header: &[String]) -> Option<(usize, &str)> {
    header.iter().enumerate().find_map(|(i, line)| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "n_points").then_some((i + 1, value.trim()))
    })
}

/// Parse a landmark record.
///
/// # Errors
///
/// Returns [`Error::RecordFormat`] if:
/// - The record is shorter than the header plus the coordinate lines
/// - A declared `n_points` disagrees with the configured point count
/// - A coordinate line does not hold exactly two numbers
/// - Anything other than blank lines, `}` and a single pose line follows the coordinates
pub fn parse_record(content: &str, schema: &RecordConfig) -> Result<LandmarkRecord> {
    let lines: Vec<&str> = content.lines().collect();
    let body_end = schema.header_lines + schema.point_count;
    if lines.len() < body_end {
        return Err(format_error(
            lines.len(),
            format!(
                "expected {} header lines and {} coordinate lines, record has {} lines",
                schema.header_lines,
                schema.point_count,
                lines.len()
            ),
        ));
    }

    let header: Vec<String> = lines[..schema.header_lines].iter().map(|l| (*l).to_string()).collect();
    if let Some((line_no, value)) = declared_point_count(&header) {
        if value.parse::<usize>().ok() != Some(schema.point_count) {
            return Err(format_error(
                line_no,
                format!("header declares n_points {value}, expected {}", schema.point_count),
            ));
        }
    }

    let mut landmarks = Vec::with_capacity(schema.point_count);
    for (offset, line) in lines[schema.header_lines..body_end].iter().enumerate() {
        let line_no = schema.header_lines + offset + 1;
        match parse_numbers(line, line_no)?.as_slice() {
            &[x, y] => landmarks.push((landmark_coordinate(x)?, landmark_coordinate(y)?)),
            values => {
                return Err(format_error(
                    line_no,
                    format!("expected 2 coordinates, found {}", values.len()),
                ))
            }
        }
    }

    let mut pose = None;
    for (offset, line) in lines[body_end..].iter().enumerate() {
        let line_no = body_end + offset + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || (trimmed == "}" && pose.is_none()) {
            continue;
        }
        if pose.is_some() {
            return Err(format_error(line_no, "unexpected content after pose line"));
        }
        match parse_numbers(trimmed, line_no)?.as_slice() {
            &[pitch, yaw, roll] => pose = Some(EulerAngles::new(pitch, yaw, roll)),
            _ => return Err(format_error(line_no, format!("unexpected trailing line {trimmed:?}"))),
        }
    }

    Ok(LandmarkRecord {
        header,
        landmarks,
        pose,
    })
}

/// Read and parse a landmark record file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read, or any error of [`parse_record`].
pub fn read_record<P: AsRef<Path>>(path: P, schema: &RecordConfig) -> Result<LandmarkRecord> {
    let content = fs::read_to_string(path)?;
    parse_record(&content, schema)
}

/// The line appended to an annotated record
#[must_use]
pub fn format_pose_line(angles: &EulerAngles) -> String {
    angles.to_string()
}

/// Append the pose line to the end of a record, leaving prior content untouched.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read or appended to.
pub fn append_pose<P: AsRef<Path>>(path: P, angles: &EulerAngles) -> Result<()> {
    let path = path.as_ref();
    let needs_separator = fs::read(path).map(|bytes| !bytes.is_empty() && !bytes.ends_with(b"\n"))?;

    let mut file = OpenOptions::new().append(true).open(path)?;
    if needs_separator {
        file.write_all(b"\n")?;
    }
    file.write_all(format_pose_line(angles).as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NUM_FACIAL_LANDMARKS;

    fn pts_record(points: &[(f64, f64)]) -> String {
        let mut out = format!("version: 1\nn_points:  {}\n{{\n", points.len());
        for (x, y) in points {
            out.push_str(&format!("{x} {y}\n"));
        }
        out.push('}');
        out
    }

    fn sample_points() -> Vec<(f64, f64)> {
        (0..NUM_FACIAL_LANDMARKS)
            .map(|i| (100.0 + i as f64 + 0.75, 200.25 - i as f64))
            .collect()
    }

    #[test]
    fn test_parse_pts_record() {
        let record = parse_record(&pts_record(&sample_points()), &RecordConfig::default()).unwrap();
        assert_eq!(record.header.len(), 3);
        assert_eq!(record.landmarks.len(), NUM_FACIAL_LANDMARKS);
        assert_eq!(record.landmarks[0], (100, 200));
        assert_eq!(record.landmarks[67], (167, 133));
        assert!(!record.is_annotated());
    }

    #[test]
    fn test_parse_annotated_record() {
        let content = format!("{}\n12.5 -3.25 0.0", pts_record(&sample_points()));
        let record = parse_record(&content, &RecordConfig::default()).unwrap();
        assert_eq!(record.pose, Some(EulerAngles::new(12.5, -3.25, 0.0)));
    }

    #[test]
    fn test_short_record_rejected() {
        let mut points = sample_points();
        points.truncate(60);
        let content = pts_record(&points).replace("n_points:  60", "n_points:  68");
        assert!(matches!(
            parse_record(&content, &RecordConfig::default()),
            Err(Error::RecordFormat { .. })
        ));
    }

    #[test]
    fn test_declared_count_must_match() {
        let content = pts_record(&sample_points()).replace("n_points:  68", "n_points:  49");
        match parse_record(&content, &RecordConfig::default()) {
            Err(Error::RecordFormat { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected record format error, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_coordinate_line_reports_line_number() {
        let content = pts_record(&sample_points()).replacen("105.75 195.25", "105.75", 1);
        match parse_record(&content, &RecordConfig::default()) {
            Err(Error::RecordFormat { line, .. }) => assert_eq!(line, 9),
            other => panic!("expected record format error, got {other:?}"),
        }

        let content = pts_record(&sample_points()).replacen("105.75 195.25", "105.75 abc", 1);
        assert!(matches!(
            parse_record(&content, &RecordConfig::default()),
            Err(Error::RecordFormat { line: 9, .. })
        ));
    }

    #[test]
    fn test_unexpected_trailing_content() {
        let content = format!("{}\nnot a pose", pts_record(&sample_points()));
        assert!(matches!(
            parse_record(&content, &RecordConfig::default()),
            Err(Error::RecordFormat { .. })
        ));

        let content = format!("{}\n1 2 3\n4 5 6", pts_record(&sample_points()));
        assert!(matches!(
            parse_record(&content, &RecordConfig::default()),
            Err(Error::RecordFormat { .. })
        ));
    }

    #[test]
    fn test_headerless_schema() {
        let schema = RecordConfig {
            header_lines: 0,
            point_count: NUM_FACIAL_LANDMARKS,
        };
        let content: String = sample_points().iter().map(|(x, y)| format!("{x} {y}\n")).collect();
        let record = parse_record(&content, &schema).unwrap();
        assert!(record.header.is_empty());
        assert_eq!(record.landmarks.len(), NUM_FACIAL_LANDMARKS);
    }

    #[test]
    fn test_format_pose_line() {
        let line = format_pose_line(&EulerAngles::new(-172.456_78, 3.0, 0.000_1));
        assert_eq!(line, "-172.457 3.000 0.000");
    }

    #[test]
    fn test_append_pose_preserves_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.txt");
        let original = pts_record(&sample_points());
        fs::write(&path, &original).unwrap();

        append_pose(&path, &EulerAngles::new(1.0, -2.0, 3.5)).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with(&original));
        assert_eq!(written.lines().last(), Some("1.000 -2.000 3.500"));
        assert_eq!(written.len(), original.len() + 1 + "1.000 -2.000 3.500".len());

        let record = read_record(&path, &RecordConfig::default()).unwrap();
        assert_eq!(record.pose, Some(EulerAngles::new(1.0, -2.0, 3.5)));
    }

    #[test]
    fn test_append_pose_after_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.txt");
        let original = format!("{}\n", pts_record(&sample_points()));
        fs::write(&path, &original).unwrap();

        append_pose(&path, &EulerAngles::default()).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, format!("{original}0.000 0.000 0.000"));
    }

    #[test]
    fn test_append_pose_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            append_pose(dir.path().join("missing.txt"), &EulerAngles::default()),
            Err(Error::Io(_))
        ));
    }
}
