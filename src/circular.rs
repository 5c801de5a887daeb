//! Circular statistics for wind direction.
//!
//! Angles wrap at 360°, so an arithmetic mean of 350° and 10° would point
//! south. Averaging is done on unit vectors instead.

use crate::error::{Result, StationError};
use crate::models::CompassSector;

/// Compass sectors as half-open `[start, end)` arcs in degrees.
///
/// North is the only arc that wraps, so its start is greater than its end.
const SECTOR_TABLE: [(f64, f64, CompassSector); 16] = [
    (348.75, 11.25, CompassSector::N),
    (11.25, 33.75, CompassSector::NNE),
    (33.75, 56.25, CompassSector::NE),
    (56.25, 78.75, CompassSector::ENE),
    (78.75, 101.25, CompassSector::E),
    (101.25, 123.75, CompassSector::ESE),
    (123.75, 146.25, CompassSector::SE),
    (146.25, 168.75, CompassSector::SSE),
    (168.75, 191.25, CompassSector::S),
    (191.25, 213.75, CompassSector::SSW),
    (213.75, 236.25, CompassSector::SW),
    (236.25, 258.75, CompassSector::WSW),
    (258.75, 281.25, CompassSector::W),
    (281.25, 303.75, CompassSector::WNW),
    (303.75, 326.25, CompassSector::NW),
    (326.25, 348.75, CompassSector::NNW),
];

/// Vector mean of a sequence of angles in degrees, in `[0, 360)`.
///
/// The mean sine and cosine select the quadrant of `atan(sin / cos)`. When the
/// mean cosine is exactly zero the result is 90° or 270° by the sign of the
/// mean sine; if both are zero the samples cancel and there is no direction.
pub fn circular_mean(angles: &[f64]) -> Result<f64> {
    if angles.is_empty() {
        return Err(StationError::InvalidInput(
            "circular mean of an empty angle sequence".into(),
        ));
    }

    let (sin_sum, cos_sum) = angles.iter().fold((0.0_f64, 0.0_f64), |(s, c), angle| {
        let r = angle.to_radians();
        (s + r.sin(), c + r.cos())
    });

    let count = angles.len() as f64;
    let mean_sin = sin_sum / count;
    let mean_cos = cos_sum / count;

    mean_direction(mean_sin, mean_cos)
}

/// Quadrant-corrected direction of the mean vector `(mean_cos, mean_sin)`.
fn mean_direction(mean_sin: f64, mean_cos: f64) -> Result<f64> {
    let average = if mean_cos == 0.0 {
        if mean_sin > 0.0 {
            90.0
        } else if mean_sin < 0.0 {
            270.0
        } else {
            return Err(StationError::DivisionSingularity);
        }
    } else {
        let arc = (mean_sin / mean_cos).atan().to_degrees();
        if mean_cos < 0.0 {
            arc + 180.0
        } else if mean_sin < 0.0 {
            arc + 360.0
        } else {
            arc
        }
    };

    Ok(if average >= 360.0 { 0.0 } else { average })
}

/// The compass sector whose arc contains `angle`.
///
/// Angles outside `[0, 360)` are wrapped first.
pub fn sector_for_angle(angle: f64) -> Result<CompassSector> {
    if !angle.is_finite() {
        return Err(StationError::InvalidInput(format!(
            "angle must be finite, got {}",
            angle
        )));
    }
    let angle = angle.rem_euclid(360.0);

    for (start, end, sector) in SECTOR_TABLE.iter() {
        let contains = if start > end {
            angle >= *start || angle < *end
        } else {
            angle >= *start && angle < *end
        };
        if contains {
            return Ok(*sector);
        }
    }

    // The table covers the whole circle
    Err(StationError::InvalidInput(format!(
        "angle {} not covered by sector table",
        angle
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angular_distance(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(360.0);
        d.min(360.0 - d)
    }

    #[test]
    fn test_mean_of_right_angle_pair() {
        let mean = circular_mean(&[0.0, 90.0]).unwrap();
        assert!((mean - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_wraps_through_north() {
        let mean = circular_mean(&[350.0, 10.0]).unwrap();
        assert!(angular_distance(mean, 0.0) < 1e-9, "got {}", mean);
        assert_eq!(sector_for_angle(mean).unwrap(), CompassSector::N);
    }

    #[test]
    fn test_singleton_mean_is_identity() {
        for i in 0..16 {
            let angle = i as f64 * 22.5;
            let mean = circular_mean(&[angle]).unwrap();
            assert!(angular_distance(mean, angle) < 1e-9, "{} -> {}", angle, mean);
            assert!((0.0..360.0).contains(&mean));
        }
    }

    #[test]
    fn test_mean_quadrants() {
        assert!((circular_mean(&[135.0, 180.0]).unwrap() - 157.5).abs() < 1e-9);
        assert!((circular_mean(&[225.0, 270.0]).unwrap() - 247.5).abs() < 1e-9);
        assert!((circular_mean(&[300.0, 330.0]).unwrap() - 315.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_of_empty_sequence_is_invalid() {
        assert!(matches!(
            circular_mean(&[]),
            Err(StationError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_zero_cosine_uses_sine_sign() {
        assert_eq!(mean_direction(0.5, 0.0).unwrap(), 90.0);
        assert_eq!(mean_direction(-0.5, 0.0).unwrap(), 270.0);
        assert!(matches!(
            mean_direction(0.0, 0.0),
            Err(StationError::DivisionSingularity)
        ));
    }

    #[test]
    fn test_opposite_angles_point_along_sine() {
        // cos(0°) + cos(180°) cancels exactly; the residual sine of 180° decides
        let mean = circular_mean(&[0.0, 180.0]).unwrap();
        assert!(angular_distance(mean, 90.0) < 1e-6, "got {}", mean);
    }

    #[test]
    fn test_sector_boundaries() {
        assert_eq!(sector_for_angle(0.0).unwrap(), CompassSector::N);
        assert_eq!(sector_for_angle(11.24).unwrap(), CompassSector::N);
        assert_eq!(sector_for_angle(11.25).unwrap(), CompassSector::NNE);
        assert_eq!(sector_for_angle(11.26).unwrap(), CompassSector::NNE);
        assert_eq!(sector_for_angle(90.0).unwrap(), CompassSector::E);
        assert_eq!(sector_for_angle(348.74).unwrap(), CompassSector::NNW);
        assert_eq!(sector_for_angle(348.75).unwrap(), CompassSector::N);
        assert_eq!(sector_for_angle(359.9).unwrap(), CompassSector::N);
    }

    #[test]
    fn test_every_vane_angle_maps_to_its_own_sector() {
        for (i, (_, _, expected)) in SECTOR_TABLE.iter().enumerate() {
            let angle = i as f64 * 22.5;
            assert_eq!(sector_for_angle(angle).unwrap(), *expected);
        }
    }

    #[test]
    fn test_sector_wraps_out_of_range_angles() {
        assert_eq!(sector_for_angle(360.0).unwrap(), CompassSector::N);
        assert_eq!(sector_for_angle(-90.0).unwrap(), CompassSector::W);
        assert!(sector_for_angle(f64::NAN).is_err());
    }
}
