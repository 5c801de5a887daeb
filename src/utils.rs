/// Utility functions for unit conversion, averaging and formatting
use std::f64::consts::PI;
use time::{format_description, OffsetDateTime};

use crate::error::{Result, StationError};

/// Anemometer calibration: converts inches per second of cup travel to mph
const WIND_CALIBRATION_FACTOR: f64 = 17.6;

/// The anemometer switch closes twice per rotation
const PULSES_PER_ROTATION: f64 = 2.0;

/// Format a timestamp as YYYY-MM-DD HH:MM:SS
///
/// Falls back to default string representation if formatting fails.
pub fn format_timestamp(dt: &OffsetDateTime) -> String {
    match format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Current local time truncated to whole seconds
///
/// The local offset cannot always be determined (e.g. multi-threaded
/// processes on some platforms), in which case UTC is used.
pub fn now_local_seconds() -> OffsetDateTime {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.replace_nanosecond(0).unwrap_or(now)
}

/// Arithmetic mean of a per-quantity sample sequence
///
/// `quantity` names the series in the `EmptySample` error so callers can tell
/// which sensor produced no data.
pub fn arithmetic_mean(samples: &[f64], quantity: &'static str) -> Result<f64> {
    if samples.is_empty() {
        return Err(StationError::EmptySample(quantity));
    }
    let sum: f64 = samples.iter().sum();
    Ok(sum / samples.len() as f64)
}

/// Convert anemometer pulses counted over a window into wind speed
///
/// # Arguments
/// * `radius_in` - Anemometer arm radius in inches
/// * `wind_count` - Switch closures counted during the window
/// * `duration_secs` - Window length in seconds
pub fn wind_speed_mph(radius_in: f64, wind_count: u64, duration_secs: f64) -> Result<f64> {
    if !(duration_secs > 0.0) {
        return Err(StationError::InvalidInput(format!(
            "window duration must be positive, got {}",
            duration_secs
        )));
    }

    let circumference_in = 2.0 * PI * radius_in;
    let rotations = wind_count as f64 / PULSES_PER_ROTATION;
    let inches_per_sec = circumference_in * rotations / duration_secs;

    Ok(inches_per_sec / WIND_CALIBRATION_FACTOR)
}

/// Rainfall in the gauge's native unit for a number of bucket tips
pub fn rainfall(rain_count: u64, rain_per_tip: f64) -> f64 {
    rain_count as f64 * rain_per_tip
}
