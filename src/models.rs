use std::fmt;
use time::OffsetDateTime;

use crate::utils::format_timestamp;

/// One tick of the temperature/pressure/humidity probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentalReading {
    pub temperature_f: f64,
    /// Sensor-native unit (hPa for the BME280), passed through untouched
    pub pressure: f64,
    pub humidity: f64,
}

/// The 16 named compass directions, each covering a 22.5° arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompassSector {
    N,
    NNE,
    NE,
    ENE,
    E,
    ESE,
    SE,
    SSE,
    S,
    SSW,
    SW,
    WSW,
    W,
    WNW,
    NW,
    NNW,
}

impl CompassSector {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CompassSector::N => "N",
            CompassSector::NNE => "NNE",
            CompassSector::NE => "NE",
            CompassSector::ENE => "ENE",
            CompassSector::E => "E",
            CompassSector::ESE => "ESE",
            CompassSector::SE => "SE",
            CompassSector::SSE => "SSE",
            CompassSector::S => "S",
            CompassSector::SSW => "SSW",
            CompassSector::SW => "SW",
            CompassSector::WSW => "WSW",
            CompassSector::W => "W",
            CompassSector::WNW => "WNW",
            CompassSector::NW => "NW",
            CompassSector::NNW => "NNW",
        }
    }
}

impl fmt::Display for CompassSector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finished sampling window, handed to a record sink.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    pub wind_count: u64,
    pub wind_speed_mph: f64,
    pub wind_direction: CompassSector,
    pub temperature_f: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub rainfall: f64,
    /// Number of probe/vane polls that went into the averages
    pub samples: usize,
    /// Window close time, whole seconds
    pub timestamp: OffsetDateTime,
}

impl AggregatedRecord {
    pub fn timestamp_string(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}
