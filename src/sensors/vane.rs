//! Wind vane on an ADC channel.
//!
//! The vane switches one of sixteen resistors into a divider, so each
//! heading produces a distinct voltage. Readings are snapped to the nearest
//! table entry.

use async_trait::async_trait;
use log::trace;

use crate::error::Result;

/// ADC reference voltage
const REFERENCE_VOLTAGE: f64 = 3.3;

/// Divider voltage → vane heading in degrees.
///
/// Nearest-voltage lookup walks this table in order and keeps the first
/// minimum, so an exact tie resolves to the earlier entry.
const VOLTAGE_TABLE: [(f64, f64); 16] = [
    (0.4, 0.0),
    (1.4, 22.5),
    (1.2, 45.0),
    (2.8, 67.5),
    (2.7, 90.0),
    (2.9, 112.5),
    (2.2, 135.0),
    (2.5, 157.5),
    (1.8, 180.0),
    (2.0, 202.5),
    (0.7, 225.0),
    (0.8, 247.5),
    (0.1, 270.0),
    (0.3, 292.5),
    (0.2, 315.0),
    (0.6, 337.5),
];

/// A single ADC input
#[async_trait]
pub trait AdcChannel: Send {
    /// Reading normalised to full scale, in [0, 1]
    async fn read_value(&mut self) -> Result<f64>;
}

pub struct AnalogVaneReader {
    adc: Box<dyn AdcChannel>,
}

impl AnalogVaneReader {
    pub fn new(adc: Box<dyn AdcChannel>) -> Self {
        Self { adc }
    }

    /// Sampled voltage in [0.0, 3.3], rounded to one decimal place
    pub async fn read_voltage(&mut self) -> Result<f64> {
        let value = self.adc.read_value().await?.clamp(0.0, 1.0);
        Ok((value * REFERENCE_VOLTAGE * 10.0).round() / 10.0)
    }

    /// Current vane heading in degrees
    pub async fn read_angle(&mut self) -> Result<f64> {
        let voltage = self.read_voltage().await?;
        let angle = nearest_angle(voltage);
        trace!("vane: {:.1} V -> {}°", voltage, angle);
        Ok(angle)
    }
}

/// Heading of the table voltage closest to `voltage`
pub fn nearest_angle(voltage: f64) -> f64 {
    let (mut best_voltage, mut best_angle) = VOLTAGE_TABLE[0];
    for &(table_voltage, angle) in VOLTAGE_TABLE.iter().skip(1) {
        if (table_voltage - voltage).abs() < (best_voltage - voltage).abs() {
            best_voltage = table_voltage;
            best_angle = angle;
        }
    }
    best_angle
}
