//! Temperature, pressure and humidity probe.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::EnvironmentalReading;

/// Polled once per sampling tick
#[async_trait]
pub trait EnvironmentalProbe: Send {
    async fn read(&mut self) -> Result<EnvironmentalReading>;
}

/// Calibrated output of a combined temperature/pressure/humidity sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    pub temperature_c: f64,
    pub pressure: f64,
    pub humidity: f64,
}

/// Source of calibrated climate samples (the bus driver)
#[async_trait]
pub trait ClimateSensor: Send {
    async fn sample(&mut self) -> Result<ClimateSample>;
}

/// BME280-style probe reporting temperature in °F
///
/// Pressure and humidity pass through in the sensor's own units.
pub struct Bme280Probe<S> {
    sensor: S,
}

impl<S: ClimateSensor> Bme280Probe<S> {
    pub fn new(sensor: S) -> Self {
        Self { sensor }
    }
}

#[async_trait]
impl<S: ClimateSensor> EnvironmentalProbe for Bme280Probe<S> {
    async fn read(&mut self) -> Result<EnvironmentalReading> {
        let sample = self.sensor.sample().await?;
        Ok(EnvironmentalReading {
            temperature_f: celsius_to_fahrenheit(sample.temperature_c),
            pressure: sample.pressure,
            humidity: sample.humidity,
        })
    }
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * (9.0 / 5.0) + 32.0
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClimate(ClimateSample);

    #[async_trait]
    impl ClimateSensor for FixedClimate {
        async fn sample(&mut self) -> Result<ClimateSample> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_celsius_to_fahrenheit() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
    }

    #[tokio::test]
    async fn test_probe_converts_temperature_only() {
        let mut probe = Bme280Probe::new(FixedClimate(ClimateSample {
            temperature_c: 20.0,
            pressure: 1013.25,
            humidity: 45.5,
        }));
        let reading = probe.read().await.unwrap();
        assert_eq!(reading.temperature_f, 68.0);
        assert_eq!(reading.pressure, 1013.25);
        assert_eq!(reading.humidity, 45.5);
    }
}
