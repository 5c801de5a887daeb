use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, StationError};

const DEFAULT_CONFIG_PATH: &str = "config/config.yml";
const DEFAULT_INTERVAL_SECS: u64 = 300;
const DEFAULT_IIO_DEVICE: &str = "/sys/bus/iio/devices/iio:device0";
const DEFAULT_WIND_BOUNCE_SECS: f64 = 0.025;
/// MCP3008 has eight single-ended inputs
const ADC_CHANNELS: u8 = 8;

/// Where the station reads its sensors from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorBackend {
    Linux,
    Simulated,
}

#[derive(Debug, Clone)]
pub struct StationConfig {
    pub database_url: Option<String>,
    pub config_path: PathBuf,
    pub interval: Duration,
    pub backend: SensorBackend,
    pub dry_run: bool,
    pub sensors: SensorsConfig,
}

impl StationConfig {
    pub fn new() -> Result<Self> {
        // Load environment variables
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an environment-style lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dry_run = lookup("DRY_RUN")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if database_url.is_none() && !dry_run {
            return Err(StationError::Configuration(
                "DATABASE_URL environment variable not set".into(),
            ));
        }

        let interval_secs = match lookup("SAMPLE_INTERVAL_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                StationError::Configuration(format!("SAMPLE_INTERVAL_SECS is not a whole number: {}", raw))
            })?,
            None => DEFAULT_INTERVAL_SECS,
        };
        if interval_secs == 0 {
            return Err(StationError::Configuration(
                "SAMPLE_INTERVAL_SECS must be greater than zero".into(),
            ));
        }

        let backend = match lookup("SENSOR_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("linux") => SensorBackend::Linux,
            Some("simulated") => SensorBackend::Simulated,
            Some(other) => {
                return Err(StationError::Configuration(format!(
                    "unknown SENSOR_BACKEND '{}', expected 'linux' or 'simulated'",
                    other
                )))
            }
        };

        let config_path = PathBuf::from(
            lookup("STATION_CONFIG").unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string()),
        );
        let sensors = SensorsConfig::load(&config_path)?;

        Ok(StationConfig {
            database_url,
            config_path,
            interval: Duration::from_secs(interval_secs),
            backend,
            dry_run,
            sensors,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    sensors: SensorsConfig,
}

/// The `sensors:` section of the station's YAML document
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SensorsConfig {
    pub wind_vane: WindVaneConfig,
    pub bme: BmeConfig,
    pub rain_bucket: RainBucketConfig,
    pub wind_speed: WindSpeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindVaneConfig {
    /// ADC input the vane divider is wired to
    pub channel: u8,
    /// IIO device directory of the ADC
    #[serde(default = "default_iio_device")]
    pub device: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BmeConfig {
    pub address: u16,
    /// I²C bus number
    pub port: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RainBucketConfig {
    /// Rainfall per bucket tip
    pub rain_per_trip: f64,
    pub button: u8,
    /// Debounce in seconds; none by default
    #[serde(default)]
    pub bounce_time: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindSpeedConfig {
    pub button: u8,
    pub radius_in: f64,
    #[serde(default = "default_wind_bounce")]
    pub bounce_time: Option<f64>,
}

impl RainBucketConfig {
    pub fn debounce(&self) -> Duration {
        seconds_to_duration(self.bounce_time)
    }
}

impl WindSpeedConfig {
    pub fn debounce(&self) -> Duration {
        seconds_to_duration(self.bounce_time)
    }
}

/// Validated configs only hold representable bounce times
fn seconds_to_duration(seconds: Option<f64>) -> Duration {
    seconds
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
        .unwrap_or(Duration::ZERO)
}

fn default_iio_device() -> PathBuf {
    PathBuf::from(DEFAULT_IIO_DEVICE)
}

fn default_wind_bounce() -> Option<f64> {
    Some(DEFAULT_WIND_BOUNCE_SECS)
}

impl SensorsConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StationError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let document: ConfigDocument = serde_yaml::from_str(text)
            .map_err(|e| StationError::Configuration(format!("invalid sensor configuration: {}", e)))?;
        document.sensors.validate()?;
        Ok(document.sensors)
    }

    fn validate(&self) -> Result<()> {
        if self.wind_vane.channel >= ADC_CHANNELS {
            return Err(StationError::Configuration(format!(
                "windVane.channel must be 0-{}, got {}",
                ADC_CHANNELS - 1,
                self.wind_vane.channel
            )));
        }
        if !(self.wind_speed.radius_in.is_finite() && self.wind_speed.radius_in > 0.0) {
            return Err(StationError::Configuration(format!(
                "windSpeed.radius_in must be positive, got {}",
                self.wind_speed.radius_in
            )));
        }
        if !(self.rain_bucket.rain_per_trip.is_finite() && self.rain_bucket.rain_per_trip >= 0.0) {
            return Err(StationError::Configuration(format!(
                "rainBucket.rain_per_trip must be non-negative, got {}",
                self.rain_bucket.rain_per_trip
            )));
        }
        for (key, bounce) in [
            ("windSpeed.bounce_time", self.wind_speed.bounce_time),
            ("rainBucket.bounce_time", self.rain_bucket.bounce_time),
        ] {
            if let Some(seconds) = bounce {
                if Duration::try_from_secs_f64(seconds).is_err() {
                    return Err(StationError::Configuration(format!(
                        "{} must be a non-negative number of seconds, got {}",
                        key, seconds
                    )));
                }
            }
        }
        Ok(())
    }
}
