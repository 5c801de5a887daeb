//! Linux sysfs adapters.
//!
//! Bus bring-up is left to the kernel drivers (mcp320x, bme280, gpio); these
//! adapters only read the attributes those drivers expose.

use async_trait::async_trait;
use log::{debug, error, info};
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::error::{Result, StationError};
use crate::sensors::edge_counter::EdgeEvent;
use crate::sensors::environment::{ClimateSample, ClimateSensor};
use crate::sensors::vane::AdcChannel;

pub const I2C_DEVICES_ROOT: &str = "/sys/bus/i2c/devices";
pub const GPIO_ROOT: &str = "/sys/class/gpio";

/// MCP3008 full-scale raw value (10-bit)
const ADC_FULL_SCALE: f64 = 1023.0;
const GPIO_POLL_INTERVAL: Duration = Duration::from_millis(1);

async fn read_attribute(path: &Path) -> io::Result<f64> {
    let text = tokio::fs::read_to_string(path).await?;
    text.trim()
        .parse::<f64>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{}: {}", path.display(), e)))
}

/// One channel of an IIO ADC (`in_voltage{N}_raw`)
pub struct IioAdcChannel {
    path: PathBuf,
}

impl IioAdcChannel {
    pub async fn open(device_dir: &Path, channel: u8) -> Result<Self> {
        let path = device_dir.join(format!("in_voltage{}_raw", channel));
        read_attribute(&path)
            .await
            .map_err(|source| StationError::Construction {
                sensor: "wind vane ADC",
                source,
            })?;
        info!("Wind vane ADC channel {} at {}", channel, path.display());
        Ok(Self { path })
    }
}

#[async_trait]
impl AdcChannel for IioAdcChannel {
    async fn read_value(&mut self) -> Result<f64> {
        let raw = read_attribute(&self.path)
            .await
            .map_err(|e| StationError::sensor_io("wind vane ADC", e))?;
        Ok(raw / ADC_FULL_SCALE)
    }
}

/// BME280 bound to the kernel IIO driver
pub struct IioBme280 {
    device_dir: PathBuf,
}

impl IioBme280 {
    pub async fn open(port: u8, address: u16) -> Result<Self> {
        Self::open_at(Path::new(I2C_DEVICES_ROOT), port, address).await
    }

    /// Locate the IIO device under `{root}/{port}-{address:04x}/`
    pub async fn open_at(root: &Path, port: u8, address: u16) -> Result<Self> {
        let client_dir = root.join(format!("{}-{:04x}", port, address));
        let construction = |source| StationError::Construction {
            sensor: "BME280",
            source,
        };

        let mut entries = tokio::fs::read_dir(&client_dir).await.map_err(construction)?;
        let mut device_dir = None;
        while let Some(entry) = entries.next_entry().await.map_err(construction)? {
            if entry.file_name().to_string_lossy().starts_with("iio:device") {
                device_dir = Some(entry.path());
                break;
            }
        }

        let device_dir = device_dir.ok_or_else(|| {
            construction(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no IIO device under {}", client_dir.display()),
            ))
        })?;

        let mut sensor = Self { device_dir };
        sensor.read_sample().await.map_err(construction)?;
        info!("BME280 at {}", sensor.device_dir.display());
        Ok(sensor)
    }

    async fn read_sample(&mut self) -> io::Result<ClimateSample> {
        // IIO units: milli-°C, kPa, milli-percent
        let temperature = read_attribute(&self.device_dir.join("in_temp_input")).await?;
        let pressure = read_attribute(&self.device_dir.join("in_pressure_input")).await?;
        let humidity = read_attribute(&self.device_dir.join("in_humidityrelative_input")).await?;

        Ok(ClimateSample {
            temperature_c: temperature / 1000.0,
            pressure: pressure * 10.0,
            humidity: humidity / 1000.0,
        })
    }
}

#[async_trait]
impl ClimateSensor for IioBme280 {
    async fn sample(&mut self) -> Result<ClimateSample> {
        self.read_sample()
            .await
            .map_err(|e| StationError::sensor_io("BME280", e))
    }
}

/// Button input on a sysfs GPIO line
///
/// The switch pulls the line low; each high→low transition is one edge.
pub struct GpioEdgeSource {
    name: &'static str,
    value_path: PathBuf,
    /// Line level seen at open; a switch resting closed is not an edge
    initial_high: bool,
}

impl GpioEdgeSource {
    pub async fn open(name: &'static str, pin: u8) -> Result<Self> {
        Self::open_at(Path::new(GPIO_ROOT), name, pin).await
    }

    pub async fn open_at(root: &Path, name: &'static str, pin: u8) -> Result<Self> {
        let construction = |source| StationError::Construction {
            sensor: name,
            source,
        };
        let pin_dir = root.join(format!("gpio{}", pin));

        if tokio::fs::metadata(&pin_dir).await.is_err() {
            debug!("Exporting GPIO {}", pin);
            tokio::fs::write(root.join("export"), pin.to_string())
                .await
                .map_err(construction)?;
        }
        tokio::fs::write(pin_dir.join("direction"), "in")
            .await
            .map_err(construction)?;

        let value_path = pin_dir.join("value");
        let initial_high = read_attribute(&value_path).await.map_err(construction)? != 0.0;
        info!(
            "{} on GPIO {} (line {})",
            name,
            pin,
            if initial_high { "high" } else { "low" }
        );

        Ok(Self {
            name,
            value_path,
            initial_high,
        })
    }

    /// Poll the line and report falling edges until the receiver goes away
    pub fn spawn(self, tx: mpsc::Sender<EdgeEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(GPIO_POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut previous_high = self.initial_high;

            while !tx.is_closed() {
                ticker.tick().await;
                let high = match read_attribute(&self.value_path).await {
                    Ok(value) => value != 0.0,
                    Err(e) => {
                        error!("{}: GPIO read failed: {}", self.name, e);
                        break;
                    }
                };

                if previous_high && !high && tx.send(EdgeEvent::now()).await.is_err() {
                    break;
                }
                previous_high = high;
            }
            debug!("{}: GPIO poller stopped", self.name);
        })
    }
}
