pub mod edge_counter;
pub mod environment;
pub mod linux;
pub mod simulated;
pub mod vane;

use log::info;
use tokio::time::Duration;

use crate::config::{SensorBackend, SensorsConfig};
use crate::error::Result;
use crate::models::EnvironmentalReading;

pub use edge_counter::EdgeCounter;
pub use environment::{Bme280Probe, EnvironmentalProbe};
pub use vane::AnalogVaneReader;

use linux::{GpioEdgeSource, IioAdcChannel, IioBme280};
use simulated::{SimulatedAdc, SimulatedEdgeSource, SimulatedProbe};

/// All hardware inputs of one station
pub struct SensorSet {
    pub probe: Box<dyn EnvironmentalProbe>,
    pub vane: AnalogVaneReader,
    pub wind: EdgeCounter,
    pub rain: EdgeCounter,
}

/// Open every sensor named in the configuration
///
/// Any sensor that cannot be opened fails the whole set.
pub async fn open_sensors(config: &SensorsConfig, backend: SensorBackend) -> Result<SensorSet> {
    let mut wind = EdgeCounter::new("anemometer");
    let mut rain = EdgeCounter::new("rain bucket");

    let sensors = match backend {
        SensorBackend::Linux => {
            let adc = IioAdcChannel::open(&config.wind_vane.device, config.wind_vane.channel).await?;
            let bme = IioBme280::open(config.bme.port, config.bme.address).await?;
            let wind_source = GpioEdgeSource::open("anemometer", config.wind_speed.button).await?;
            let rain_source = GpioEdgeSource::open("rain bucket", config.rain_bucket.button).await?;

            wind_source.spawn(wind.listen(config.wind_speed.debounce()));
            rain_source.spawn(rain.listen(config.rain_bucket.debounce()));

            SensorSet {
                probe: Box::new(Bme280Probe::new(bme)),
                vane: AnalogVaneReader::new(Box::new(adc)),
                wind,
                rain,
            }
        }
        SensorBackend::Simulated => {
            info!("Using simulated sensors");
            let tick = Duration::from_millis(50);

            SimulatedEdgeSource::new(Duration::from_millis(400))
                .spawn(wind.listen(config.wind_speed.debounce()));
            SimulatedEdgeSource::new(Duration::from_secs(90))
                .spawn(rain.listen(config.rain_bucket.debounce()));

            SensorSet {
                probe: Box::new(SimulatedProbe::new(
                    EnvironmentalReading {
                        temperature_f: 70.0,
                        pressure: 1013.0,
                        humidity: 45.0,
                    },
                    tick,
                )),
                // Vane parked on its 45° (NE) divider voltage
                vane: AnalogVaneReader::new(Box::new(SimulatedAdc::for_voltage(1.2, tick))),
                wind,
                rain,
            }
        }
    };

    Ok(sensors)
}
