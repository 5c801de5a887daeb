//! Sampling window aggregation.
//!
//! A window polls the environmental probe and the wind vane back to back
//! until its end time, then reads the pulse counters once and folds
//! everything into an [`AggregatedRecord`]. Pulse counters keep counting on
//! their own tasks while the window is sampling.

use log::{debug, info, trace, warn};
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

use crate::circular::{circular_mean, sector_for_angle};
use crate::error::{Result, StationError};
use crate::models::{AggregatedRecord, EnvironmentalReading};
use crate::sensors::{AnalogVaneReader, EdgeCounter, EnvironmentalProbe, SensorSet};
use crate::utils::{arithmetic_mean, now_local_seconds, rainfall, wind_speed_mph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Idle,
    Sampling,
    Aggregating,
}

/// Calibration constants used when converting counts
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub radius_in: f64,
    pub rain_per_tip: f64,
}

/// Ordered per-quantity samples of one window
#[derive(Debug, Default)]
struct WindowSamples {
    temperatures: Vec<f64>,
    pressures: Vec<f64>,
    humidities: Vec<f64>,
    angles: Vec<f64>,
}

impl WindowSamples {
    fn push(&mut self, reading: EnvironmentalReading, angle: f64) {
        self.temperatures.push(reading.temperature_f);
        self.pressures.push(reading.pressure);
        self.humidities.push(reading.humidity);
        self.angles.push(angle);
    }

    fn len(&self) -> usize {
        self.angles.len()
    }

    fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }
}

pub struct SamplingWindowAggregator {
    probe: Box<dyn EnvironmentalProbe>,
    vane: AnalogVaneReader,
    wind: EdgeCounter,
    rain: EdgeCounter,
    calibration: Calibration,
    state: WindowState,
    shutdown: watch::Receiver<bool>,
}

impl SamplingWindowAggregator {
    pub fn new(
        sensors: SensorSet,
        calibration: Calibration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        // Edges seen while the other sensors were opening belong to no window
        debug!(
            "discarding {} wind and {} rain pulses seen during setup",
            sensors.wind.count(),
            sensors.rain.count()
        );
        sensors.wind.reset();
        sensors.rain.reset();

        Self {
            probe: sensors.probe,
            vane: sensors.vane,
            wind: sensors.wind,
            rain: sensors.rain,
            calibration,
            state: WindowState::Idle,
            shutdown,
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    /// Sample for `duration`, then emit one record
    ///
    /// A read failure aborts the window; whatever was sampled so far is
    /// discarded. Shutdown is checked before every poll.
    pub async fn run_window(&mut self, duration: Duration) -> Result<AggregatedRecord> {
        if duration.is_zero() {
            return Err(StationError::InvalidInput(
                "sampling window duration must be positive".into(),
            ));
        }

        let result = self.sample_and_aggregate(duration).await;
        self.transition(WindowState::Idle);
        result
    }

    async fn sample_and_aggregate(&mut self, duration: Duration) -> Result<AggregatedRecord> {
        let start = Instant::now();
        let end = start + duration;
        self.transition(WindowState::Sampling);

        // Pulses from between windows are outside [start, end)
        let stale_wind = self.wind.take();
        let stale_rain = self.rain.take();
        if stale_wind > 0 || stale_rain > 0 {
            debug!(
                "window opened: dropped {} wind and {} rain pulses counted since the last window",
                stale_wind, stale_rain
            );
        }

        let samples = self.sample_until(end).await?;

        self.transition(WindowState::Aggregating);
        self.aggregate(samples, duration)
    }

    async fn sample_until(&mut self, end: Instant) -> Result<WindowSamples> {
        let mut samples = WindowSamples::default();

        while Instant::now() < end {
            if *self.shutdown.borrow() {
                return Err(StationError::Cancelled);
            }

            let reading = self.probe.read().await?;
            let angle = self.vane.read_angle().await?;
            trace!(
                "tick: {:.2}°F {:.2} {:.2}% vane {}°",
                reading.temperature_f,
                reading.pressure,
                reading.humidity,
                angle
            );
            samples.push(reading, angle);

            // Let the edge listeners run between polls
            tokio::task::yield_now().await;
        }

        Ok(samples)
    }

    fn aggregate(&mut self, samples: WindowSamples, duration: Duration) -> Result<AggregatedRecord> {
        for counter in [&self.wind, &self.rain] {
            if counter.listener_stopped() {
                return Err(StationError::sensor_io(
                    counter.name(),
                    "edge source stopped during window",
                ));
            }
        }

        let wind_count = self.wind.take();
        let rain_count = self.rain.take();

        if samples.is_empty() {
            warn!("Window closed without a single poll");
            return Err(StationError::EmptySample("wind direction"));
        }

        let wind_speed_mph = wind_speed_mph(
            self.calibration.radius_in,
            wind_count,
            duration.as_secs_f64(),
        )?;
        let direction_angle = circular_mean(&samples.angles)?;
        let wind_direction = sector_for_angle(direction_angle)?;

        let record = AggregatedRecord {
            wind_count,
            wind_speed_mph,
            wind_direction,
            temperature_f: arithmetic_mean(&samples.temperatures, "temperature")?,
            pressure: arithmetic_mean(&samples.pressures, "pressure")?,
            humidity: arithmetic_mean(&samples.humidities, "humidity")?,
            rainfall: rainfall(rain_count, self.calibration.rain_per_tip),
            samples: samples.len(),
            timestamp: now_local_seconds(),
        };

        info!(
            "Window closed: {} polls, {} wind pulses, {} rain tips, mean heading {:.1}°",
            record.samples, wind_count, rain_count, direction_angle
        );
        Ok(record)
    }

    fn transition(&mut self, next: WindowState) {
        if self.state != next {
            debug!("aggregator: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CompassSector;
    use crate::sensors::simulated::{SimulatedAdc, SimulatedProbe};
    use crate::sensors::edge_counter::EdgeEvent;
    use async_trait::async_trait;

    const TICK: Duration = Duration::from_millis(100);

    fn calm_reading() -> EnvironmentalReading {
        EnvironmentalReading {
            temperature_f: 70.0,
            pressure: 1013.0,
            humidity: 45.0,
        }
    }

    fn station(
        probe: Box<dyn EnvironmentalProbe>,
        vane_voltage: f64,
    ) -> (SamplingWindowAggregator, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sensors = SensorSet {
            probe,
            vane: AnalogVaneReader::new(Box::new(SimulatedAdc::for_voltage(vane_voltage, TICK))),
            wind: EdgeCounter::new("anemometer"),
            rain: EdgeCounter::new("rain bucket"),
        };
        let calibration = Calibration {
            radius_in: 3.54,
            rain_per_tip: 0.2794,
        };
        (
            SamplingWindowAggregator::new(sensors, calibration, shutdown_rx),
            shutdown_tx,
        )
    }

    struct FailingProbe {
        reads_before_failure: usize,
    }

    #[async_trait]
    impl EnvironmentalProbe for FailingProbe {
        async fn read(&mut self) -> Result<EnvironmentalReading> {
            tokio::time::sleep(TICK).await;
            if self.reads_before_failure == 0 {
                return Err(StationError::sensor_io("BME280", "bus error"));
            }
            self.reads_before_failure -= 1;
            Ok(calm_reading())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_calm_window_record() {
        let probe = Box::new(SimulatedProbe::new(calm_reading(), TICK));
        // 2.7 V is the vane's 90° position
        let (mut aggregator, _shutdown) = station(probe, 2.7);

        let record = aggregator.run_window(Duration::from_secs(5)).await.unwrap();

        assert_eq!(record.wind_count, 0);
        assert_eq!(record.wind_speed_mph, 0.0);
        assert_eq!(record.wind_direction, CompassSector::E);
        assert_eq!(record.temperature_f, 70.0);
        assert_eq!(record.pressure, 1013.0);
        assert_eq!(record.humidity, 45.0);
        assert_eq!(record.rainfall, 0.0);
        assert!(record.samples > 0);
        assert_eq!(record.timestamp.nanosecond(), 0);
        assert_eq!(aggregator.state(), WindowState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulses_are_converted_and_reset() {
        let probe = Box::new(SimulatedProbe::new(calm_reading(), TICK));
        let (mut aggregator, _shutdown) = station(probe, 0.4);

        let wind_tx = aggregator.wind.listen(Duration::ZERO);
        let rain_tx = aggregator.rain.listen(Duration::ZERO);

        // Edges arrive one second into the window
        let feeder = {
            let wind_tx = wind_tx.clone();
            let rain_tx = rain_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                for _ in 0..20 {
                    wind_tx.send(EdgeEvent::now()).await.unwrap();
                }
                for _ in 0..3 {
                    rain_tx.send(EdgeEvent::now()).await.unwrap();
                }
            })
        };

        let record = aggregator.run_window(Duration::from_secs(5)).await.unwrap();
        feeder.await.unwrap();

        assert_eq!(record.wind_count, 20);
        let expected = wind_speed_mph(3.54, 20, 5.0).unwrap();
        assert!((record.wind_speed_mph - expected).abs() < 1e-12);
        assert!((record.rainfall - 3.0 * 0.2794).abs() < 1e-12);
        assert_eq!(record.wind_direction, CompassSector::N);

        // Counters start the next window from zero
        assert_eq!(aggregator.wind.count(), 0);
        assert_eq!(aggregator.rain.count(), 0);
        let next = aggregator.run_window(Duration::from_secs(5)).await.unwrap();
        assert_eq!(next.wind_count, 0);
        assert_eq!(next.rainfall, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulses_between_windows_are_not_counted() {
        let probe = Box::new(SimulatedProbe::new(calm_reading(), TICK));
        let (mut aggregator, _shutdown) = station(probe, 2.7);

        let wind_tx = aggregator.wind.listen(Duration::ZERO);
        let rain_tx = aggregator.rain.listen(Duration::ZERO);

        let first = aggregator.run_window(Duration::from_secs(5)).await.unwrap();
        assert_eq!(first.wind_count, 0);

        // A slow store: the anemometer keeps turning and the bucket tips
        for _ in 0..50 {
            wind_tx.send(EdgeEvent::now()).await.unwrap();
        }
        rain_tx.send(EdgeEvent::now()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(aggregator.wind.count(), 50);

        let second = aggregator.run_window(Duration::from_secs(5)).await.unwrap();
        assert_eq!(second.wind_count, 0);
        assert_eq!(second.wind_speed_mph, 0.0);
        assert_eq!(second.rainfall, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_is_rejected() {
        let probe = Box::new(SimulatedProbe::new(calm_reading(), TICK));
        let (mut aggregator, _shutdown) = station(probe, 2.7);

        let result = aggregator.run_window(Duration::ZERO).await;
        assert!(matches!(result, Err(StationError::InvalidInput(_))));
        assert_eq!(aggregator.state(), WindowState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_failure_aborts_window() {
        let probe = Box::new(FailingProbe {
            reads_before_failure: 3,
        });
        let (mut aggregator, _shutdown) = station(probe, 2.7);

        let result = aggregator.run_window(Duration::from_secs(5)).await;
        assert!(matches!(result, Err(StationError::SensorIo { .. })));
        assert_eq!(aggregator.state(), WindowState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_window() {
        let probe = Box::new(SimulatedProbe::new(calm_reading(), TICK));
        let (mut aggregator, shutdown) = station(probe, 2.7);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            let _ = shutdown.send(true);
        });

        let started = Instant::now();
        let result = aggregator.run_window(Duration::from_secs(300)).await;
        assert!(matches!(result, Err(StationError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_edge_source_fails_window() {
        let probe = Box::new(SimulatedProbe::new(calm_reading(), TICK));
        let (mut aggregator, _shutdown) = station(probe, 2.7);

        let wind_tx = aggregator.wind.listen(Duration::ZERO);
        drop(wind_tx);

        let result = aggregator.run_window(Duration::from_secs(1)).await;
        assert!(matches!(
            result,
            Err(StationError::SensorIo { sensor: "anemometer", .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_direction_is_circular_mean_of_polls() {
        let probe = Box::new(SimulatedProbe::new(calm_reading(), TICK));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        // Alternate between 337.5° (0.6 V) and 22.5° (1.4 V): mean is north
        let adc = SimulatedAdc::new(vec![0.6 / 3.3, 1.4 / 3.3], TICK);
        let sensors = SensorSet {
            probe,
            vane: AnalogVaneReader::new(Box::new(adc)),
            wind: EdgeCounter::new("anemometer"),
            rain: EdgeCounter::new("rain bucket"),
        };
        let mut aggregator = SamplingWindowAggregator::new(
            sensors,
            Calibration {
                radius_in: 3.54,
                rain_per_tip: 0.2794,
            },
            shutdown_rx,
        );

        // An even number of polls keeps the two headings balanced
        let record = aggregator.run_window(Duration::from_millis(800)).await.unwrap();
        assert_eq!(record.samples % 2, 0);
        assert_eq!(record.wind_direction, CompassSector::N);
        drop(shutdown_tx);
    }
}
