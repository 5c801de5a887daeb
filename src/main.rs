mod aggregator;
mod circular;
mod config;
mod database;
mod error;
mod models;
mod sensors;
mod utils;

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

use aggregator::{Calibration, SamplingWindowAggregator};
use config::StationConfig;
use database::{LogSink, PostgresSink, RecordSink};
use error::WindowFailure;
use models::AggregatedRecord;
use sensors::open_sensors;

/// Pause before rebuilding the sensors after a failed window
const RECOVERY_PAUSE: Duration = Duration::from_secs(5);

async fn build_aggregator(
    config: &StationConfig,
    shutdown: &watch::Receiver<bool>,
) -> error::Result<SamplingWindowAggregator> {
    let sensors = open_sensors(&config.sensors, config.backend).await?;
    let calibration = Calibration {
        radius_in: config.sensors.wind_speed.radius_in,
        rain_per_tip: config.sensors.rain_bucket.rain_per_trip,
    };
    Ok(SamplingWindowAggregator::new(
        sensors,
        calibration,
        shutdown.clone(),
    ))
}

fn log_summary(record: &AggregatedRecord) {
    info!("Summary for window closing {}:", record.timestamp_string());
    info!("  Wind pulses: {}", record.wind_count);
    info!("  Wind speed: {:.2} mph", record.wind_speed_mph);
    info!("  Wind direction: {}", record.wind_direction);
    info!("  Average temperature: {:.2}°F", record.temperature_f);
    info!("  Average pressure: {:.2}", record.pressure);
    info!("  Average humidity: {:.2}%", record.humidity);
    info!("  Rainfall: {:.4}", record.rainfall);
    info!("  Based on {} samples", record.samples);
}

async fn main_loop(
    config: StationConfig,
    mut shutdown: watch::Receiver<bool>,
) -> error::Result<()> {
    info!("Starting weather station data collection service");
    info!(
        "Sensor configuration: {} ({:?} backend)",
        config.config_path.display(),
        config.backend
    );

    let mut sink: Box<dyn RecordSink> = match (&config.database_url, config.dry_run) {
        (Some(url), false) => Box::new(PostgresSink::new(url.clone())),
        _ => {
            warn!("Dry run: records will be logged, not stored");
            Box::new(LogSink)
        }
    };

    // Sensors that cannot be opened at startup are fatal
    let mut station = build_aggregator(&config, &shutdown).await?;

    loop {
        if *shutdown.borrow() {
            return Ok(());
        }

        info!(
            "Starting {} second sampling window",
            config.interval.as_secs()
        );

        match station.run_window(config.interval).await {
            Ok(record) => {
                debug!("Aggregator back in {:?} state", station.state());
                log_summary(&record);

                tokio::select! {
                    result = sink.store(&record) => match result {
                        Ok(()) => info!("Successfully stored weather record"),
                        Err(e) => error!("Failed to store weather record: {}", e),
                    },
                    _ = shutdown.changed() => {
                        warn!("Shutdown while storing; record from {} dropped", record.timestamp_string());
                        return Ok(());
                    }
                }
            }
            Err(e) => match e.window_failure() {
                WindowFailure::Shutdown => return Ok(()),
                WindowFailure::Skip => {
                    warn!("Sampling window discarded: {}", e);
                }
                WindowFailure::Rebuild => {
                    error!("Sampling window failed: {}", e);
                    drop(station);
                    tokio::select! {
                        _ = sleep(RECOVERY_PAUSE) => {}
                        _ = shutdown.changed() => return Ok(()),
                    }
                    station = build_aggregator(&config, &shutdown).await?;
                }
                WindowFailure::Fatal => return Err(e),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match StationConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle Ctrl+C gracefully
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested, finishing current step");
                let _ = tx.send(true);
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                // Keep the sender alive so the loop does not read a closed channel as shutdown
                std::future::pending::<()>().await;
            }
        }
    });

    match main_loop(config, rx).await {
        Ok(()) => info!("Program terminated by user. Exiting gracefully."),
        Err(e) => {
            error!("Fatal error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
