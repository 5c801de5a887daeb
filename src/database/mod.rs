pub mod connection;
pub mod operations;

use async_trait::async_trait;
use log::info;

use crate::error::Result;
use crate::models::AggregatedRecord;

pub use operations::store_weather_record;

/// Durable destination for finished records
#[async_trait]
pub trait RecordSink: Send {
    async fn store(&mut self, record: &AggregatedRecord) -> Result<()>;
}

/// Inserts records into PostgreSQL
pub struct PostgresSink {
    database_url: String,
}

impl PostgresSink {
    pub fn new(database_url: String) -> Self {
        Self { database_url }
    }
}

#[async_trait]
impl RecordSink for PostgresSink {
    async fn store(&mut self, record: &AggregatedRecord) -> Result<()> {
        store_weather_record(record, &self.database_url).await
    }
}

/// Logs records instead of storing them (dry run)
pub struct LogSink;

#[async_trait]
impl RecordSink for LogSink {
    async fn store(&mut self, record: &AggregatedRecord) -> Result<()> {
        info!(
            "[dry run] {} | wind {} pulses {:.2} mph {} | {:.2}°F {:.2} {:.2}% | rain {:.4}",
            record.timestamp_string(),
            record.wind_count,
            record.wind_speed_mph,
            record.wind_direction,
            record.temperature_f,
            record.pressure,
            record.humidity,
            record.rainfall
        );
        Ok(())
    }
}
