/// Database operations for storing weather records
use crate::database::connection::execute_with_retry;
use crate::error::Result;
use crate::models::AggregatedRecord;

/// Store one aggregated weather record in the weather_data table
///
/// # Arguments
/// * `record` - Finished sampling window
/// * `database_url` - PostgreSQL connection string
pub async fn store_weather_record(record: &AggregatedRecord, database_url: &str) -> Result<()> {
    // Clone data for move into async closure
    let record = record.clone();

    execute_with_retry(database_url, move |client| {
        let record = record.clone();
        async move {
            client.execute(
                "INSERT INTO weather_data(wind_count, wind_speed_mph, wind_direction, temperature, pressure, humidity, rainfall, samples, time)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                &[
                    &(record.wind_count as i64),
                    &record.wind_speed_mph,
                    &record.wind_direction.as_str(),
                    &record.temperature_f,
                    &record.pressure,
                    &record.humidity,
                    &record.rainfall,
                    &(record.samples as i32),
                    &record.timestamp,
                ],
            ).await
        }
    }).await
}
