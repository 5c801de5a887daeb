use log::{debug, error};
use openssl::ssl::{SslConnector, SslMethod};
use postgres_openssl::MakeTlsConnector;
use std::future::Future;
use tokio::time::{timeout, Duration};
use url::Url;

use crate::error::{Result, StationError};

const MAX_RETRIES: u32 = 3;
const WAIT_BETWEEN_RETRIES: Duration = Duration::from_secs(5);
/// Upper bound on one connect + query attempt
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest a store can take before its failure is handed back to the caller
pub const fn retry_budget() -> Duration {
    Duration::from_secs(
        MAX_RETRIES as u64 * ATTEMPT_TIMEOUT.as_secs()
            + (MAX_RETRIES as u64 - 1) * WAIT_BETWEEN_RETRIES.as_secs(),
    )
}

/// TLS connector trusting the CA in `sslrootcert_path`
///
/// Server certificates are verified against that CA; a self-signed server
/// works by pointing `sslrootcert` at its certificate.
pub fn ssl_connector(sslrootcert_path: &str) -> Result<SslConnector> {
    let mut builder = SslConnector::builder(SslMethod::tls())
        .map_err(|e| StationError::Storage(format!("SSL builder error: {}", e)))?;

    builder
        .set_ca_file(sslrootcert_path)
        .map_err(|e| StationError::Storage(format!("Error loading CA cert: {}", e)))?;

    Ok(builder.build())
}

pub fn create_ssl_connector(sslrootcert_path: &str) -> Result<MakeTlsConnector> {
    Ok(MakeTlsConnector::new(ssl_connector(sslrootcert_path)?))
}

/// Split the `sslrootcert` parameter out of a connection URL
///
/// tokio-postgres rejects the parameter, so it is removed from the URL and
/// returned separately as the CA file path.
pub fn split_sslrootcert(database_url: &str) -> Result<(String, String)> {
    let url = Url::parse(database_url)
        .map_err(|e| StationError::Configuration(format!("DATABASE_URL parse error: {}", e)))?;

    let mut sslrootcert_path = None;
    let mut clean_params = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == "sslrootcert" {
            sslrootcert_path = Some(value.to_string());
        } else {
            clean_params.push((key.into_owned(), value.into_owned()));
        }
    }

    let sslrootcert_path = sslrootcert_path.ok_or_else(|| {
        StationError::Configuration("sslrootcert parameter missing from DATABASE_URL".into())
    })?;

    let mut clean_url = url.clone();
    clean_url.set_query(None);
    if !clean_params.is_empty() {
        let query = clean_params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        clean_url.set_query(Some(&query));
    }

    Ok((clean_url.to_string(), sslrootcert_path))
}

pub async fn execute_with_retry<F, Fut>(database_url: &str, operation: F) -> Result<()>
where
    F: Fn(tokio_postgres::Client) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<u64, tokio_postgres::Error>> + Send,
{
    // Neither a malformed URL nor a bad CA file will fix itself between attempts
    let (clean_database_url, sslrootcert_path) = split_sslrootcert(database_url)?;
    let connector = create_ssl_connector(&sslrootcert_path)?;
    let clean_database_url = clean_database_url.as_str();
    let operation = &operation;

    retry(|| {
        let connector = connector.clone();
        async move {
            let (client, connection) = tokio_postgres::connect(clean_database_url, connector)
                .await
                .map_err(|e| format!("connection error: {}", e))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });

            operation(client)
                .await
                .map_err(|e| format!("query error: {}", e))
        }
    })
    .await
}

/// Run `attempt` up to `MAX_RETRIES` times, each bounded by `ATTEMPT_TIMEOUT`
async fn retry<A, AF>(mut attempt: A) -> Result<()>
where
    A: FnMut() -> AF,
    AF: Future<Output = std::result::Result<u64, String>>,
{
    for n in 1..=MAX_RETRIES {
        match timeout(ATTEMPT_TIMEOUT, attempt()).await {
            Ok(Ok(rows)) => {
                debug!("Query affected {} row(s) on attempt {}", rows, n);
                return Ok(());
            }
            Ok(Err(e)) => error!("Attempt {}: {}", n, e),
            Err(_) => error!("Attempt {}: timed out after {:?}", n, ATTEMPT_TIMEOUT),
        }

        if n < MAX_RETRIES {
            tokio::time::sleep(WAIT_BETWEEN_RETRIES).await;
        }
    }

    Err(StationError::Storage(format!(
        "gave up after {} attempts ({:?} retry budget)",
        MAX_RETRIES,
        retry_budget()
    )))
}
