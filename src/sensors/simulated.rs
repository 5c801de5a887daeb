//! In-process stand-ins for the station hardware.
//!
//! Every read sleeps for a fixed latency, which is what lets a sampling
//! window make progress on a paused test clock. Latency must be non-zero.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::error::Result;
use crate::models::EnvironmentalReading;
use crate::sensors::edge_counter::EdgeEvent;
use crate::sensors::environment::EnvironmentalProbe;
use crate::sensors::vane::AdcChannel;

/// Full-scale voltage the simulated ADC is referenced to
const SIMULATED_REFERENCE: f64 = 3.3;

/// ADC that cycles through a fixed list of normalised values
pub struct SimulatedAdc {
    values: Vec<f64>,
    next: usize,
    latency: Duration,
}

impl SimulatedAdc {
    pub fn new(values: Vec<f64>, latency: Duration) -> Self {
        Self {
            values,
            next: 0,
            latency,
        }
    }

    /// ADC pinned at one divider voltage
    pub fn for_voltage(voltage: f64, latency: Duration) -> Self {
        Self::new(vec![voltage / SIMULATED_REFERENCE], latency)
    }
}

#[async_trait]
impl AdcChannel for SimulatedAdc {
    async fn read_value(&mut self) -> Result<f64> {
        sleep(self.latency).await;
        let value = self.values.get(self.next).copied().unwrap_or(0.0);
        self.next = (self.next + 1) % self.values.len().max(1);
        Ok(value)
    }
}

/// Probe returning a constant reading
pub struct SimulatedProbe {
    reading: EnvironmentalReading,
    latency: Duration,
}

impl SimulatedProbe {
    pub fn new(reading: EnvironmentalReading, latency: Duration) -> Self {
        Self { reading, latency }
    }
}

#[async_trait]
impl EnvironmentalProbe for SimulatedProbe {
    async fn read(&mut self) -> Result<EnvironmentalReading> {
        sleep(self.latency).await;
        Ok(self.reading)
    }
}

/// Switch closing at a fixed period
pub struct SimulatedEdgeSource {
    period: Duration,
}

impl SimulatedEdgeSource {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn spawn(self, tx: mpsc::Sender<EdgeEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                sleep(self.period).await;
                if tx.send(EdgeEvent::now()).await.is_err() {
                    break;
                }
            }
        })
    }
}
