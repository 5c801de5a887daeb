//! Error taxonomy for the acquisition loop.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, StationError>;

#[derive(Error, Debug)]
pub enum StationError {
    /// Invalid or missing configuration, fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A sensor could not be opened.
    #[error("failed to initialise {sensor}: {source}")]
    Construction {
        sensor: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A read failed in the middle of a sampling window.
    #[error("{sensor} read failed: {message}")]
    SensorIo {
        sensor: &'static str,
        message: String,
    },

    /// No samples were collected for the named quantity.
    #[error("no {0} samples collected in window")]
    EmptySample(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Mean sine and mean cosine are both zero, so the angles have no mean direction.
    #[error("circular mean is undefined: sample vectors cancel out")]
    DivisionSingularity,

    #[error("sampling window cancelled by shutdown")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(String),
}

impl StationError {
    pub fn sensor_io(sensor: &'static str, message: impl std::fmt::Display) -> Self {
        StationError::SensorIo {
            sensor,
            message: message.to_string(),
        }
    }

    /// What the outer loop does when a window ends with this error.
    pub fn window_failure(&self) -> WindowFailure {
        match self {
            StationError::Cancelled => WindowFailure::Shutdown,
            StationError::SensorIo { .. } | StationError::EmptySample(_) => WindowFailure::Rebuild,
            StationError::DivisionSingularity
            | StationError::InvalidInput(_)
            | StationError::Storage(_) => WindowFailure::Skip,
            StationError::Configuration(_) | StationError::Construction { .. } => {
                WindowFailure::Fatal
            }
        }
    }
}

/// Outer-loop handling of a failed sampling window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFailure {
    /// Drop the window and start the next one with the same sensors
    Skip,
    /// Reopen the sensors before the next window
    Rebuild,
    Shutdown,
    Fatal,
}
