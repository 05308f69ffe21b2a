//! Failures raised while wiring the process together, before any request is served.

use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("database setup failed: {0}")]
    Database(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("could not install telemetry: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn database(cause: impl Display) -> Self {
        Self::Database(cause.to_string())
    }

    pub fn configuration(cause: impl Display) -> Self {
        Self::Configuration(cause.to_string())
    }

    pub fn telemetry(cause: impl Display) -> Self {
        Self::Telemetry(cause.to_string())
    }
}
