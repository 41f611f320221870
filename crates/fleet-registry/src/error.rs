//! Registry and fetch-boundary error types

use fleet_core::CoreError;
use thiserror::Error;

/// Errors at the registry store and fetch boundary
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Registry fetch failed: {0}")]
    Fetch(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected registry envelope: {0}")]
    BadEnvelope(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl RegistryError {
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn bad_envelope(msg: impl Into<String>) -> Self {
        Self::BadEnvelope(msg.into())
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
