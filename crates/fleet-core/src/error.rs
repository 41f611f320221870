//! Error types for the fleet multitrack system

use thiserror::Error;

/// Core error type shared across the fleet subsystems
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Vehicle not found: {0}")]
    VehicleNotFound(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Malformed patch: {0}")]
    MalformedPatch(String),

    #[error("Invalid position: latitude={lat}, longitude={lng}")]
    InvalidPosition { lat: f64, lng: f64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn vehicle_not_found(id: impl Into<String>) -> Self {
        Self::VehicleNotFound(id.into())
    }

    pub fn unknown_device(id: impl Into<String>) -> Self {
        Self::UnknownDevice(id.into())
    }

    pub fn malformed_patch(msg: impl Into<String>) -> Self {
        Self::MalformedPatch(msg.into())
    }

    pub fn invalid_position(lat: f64, lng: f64) -> Self {
        Self::InvalidPosition { lat, lng }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
