//! # Fleet Core
//!
//! Core domain models and types for the Fleet Multitrack System.
//! This crate provides the vehicle snapshot model, the status
//! classifier, and the shared types used across all subsystems.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod error;
pub mod events;
pub mod geo;
pub mod status;
pub mod telemetry;

pub use error::{CoreError, CoreResult};
pub use events::*;
pub use geo::GeoPoint;
pub use status::*;
pub use telemetry::*;

// ============================================================================
// VEHICLE MODELS
// ============================================================================

/// Unique identifier for a vehicle (registry-side, stable)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VehicleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VehicleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// IMEI-like identifier of the telemetry device fitted to a vehicle.
/// Push updates are correlated to registry records through this id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Driver assigned to a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub name: String,
    pub phone: Option<String>,
}

/// Route assignment for a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAssignment {
    pub name: String,
    pub number: Option<String>,
    pub assigned_seats: Option<u32>,
}

/// Best-known state of one vehicle: registry record plus the live
/// telemetry merged in from the initial per-device fetch and push
/// updates. `live` stays `None` until the first telemetry arrives,
/// which is what the classifier reports as `New`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    pub name: String,
    pub plate: String,
    pub device_id: DeviceId,
    pub driver: Option<Driver>,
    pub route: Option<RouteAssignment>,
    pub seat_count: Option<u32>,
    pub speed_limit: Option<f64>,
    pub live: Option<LiveTelemetry>,
}

impl VehicleSnapshot {
    pub fn new(
        id: impl Into<VehicleId>,
        name: impl Into<String>,
        plate: impl Into<String>,
        device_id: impl Into<DeviceId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            plate: plate.into(),
            device_id: device_id.into(),
            driver: None,
            route: None,
            seat_count: None,
            speed_limit: None,
            live: None,
        }
    }

    /// Whether any live telemetry has ever arrived for this vehicle
    pub fn has_live_data(&self) -> bool {
        self.live.is_some()
    }

    /// Current position, if live data with both coordinates exists
    pub fn position(&self) -> Option<GeoPoint> {
        self.live.as_ref().and_then(|l| l.position())
    }

    /// Merge a telemetry patch into the live fields. Fields present in
    /// the patch overwrite; absent fields keep their prior value.
    /// Applying the same patch twice is a no-op the second time. A patch
    /// carrying no fields at all is a complete no-op: it must not
    /// materialize empty live fields on a vehicle that never reported.
    pub fn apply_patch(&mut self, patch: &TelemetryPatch) {
        if patch.is_empty() {
            return;
        }
        let live = self.live.get_or_insert_with(LiveTelemetry::default);
        live.merge(patch);
    }

    /// Classify this snapshot against the given clock reading
    pub fn classify(&self, now: DateTime<Utc>) -> Classification {
        status::classify(self, now)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_creation() {
        let snapshot = VehicleSnapshot::new("V-01", "Bus 12", "KA-01-1234", "352094081234567");
        assert_eq!(snapshot.id.as_str(), "V-01");
        assert_eq!(snapshot.name, "Bus 12");
        assert!(!snapshot.has_live_data());
        assert!(snapshot.position().is_none());
    }

    #[test]
    fn test_patch_creates_live_fields() {
        let mut snapshot = VehicleSnapshot::new("V-01", "Bus 12", "KA-01-1234", "352094081234567");

        let patch = TelemetryPatch {
            latitude: Some(12.97),
            longitude: Some(77.59),
            ..Default::default()
        };
        snapshot.apply_patch(&patch);

        assert!(snapshot.has_live_data());
        let pos = snapshot.position().unwrap();
        assert_eq!(pos.latitude, 12.97);
        assert_eq!(pos.longitude, 77.59);
    }

    #[test]
    fn test_empty_patch_does_not_materialize_live_fields() {
        let mut snapshot = VehicleSnapshot::new("V-01", "Bus 12", "KA-01-1234", "352094081234567");

        snapshot.apply_patch(&TelemetryPatch::default());

        assert!(!snapshot.has_live_data());
        assert_eq!(
            snapshot.classify(Utc::now()).status,
            StatusCategory::New
        );
    }

    #[test]
    fn test_patch_merge_is_idempotent() {
        let mut snapshot = VehicleSnapshot::new("V-01", "Bus 12", "KA-01-1234", "352094081234567");

        let patch = TelemetryPatch {
            speed: Some(42.0),
            ignition: Some(true),
            ..Default::default()
        };
        snapshot.apply_patch(&patch);
        let once = snapshot.clone();
        snapshot.apply_patch(&patch);

        assert_eq!(snapshot, once);
    }

    #[test]
    fn test_partial_patch_keeps_prior_fields() {
        let mut snapshot = VehicleSnapshot::new("V-01", "Bus 12", "KA-01-1234", "352094081234567");

        snapshot.apply_patch(&TelemetryPatch {
            latitude: Some(12.97),
            longitude: Some(77.59),
            speed: Some(30.0),
            ..Default::default()
        });
        snapshot.apply_patch(&TelemetryPatch {
            speed: Some(0.0),
            movement: Some(false),
            ..Default::default()
        });

        let live = snapshot.live.as_ref().unwrap();
        assert_eq!(live.speed, Some(0.0));
        assert_eq!(live.movement, Some(false));
        assert_eq!(live.latitude, Some(12.97));
    }
}
