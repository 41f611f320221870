//! Event types emitted by the registry store
//!
//! Consumers (panel, map, metrics) subscribe to these instead of polling
//! the store, so derived views and counters stay current with every
//! change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{DeviceId, StatusCategory, VehicleId};

/// Event envelope for store changes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: StoreEventKind,
}

impl StoreEvent {
    pub fn new(kind: StoreEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn registry_loaded(vehicle_count: usize) -> Self {
        Self::new(StoreEventKind::RegistryLoaded { vehicle_count })
    }

    pub fn patch_applied(vehicle_id: VehicleId, device_id: DeviceId) -> Self {
        Self::new(StoreEventKind::PatchApplied {
            vehicle_id,
            device_id,
        })
    }

    pub fn patch_dropped(device_id: Option<DeviceId>, reason: PatchDropReason) -> Self {
        Self::new(StoreEventKind::PatchDropped { device_id, reason })
    }

    pub fn status_changed(
        vehicle_id: VehicleId,
        old_status: StatusCategory,
        new_status: StatusCategory,
    ) -> Self {
        Self::new(StoreEventKind::StatusChanged {
            vehicle_id,
            old_status,
            new_status,
        })
    }
}

/// Store change variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StoreEventKind {
    /// Full registry list was replaced
    RegistryLoaded { vehicle_count: usize },
    /// A telemetry patch merged into a vehicle's live fields
    PatchApplied {
        vehicle_id: VehicleId,
        device_id: DeviceId,
    },
    /// A patch could not be applied and was discarded
    PatchDropped {
        device_id: Option<DeviceId>,
        reason: PatchDropReason,
    },
    /// A vehicle's classification changed as a result of a patch
    StatusChanged {
        vehicle_id: VehicleId,
        old_status: StatusCategory,
        new_status: StatusCategory,
    },
}

/// Why a patch was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatchDropReason {
    /// No registry record carries the patch's device id
    UnknownDevice,
    /// The event payload could not be parsed
    Malformed,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = StoreEvent::status_changed(
            VehicleId::new("V-01"),
            StatusCategory::Running,
            StatusCategory::Idle,
        );

        assert!(matches!(
            event.kind,
            StoreEventKind::StatusChanged {
                old_status: StatusCategory::Running,
                new_status: StatusCategory::Idle,
                ..
            }
        ));
    }

    #[test]
    fn test_event_serialization() {
        let event = StoreEvent::patch_applied(
            VehicleId::new("V-01"),
            DeviceId::new("352094081234567"),
        );

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: StoreEvent = serde_json::from_str(&json).unwrap();

        assert!(matches!(
            deserialized.kind,
            StoreEventKind::PatchApplied { .. }
        ));
    }
}
