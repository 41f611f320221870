//! # Fleet Registry - Vehicle Registry Store
//!
//! Owns the canonical list of vehicle snapshots and is the single write
//! target for both the initial load and the live patch stream:
//! - Full-list replacement after a registry fetch
//! - Incremental patch merge keyed by device identifier
//! - Classification buckets derived on demand against a caller-supplied
//!   clock reading
//! - Broadcast of store change events for panel/map/metrics consumers

pub mod buckets;
pub mod error;
pub mod fetch;
pub mod http;

pub use buckets::StatusBuckets;
pub use error::{RegistryError, RegistryResult};
pub use fetch::{RegistryApi, TelemetryApi, load_fleet, normalize_registry};
pub use http::FleetApiClient;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use fleet_core::{
    CoreError, CoreResult, DeviceId, PatchDropReason, StoreEvent, TelemetryPatch, VehicleId,
    VehicleSnapshot,
};

/// Capacity of the store event broadcast channel
const EVENT_CAPACITY: usize = 1024;

/// Canonical holder of all known vehicle snapshots.
///
/// Vehicles are keyed by their stable registry id; a secondary index maps
/// device ids to the vehicles carrying that device so push patches can be
/// matched without scanning. A vehicle missing from a patch stream keeps
/// its last-known live fields; snapshots are only dropped by a full
/// registry reload.
pub struct RegistryStore {
    vehicles: DashMap<VehicleId, VehicleSnapshot>,
    device_index: DashMap<DeviceId, Vec<VehicleId>>,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl RegistryStore {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            vehicles: DashMap::new(),
            device_index: DashMap::new(),
            event_tx,
        }
    }

    /// Subscribe to store change events
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    /// Replace the entire vehicle list after a full registry fetch.
    /// Live fields become whatever the fetch provided; vehicles absent
    /// from the new list are gone, along with their device index entries.
    pub fn load_registry(&self, vehicles: Vec<VehicleSnapshot>) {
        self.vehicles.clear();
        self.device_index.clear();

        let count = vehicles.len();
        for vehicle in vehicles {
            self.device_index
                .entry(vehicle.device_id.clone())
                .or_default()
                .push(vehicle.id.clone());
            self.vehicles.insert(vehicle.id.clone(), vehicle);
        }

        info!(vehicle_count = count, "Registry loaded");
        let _ = self.event_tx.send(StoreEvent::registry_loaded(count));
    }

    /// Merge a patch into every snapshot carrying `device_id`. Returns
    /// the number of snapshots updated; a patch for an unknown device is
    /// a logged no-op, never an error that reaches the caller's event
    /// loop. A patch carrying no live fields at all is likewise a logged
    /// no-op: merging it would materialize empty live fields and flip a
    /// never-reported vehicle from New to Offline.
    pub fn apply_patch(&self, device_id: &DeviceId, patch: &TelemetryPatch) -> usize {
        if patch.is_empty() {
            debug!(device_id = %device_id, "Patch without live fields ignored");
            return 0;
        }

        let Some(vehicle_ids) = self.device_index.get(device_id).map(|ids| ids.clone()) else {
            debug!(device_id = %device_id, "Patch for unknown device dropped");
            let _ = self.event_tx.send(StoreEvent::patch_dropped(
                Some(device_id.clone()),
                PatchDropReason::UnknownDevice,
            ));
            return 0;
        };

        let now = Utc::now();
        let mut updated = 0;

        for vehicle_id in vehicle_ids {
            let Some(mut entry) = self.vehicles.get_mut(&vehicle_id) else {
                continue;
            };

            let old_status = entry.classify(now).status;
            entry.apply_patch(patch);
            let new_status = entry.classify(now).status;
            updated += 1;

            let _ = self
                .event_tx
                .send(StoreEvent::patch_applied(vehicle_id.clone(), device_id.clone()));

            if new_status != old_status {
                debug!(
                    vehicle_id = %vehicle_id,
                    %old_status,
                    %new_status,
                    "Vehicle reclassified"
                );
                let _ = self.event_tx.send(StoreEvent::status_changed(
                    vehicle_id.clone(),
                    old_status,
                    new_status,
                ));
            }
        }

        updated
    }

    /// Apply a raw push event: parse out the device id and patch fields,
    /// then merge. Malformed payloads are rejected with the store left
    /// untouched.
    pub fn apply_event(&self, event: &Value) -> CoreResult<usize> {
        match TelemetryPatch::from_event(event) {
            Ok((device_id, patch)) => Ok(self.apply_patch(&device_id, &patch)),
            Err(err) => {
                warn!(error = %err, "Malformed patch event rejected");
                let _ = self
                    .event_tx
                    .send(StoreEvent::patch_dropped(None, PatchDropReason::Malformed));
                Err(err)
            }
        }
    }

    /// All snapshots, ordered by vehicle id so repeated reads (and the
    /// tests comparing them) are deterministic.
    pub fn snapshots(&self) -> Vec<VehicleSnapshot> {
        let mut snapshots: Vec<VehicleSnapshot> =
            self.vehicles.iter().map(|r| r.value().clone()).collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    /// Look up one vehicle by registry id
    pub fn get(&self, id: &VehicleId) -> Option<VehicleSnapshot> {
        self.vehicles.get(id).map(|r| r.value().clone())
    }

    /// Look up the vehicles carrying a device
    pub fn find_by_device(&self, device_id: &DeviceId) -> Vec<VehicleSnapshot> {
        self.device_index
            .get(device_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Derive the classification buckets for the given clock reading.
    /// Recomputed from scratch every call: staleness is a function of `now`,
    /// so a periodic tick with no new data can still move vehicles to
    /// Offline.
    pub fn buckets(&self, now: DateTime<Utc>) -> StatusBuckets {
        StatusBuckets::derive(self.snapshots(), now)
    }
}

impl Default for RegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
