//! Fetch boundary: registry list and per-device telemetry
//!
//! External REST collaborators are reached through the [`RegistryApi`]
//! and [`TelemetryApi`] traits so tests (and the demo feed) can inject
//! in-memory fakes. Envelope shapes are normalized here, once — nothing
//! past this boundary ever touches the raw API response.

use crate::error::{RegistryError, RegistryResult};
use crate::RegistryStore;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::{info, warn};

use fleet_core::{DeviceId, Driver, RouteAssignment, TelemetryPatch, VehicleSnapshot};

/// Registry list fetch (external REST collaborator)
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Fetch the raw registry envelope for the current company/session
    async fn fetch_registry(&self) -> RegistryResult<Value>;
}

/// Latest-known telemetry fetch, keyed by device (external REST
/// collaborator). `Ok(None)` is the "no data yet" indicator.
#[async_trait]
pub trait TelemetryApi: Send + Sync {
    async fn fetch_latest(&self, device_id: &DeviceId) -> RegistryResult<Option<TelemetryPatch>>;
}

/// Seed the store: one registry fetch, then a concurrent per-device
/// telemetry fan-out. A failed per-device fetch leaves that vehicle with
/// no live fields (classified New) and never blocks the rest of the
/// batch. Returns the number of vehicles loaded.
pub async fn load_fleet(
    store: &RegistryStore,
    registry: &dyn RegistryApi,
    telemetry: &dyn TelemetryApi,
) -> RegistryResult<usize> {
    let envelope = registry.fetch_registry().await?;
    let vehicles = normalize_registry(&envelope)?;
    let count = vehicles.len();

    let device_ids: Vec<DeviceId> = vehicles.iter().map(|v| v.device_id.clone()).collect();
    store.load_registry(vehicles);

    let fetches = device_ids.iter().map(|device_id| async move {
        match telemetry.fetch_latest(device_id).await {
            Ok(patch) => patch.map(|p| (device_id.clone(), p)),
            Err(err) => {
                warn!(device_id = %device_id, error = %err, "Per-device telemetry fetch failed");
                None
            }
        }
    });

    let mut merged = 0;
    for (device_id, patch) in join_all(fetches).await.into_iter().flatten() {
        merged += store.apply_patch(&device_id, &patch);
    }

    info!(vehicle_count = count, with_telemetry = merged, "Fleet load complete");
    Ok(count)
}

/// Map the external API's registry envelope to vehicle snapshots.
///
/// The API wraps its list inconsistently (`vehicles`, `data`, or a bare
/// array); records missing an id or device identifier are skipped with a
/// warning rather than failing the load.
pub fn normalize_registry(envelope: &Value) -> RegistryResult<Vec<VehicleSnapshot>> {
    let records = envelope
        .get("vehicles")
        .or_else(|| envelope.get("data"))
        .unwrap_or(envelope)
        .as_array()
        .ok_or_else(|| RegistryError::bad_envelope("no vehicle list in response"))?;

    let mut vehicles = Vec::with_capacity(records.len());
    for record in records {
        match normalize_record(record) {
            Some(vehicle) => vehicles.push(vehicle),
            None => warn!(record = %record, "Skipping registry record without id/device"),
        }
    }
    Ok(vehicles)
}

fn normalize_record(record: &Value) -> Option<VehicleSnapshot> {
    let obj = record.as_object()?;

    let id = string_field(obj, &["id", "vehicleId", "_id"])?;
    let device_id = string_field(obj, &["imei", "deviceId", "device_id"])?;
    let name = string_field(obj, &["name", "vehicleName"]).unwrap_or_else(|| id.clone());
    let plate = string_field(obj, &["number", "plate", "vehicleNumber"]).unwrap_or_default();

    let mut vehicle = VehicleSnapshot::new(id, name, plate, device_id);

    vehicle.driver = obj.get("driver").and_then(Value::as_object).and_then(|d| {
        Some(Driver {
            name: string_field(d, &["name", "driverName"])?,
            phone: string_field(d, &["phone", "mobile"]),
        })
    });

    vehicle.route = obj.get("route").and_then(Value::as_object).and_then(|r| {
        Some(RouteAssignment {
            name: string_field(r, &["name", "routeName"])?,
            number: string_field(r, &["number", "routeNumber"]),
            assigned_seats: r
                .get("assignedSeats")
                .or_else(|| r.get("assigned_seats"))
                .and_then(Value::as_u64)
                .map(|n| n as u32),
        })
    });

    vehicle.seat_count = obj
        .get("seats")
        .or_else(|| obj.get("seatCount"))
        .and_then(Value::as_u64)
        .map(|n| n as u32);
    vehicle.speed_limit = obj
        .get("speedLimit")
        .or_else(|| obj.get("speed_limit"))
        .and_then(Value::as_f64);

    Some(vehicle)
}

fn string_field(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| obj.get(*key)).and_then(|v| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

// ============================================================================
// TESTS
// ============================================================================
