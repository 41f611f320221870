//! Simulated fleet for demo runs
//!
//! Stands in for the REST backend and the push source: serves a fixed
//! registry, answers per-device latest-telemetry fetches, and drives a
//! periodic patch feed through the store so the whole pipeline runs
//! without a live backend.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use fleet_core::{DeviceId, TelemetryPatch};
use fleet_registry::{RegistryApi, RegistryResult, RegistryStore, TelemetryApi};

/// Stops along the simulated shuttle loop
const WAYPOINTS: &[(&str, f64, f64)] = &[
    ("Depot", 12.9352, 77.6245),
    ("Tech Park Gate", 12.9507, 77.6412),
    ("Lakeside Stop", 12.9621, 77.6589),
    ("Central Junction", 12.9756, 77.6401),
    ("North Campus", 12.9889, 77.6234),
    ("Ring Road Stop", 12.9783, 77.6067),
    ("Market Square", 12.9612, 77.5989),
    ("South Terminal", 12.9445, 77.6101),
];

/// One simulated vehicle's motion state
struct SimVehicle {
    device_id: DeviceId,
    waypoint_index: usize,
    progress: f64,
    speed_factor: f64,
    /// Parked vehicles never move or report ignition
    parked: bool,
}

/// In-memory stand-in for the fleet REST backend
pub struct SimulatedFleet {
    vehicles: Mutex<Vec<SimVehicle>>,
}

impl SimulatedFleet {
    pub fn new(vehicle_count: usize) -> Self {
        let vehicles = (1..=vehicle_count)
            .map(|i| SimVehicle {
                device_id: DeviceId::new(format!("8600000000000{i:02}")),
                waypoint_index: i % WAYPOINTS.len(),
                progress: 0.0,
                speed_factor: 0.8 + (i as f64 * 0.05),
                // Every fourth vehicle sits parked at its stop
                parked: i % 4 == 0,
            })
            .collect();

        Self {
            vehicles: Mutex::new(vehicles),
        }
    }

    /// Advance every vehicle one step and emit the resulting patch
    /// events into the store, the same shape the push source would send.
    fn step(&self, store: &RegistryStore) {
        let mut vehicles = self.vehicles.lock();
        for vehicle in vehicles.iter_mut() {
            let event = advance(vehicle);
            if let Err(err) = store.apply_event(&event) {
                warn!(error = %err, "Simulated patch rejected");
            }
        }
    }
}

/// Move one vehicle along the loop and build its patch event
fn advance(vehicle: &mut SimVehicle) -> Value {
    let moving = !vehicle.parked;
    if moving {
        vehicle.progress += 0.02 * vehicle.speed_factor;
        if vehicle.progress >= 1.0 {
            vehicle.progress = 0.0;
            vehicle.waypoint_index = (vehicle.waypoint_index + 1) % WAYPOINTS.len();
        }
    }

    let current = WAYPOINTS[vehicle.waypoint_index];
    let next = WAYPOINTS[(vehicle.waypoint_index + 1) % WAYPOINTS.len()];
    let lat = current.1 + (next.1 - current.1) * vehicle.progress;
    let lng = current.2 + (next.2 - current.2) * vehicle.progress;
    let speed = if moving {
        25.0 + vehicle.speed_factor * 10.0
    } else {
        0.0
    };

    json!({
        "imei": vehicle.device_id.as_str(),
        "lat": lat,
        "lng": lng,
        "speed": speed,
        "timestamp": Utc::now().to_rfc3339(),
        "ioElements": [
            { "id": fleet_core::IO_IGNITION, "value": if moving { 1 } else { 0 } },
            { "id": fleet_core::IO_MOVEMENT, "value": if moving { 1 } else { 0 } },
        ],
    })
}

#[async_trait]
impl RegistryApi for SimulatedFleet {
    async fn fetch_registry(&self) -> RegistryResult<Value> {
        let vehicles: Vec<Value> = self
            .vehicles
            .lock()
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let n = i + 1;
                json!({
                    "id": format!("V-{n:02}"),
                    "name": format!("Shuttle {n}"),
                    "number": format!("KA-05-F-{:04}", 1000 + n),
                    "imei": v.device_id.as_str(),
                    "driver": { "name": format!("Driver {n}"), "phone": format!("98{n:08}") },
                    "route": {
                        "name": format!("Loop {}", (n % 3) + 1),
                        "number": format!("R-{}", (n % 3) + 1),
                        "assignedSeats": 28,
                    },
                    "seats": 32,
                    "speedLimit": 60.0,
                })
            })
            .collect();

        Ok(json!({ "vehicles": vehicles }))
    }
}

#[async_trait]
impl TelemetryApi for SimulatedFleet {
    async fn fetch_latest(&self, device_id: &DeviceId) -> RegistryResult<Option<TelemetryPatch>> {
        // Parked vehicles have no telemetry yet at load time, so the demo
        // fleet shows a mix of New and live statuses right after startup.
        let vehicles = self.vehicles.lock();
        let Some(vehicle) = vehicles.iter().find(|v| &v.device_id == device_id) else {
            return Ok(None);
        };
        if vehicle.parked {
            return Ok(None);
        }

        Ok(Some(TelemetryPatch {
            latitude: Some(WAYPOINTS[vehicle.waypoint_index].1),
            longitude: Some(WAYPOINTS[vehicle.waypoint_index].2),
            speed: Some(0.0),
            timestamp: Some(Utc::now()),
            ignition: Some(true),
            movement: Some(false),
            ..Default::default()
        }))
    }
}

/// Drive the simulated patch feed until the task is aborted
pub async fn run_simulation(sim: Arc<SimulatedFleet>, store: Arc<RegistryStore>, step: Duration) {
    info!(step_ms = step.as_millis() as u64, "Simulation feed started");
    let mut interval = tokio::time::interval(step);
    loop {
        interval.tick().await;
        sim.step(&store);
    }
}

// ============================================================================
// TESTS
// ============================================================================
