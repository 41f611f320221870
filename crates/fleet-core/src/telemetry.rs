//! Live telemetry fields and the merge-patch applied by push updates
//!
//! Raw device telemetry carries sensor signals as "I/O elements": a list
//! of key-value pairs identified by a numeric property id. The ignition
//! and movement flags relevant to classification live behind well-known
//! property ids; everything else is kept but ignored.

use crate::error::{CoreError, CoreResult};
use crate::{DeviceId, GeoPoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// I/O property id carrying the ignition flag
pub const IO_IGNITION: u16 = 239;

/// I/O property id carrying the movement flag
pub const IO_MOVEMENT: u16 = 240;

/// Live (telemetry-fed) fields of a vehicle snapshot. All fields are
/// optional because patches arrive piecemeal; latitude and longitude are
/// kept separate so each merges independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveTelemetry {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Speed in km/h
    pub speed: Option<f64>,
    /// Time of the last telemetry reading. `None` with other live fields
    /// present means the source timestamp was absent or unparseable; the
    /// classifier treats that conservatively as stale.
    pub timestamp: Option<DateTime<Utc>>,
    pub ignition: Option<bool>,
    pub movement: Option<bool>,
    /// Odometer reading in kilometers
    pub odometer: Option<f64>,
    /// Raw I/O elements keyed by numeric property id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub io_elements: BTreeMap<u16, i64>,
}

impl LiveTelemetry {
    /// Current position, when both coordinates are known
    pub fn position(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }

    /// Merge a patch into these fields. Present patch fields overwrite;
    /// absent fields are untouched.
    pub fn merge(&mut self, patch: &TelemetryPatch) {
        if let Some(lat) = patch.latitude {
            self.latitude = Some(lat);
        }
        if let Some(lng) = patch.longitude {
            self.longitude = Some(lng);
        }
        if let Some(speed) = patch.speed {
            self.speed = Some(speed);
        }
        if let Some(ts) = patch.timestamp {
            self.timestamp = Some(ts);
        }
        if let Some(ignition) = patch.ignition {
            self.ignition = Some(ignition);
        }
        if let Some(movement) = patch.movement {
            self.movement = Some(movement);
        }
        if let Some(odometer) = patch.odometer {
            self.odometer = Some(odometer);
        }
        for (id, value) in &patch.io_elements {
            self.io_elements.insert(*id, *value);
        }
    }
}

/// Partial update for one vehicle's live fields, as carried by a push
/// event or the per-device telemetry fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPatch {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub ignition: Option<bool>,
    pub movement: Option<bool>,
    pub odometer: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub io_elements: BTreeMap<u16, i64>,
}

impl TelemetryPatch {
    /// Parse an inbound push event into its device id and patch.
    ///
    /// The transport is loosely typed: the device id arrives under
    /// `deviceId`, `device_id` or `imei` depending on the producer, flags
    /// arrive either as direct boolean-ish fields or inside an I/O
    /// element list, and timestamps are RFC 3339 strings or epoch
    /// milliseconds. All of that is normalized here, once, so consumers
    /// never see the raw envelope.
    pub fn from_event(event: &Value) -> CoreResult<(DeviceId, TelemetryPatch)> {
        let obj = event
            .as_object()
            .ok_or_else(|| CoreError::malformed_patch("event payload is not an object"))?;

        let device_id = ["deviceId", "device_id", "imei"]
            .iter()
            .find_map(|key| obj.get(*key))
            .and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| CoreError::malformed_patch("event has no resolvable device id"))?;

        let mut patch = TelemetryPatch {
            latitude: number_field(obj, &["latitude", "lat"]),
            longitude: number_field(obj, &["longitude", "lng", "lon"]),
            speed: number_field(obj, &["speed"]),
            timestamp: timestamp_field(obj.get("timestamp")),
            ignition: flag_field(obj.get("ignition")),
            movement: flag_field(obj.get("movement")),
            odometer: number_field(obj, &["odometer"]),
            io_elements: BTreeMap::new(),
        };

        if let Some(elements) = obj.get("ioElements").or_else(|| obj.get("io_elements")) {
            patch.absorb_io_elements(elements);
        }

        Ok((DeviceId::new(device_id), patch))
    }

    /// Fold an I/O element list into the patch, decoding the well-known
    /// ignition and movement ids into their boolean fields.
    fn absorb_io_elements(&mut self, elements: &Value) {
        let Some(list) = elements.as_array() else {
            return;
        };

        for element in list {
            let (Some(id), Some(value)) = (
                element.get("id").and_then(Value::as_u64),
                element.get("value").and_then(Value::as_i64),
            ) else {
                continue;
            };
            let Ok(id) = u16::try_from(id) else {
                continue;
            };

            self.io_elements.insert(id, value);
            match id {
                IO_IGNITION => self.ignition = Some(value != 0),
                IO_MOVEMENT => self.movement = Some(value != 0),
                _ => {}
            }
        }
    }

    /// Whether this patch carries any live field at all
    pub fn is_empty(&self) -> bool {
        *self == TelemetryPatch::default()
    }
}

fn number_field(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| obj.get(*key)).and_then(Value::as_f64)
}

/// Accept booleans, 0/1 numbers, and "0"/"1" strings as flags
fn flag_field(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Accept RFC 3339 strings or epoch milliseconds; anything else (and
/// unparseable strings) becomes `None`, which classification treats as
/// stale when other live fields exist.
fn timestamp_field(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
