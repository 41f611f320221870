//! Vehicle status classification
//!
//! The one source of truth for status derivation. Every consumer (panel,
//! map, detail read-outs, metrics) calls [`classify`]; none reimplement
//! the branching.

use crate::VehicleSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Telemetry older than this is stale. Exactly this old is NOT stale
/// (strict comparison).
pub const STALE_AFTER_MS: i64 = 3_600_000;

/// Status category of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCategory {
    /// Ignition on and moving
    Running,
    /// Ignition on, not moving
    Idle,
    /// Ignition off, not moving
    Parked,
    /// Live data exists but is stale (or its timestamp is unusable)
    Offline,
    /// No telemetry has ever arrived
    New,
    /// Contradictory flags (moving with ignition off)
    Unknown,
}

impl StatusCategory {
    /// All categories, in panel display order
    pub const ALL: [StatusCategory; 6] = [
        StatusCategory::Running,
        StatusCategory::Idle,
        StatusCategory::Parked,
        StatusCategory::Offline,
        StatusCategory::New,
        StatusCategory::Unknown,
    ];
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCategory::Running => write!(f, "RUNNING"),
            StatusCategory::Idle => write!(f, "IDLE"),
            StatusCategory::Parked => write!(f, "PARKED"),
            StatusCategory::Offline => write!(f, "OFFLINE"),
            StatusCategory::New => write!(f, "NEW"),
            StatusCategory::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Marker/badge color keyed to a status. The mapping is deterministic
/// and 1:1 so a color never has to be reverse-mapped ambiguously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusColor {
    Green,
    Orange,
    Red,
    Blue,
    Gray,
    Black,
}

impl StatusColor {
    /// Color for a status category
    pub fn of(status: StatusCategory) -> Self {
        match status {
            StatusCategory::Running => StatusColor::Green,
            StatusCategory::Idle => StatusColor::Orange,
            StatusCategory::Parked => StatusColor::Red,
            StatusCategory::Offline => StatusColor::Blue,
            StatusCategory::New => StatusColor::Gray,
            StatusCategory::Unknown => StatusColor::Black,
        }
    }

    /// Hex value used for marker icons
    pub fn hex(&self) -> &'static str {
        match self {
            StatusColor::Green => "#2e7d32",
            StatusColor::Orange => "#f9a825",
            StatusColor::Red => "#c62828",
            StatusColor::Blue => "#1565c0",
            StatusColor::Gray => "#757575",
            StatusColor::Black => "#212121",
        }
    }
}

/// Result of classifying one snapshot at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub status: StatusCategory,
    pub color: StatusColor,
    pub is_stale: bool,
}

impl Classification {
    fn of(status: StatusCategory) -> Self {
        Self {
            status,
            color: StatusColor::of(status),
            is_stale: status == StatusCategory::Offline,
        }
    }
}

/// Classify a snapshot against the given clock reading.
///
/// Precedence, first match wins:
/// 1. no live fields at all            -> New
/// 2. timestamp absent/unusable/stale  -> Offline
/// 3. ignition  &  movement            -> Running
/// 4. ignition  & !movement            -> Idle
/// 5. !ignition & !movement            -> Parked
/// 6. !ignition &  movement            -> Unknown
///
/// A missing timestamp on a snapshot that does have live fields is
/// classified Offline: we know the device reported at some point but
/// cannot prove freshness, so the conservative branch wins. A missing
/// ignition or movement flag is treated as false, matching the falsy
/// handling of the upstream telemetry source.
///
/// Pure function of (snapshot, now): calling it again with a later `now`
/// can flip a vehicle to Offline with no new data, which is exactly how
/// the periodic tick reclassifies a silent fleet.
pub fn classify(snapshot: &VehicleSnapshot, now: DateTime<Utc>) -> Classification {
    let Some(live) = &snapshot.live else {
        return Classification::of(StatusCategory::New);
    };

    let fresh = live
        .timestamp
        .is_some_and(|ts| (now - ts).num_milliseconds() <= STALE_AFTER_MS);
    if !fresh {
        return Classification::of(StatusCategory::Offline);
    }

    let ignition = live.ignition.unwrap_or(false);
    let movement = live.movement.unwrap_or(false);

    let status = match (ignition, movement) {
        (true, true) => StatusCategory::Running,
        (true, false) => StatusCategory::Idle,
        (false, false) => StatusCategory::Parked,
        (false, true) => StatusCategory::Unknown,
    };

    Classification::of(status)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TelemetryPatch;
    use chrono::Duration;

    fn snapshot_with(patch: TelemetryPatch) -> VehicleSnapshot {
        let mut snapshot = VehicleSnapshot::new("V-01", "Bus 12", "KA-01-1234", "352094081234567");
        snapshot.apply_patch(&patch);
        snapshot
    }

    #[test]
    fn test_no_live_fields_is_new_regardless_of_anything() {
        let snapshot = VehicleSnapshot::new("V-01", "Bus 12", "KA-01-1234", "352094081234567");
        let classification = classify(&snapshot, Utc::now());
        assert_eq!(classification.status, StatusCategory::New);
        assert_eq!(classification.color, StatusColor::Gray);
        assert!(!classification.is_stale);
    }

    #[test]
    fn test_live_fields_without_timestamp_is_offline() {
        let snapshot = snapshot_with(TelemetryPatch {
            speed: Some(10.0),
            ignition: Some(true),
            movement: Some(true),
            ..Default::default()
        });
        let classification = classify(&snapshot, Utc::now());
        assert_eq!(classification.status, StatusCategory::Offline);
        assert!(classification.is_stale);
    }

    #[test]
    fn test_staleness_boundary_is_strict() {
        let now = Utc::now();

        // Exactly one hour old: not stale
        let on_boundary = snapshot_with(TelemetryPatch {
            timestamp: Some(now - Duration::milliseconds(STALE_AFTER_MS)),
            ignition: Some(true),
            movement: Some(true),
            ..Default::default()
        });
        assert_eq!(classify(&on_boundary, now).status, StatusCategory::Running);

        // One millisecond past the hour: stale
        let past_boundary = snapshot_with(TelemetryPatch {
            timestamp: Some(now - Duration::milliseconds(STALE_AFTER_MS + 1)),
            ignition: Some(true),
            movement: Some(true),
            ..Default::default()
        });
        assert_eq!(classify(&past_boundary, now).status, StatusCategory::Offline);
    }

    #[test]
    fn test_flag_combinations() {
        let now = Utc::now();
        let cases = [
            (Some(true), Some(true), StatusCategory::Running),
            (Some(true), Some(false), StatusCategory::Idle),
            (Some(false), Some(false), StatusCategory::Parked),
            (Some(false), Some(true), StatusCategory::Unknown),
            // Missing flags fall back to false
            (None, None, StatusCategory::Parked),
            (Some(true), None, StatusCategory::Idle),
        ];

        for (ignition, movement, expected) in cases {
            let snapshot = snapshot_with(TelemetryPatch {
                timestamp: Some(now),
                ignition,
                movement,
                ..Default::default()
            });
            assert_eq!(
                classify(&snapshot, now).status,
                expected,
                "ignition={ignition:?} movement={movement:?}"
            );
        }
    }

    #[test]
    fn test_reclassifies_as_time_passes_without_new_data() {
        let now = Utc::now();
        let snapshot = snapshot_with(TelemetryPatch {
            timestamp: Some(now),
            ignition: Some(true),
            movement: Some(true),
            ..Default::default()
        });

        assert_eq!(classify(&snapshot, now).status, StatusCategory::Running);
        assert_eq!(
            classify(&snapshot, now + Duration::hours(2)).status,
            StatusCategory::Offline
        );
    }

    #[test]
    fn test_color_mapping_is_one_to_one() {
        let colors: std::collections::HashSet<StatusColor> =
            StatusCategory::ALL.iter().map(|s| StatusColor::of(*s)).collect();
        assert_eq!(colors.len(), StatusCategory::ALL.len());
    }
}
