//! Classification buckets derived from the snapshot list

use chrono::{DateTime, Utc};
use fleet_core::{StatusCategory, VehicleSnapshot, classify};
use serde::{Deserialize, Serialize};

/// One list of snapshots per status category, plus the full registry
/// list. `all` is the complete registry independent of classification:
/// New and Unknown vehicles appear there even though they never overlap
/// the other buckets' semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBuckets {
    pub running: Vec<VehicleSnapshot>,
    pub idle: Vec<VehicleSnapshot>,
    pub parked: Vec<VehicleSnapshot>,
    pub offline: Vec<VehicleSnapshot>,
    pub new: Vec<VehicleSnapshot>,
    pub unknown: Vec<VehicleSnapshot>,
    pub all: Vec<VehicleSnapshot>,
    /// The clock reading the classification was computed against
    pub derived_at: DateTime<Utc>,
}

impl StatusBuckets {
    /// Classify every snapshot and split into buckets. Input ordering is
    /// preserved within each bucket.
    pub fn derive(snapshots: Vec<VehicleSnapshot>, now: DateTime<Utc>) -> Self {
        let mut buckets = Self {
            running: Vec::new(),
            idle: Vec::new(),
            parked: Vec::new(),
            offline: Vec::new(),
            new: Vec::new(),
            unknown: Vec::new(),
            all: Vec::new(),
            derived_at: now,
        };

        for snapshot in snapshots {
            match classify(&snapshot, now).status {
                StatusCategory::Running => buckets.running.push(snapshot.clone()),
                StatusCategory::Idle => buckets.idle.push(snapshot.clone()),
                StatusCategory::Parked => buckets.parked.push(snapshot.clone()),
                StatusCategory::Offline => buckets.offline.push(snapshot.clone()),
                StatusCategory::New => buckets.new.push(snapshot.clone()),
                StatusCategory::Unknown => buckets.unknown.push(snapshot.clone()),
            }
            buckets.all.push(snapshot);
        }

        buckets
    }

    /// Bucket for one category
    pub fn of(&self, category: StatusCategory) -> &[VehicleSnapshot] {
        match category {
            StatusCategory::Running => &self.running,
            StatusCategory::Idle => &self.idle,
            StatusCategory::Parked => &self.parked,
            StatusCategory::Offline => &self.offline,
            StatusCategory::New => &self.new,
            StatusCategory::Unknown => &self.unknown,
        }
    }

    /// Size of one category bucket
    pub fn count(&self, category: StatusCategory) -> usize {
        self.of(category).len()
    }

    /// Total registry size
    pub fn total(&self) -> usize {
        self.all.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::TelemetryPatch;

    fn snapshot(id: &str, patch: Option<TelemetryPatch>) -> VehicleSnapshot {
        let mut snapshot =
            VehicleSnapshot::new(id, format!("Vehicle {id}"), format!("KA-{id}"), format!("86{id}"));
        if let Some(patch) = patch {
            snapshot.apply_patch(&patch);
        }
        snapshot
    }

    fn fresh(ignition: bool, movement: bool, now: DateTime<Utc>) -> TelemetryPatch {
        TelemetryPatch {
            timestamp: Some(now),
            ignition: Some(ignition),
            movement: Some(movement),
            ..Default::default()
        }
    }

    /// One vehicle of every status, including one Unknown: the sum of the
    /// named buckets equals `all` only because Unknown is counted too.
    #[test]
    fn test_category_totals_with_one_of_each() {
        let now = Utc::now();
        let snapshots = vec![
            snapshot("V-01", Some(fresh(true, true, now))),   // Running
            snapshot("V-02", Some(fresh(true, false, now))),  // Idle
            snapshot("V-03", Some(fresh(false, false, now))), // Parked
            snapshot(
                "V-04",
                Some(TelemetryPatch {
                    timestamp: Some(now - chrono::Duration::hours(3)),
                    ignition: Some(true),
                    movement: Some(true),
                    ..Default::default()
                }),
            ), // Offline
            snapshot("V-05", None),                           // New
            snapshot("V-06", Some(fresh(false, true, now))),  // Unknown
        ];

        let buckets = StatusBuckets::derive(snapshots, now);

        for category in StatusCategory::ALL {
            assert_eq!(buckets.count(category), 1, "{category}");
        }
        assert_eq!(buckets.total(), 6);

        let named_sum: usize = [
            StatusCategory::Running,
            StatusCategory::Idle,
            StatusCategory::Parked,
            StatusCategory::Offline,
            StatusCategory::New,
        ]
        .iter()
        .map(|c| buckets.count(*c))
        .sum();
        assert_eq!(named_sum + buckets.count(StatusCategory::Unknown), buckets.total());
        assert_ne!(named_sum, buckets.total());
    }

    #[test]
    fn test_all_is_full_registry_without_unknowns() {
        let now = Utc::now();
        let snapshots = vec![
            snapshot("V-01", Some(fresh(true, true, now))),
            snapshot("V-02", None),
        ];

        let buckets = StatusBuckets::derive(snapshots, now);
        let named_sum: usize = StatusCategory::ALL.iter().map(|c| buckets.count(*c)).sum();
        assert_eq!(named_sum, buckets.total());
    }

    #[test]
    fn test_empty_derivation() {
        let buckets = StatusBuckets::derive(Vec::new(), Utc::now());
        assert_eq!(buckets.total(), 0);
        assert!(buckets.running.is_empty());
    }
}
