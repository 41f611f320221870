//! # Fleet Map - Marker Synchronization
//!
//! Keeps one map marker per vehicle in step with the snapshot list. The
//! [`MapView`] exclusively owns the id-to-marker table: it alone creates
//! and destroys entries, and other components reach markers only through
//! vehicle ids (select/focus), never through marker internals.
//!
//! Rendering is behind [`MarkerBackend`] so the sync logic is testable
//! without a real map widget.

use std::collections::HashMap;
use tracing::debug;

use chrono::{DateTime, Utc};
use fleet_core::{GeoPoint, StatusColor, VehicleId, VehicleSnapshot, classify};

/// Fixed close zoom used when flying to a selected vehicle
pub const FOCUS_ZOOM: u8 = 16;

/// Rendering operations the map widget must provide. Position writes
/// are the expensive ones; [`MapView::sync`] suppresses redundant calls.
#[cfg_attr(test, mockall::automock)]
pub trait MarkerBackend {
    /// Create a marker for a vehicle
    fn add_marker(&mut self, id: &VehicleId, position: GeoPoint, color: StatusColor);
    /// Relocate an existing marker
    fn set_position(&mut self, id: &VehicleId, position: GeoPoint);
    /// Update an existing marker's icon color
    fn set_icon(&mut self, id: &VehicleId, color: StatusColor);
    /// Destroy a marker
    fn remove_marker(&mut self, id: &VehicleId);
    /// Open the popup attached to a marker
    fn open_popup(&mut self, id: &VehicleId);
    /// Animate the viewport to a position at a zoom level
    fn fly_to(&mut self, position: GeoPoint, zoom: u8);
}

/// Last state written to the backend for one marker
#[derive(Debug, Clone, Copy)]
struct MarkerEntry {
    position: GeoPoint,
    color: StatusColor,
}

/// Owner of the marker table; renders through a [`MarkerBackend`]
pub struct MapView<B: MarkerBackend> {
    backend: B,
    markers: HashMap<VehicleId, MarkerEntry>,
}

impl<B: MarkerBackend> MapView<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            markers: HashMap::new(),
        }
    }

    /// Number of markers currently on the map
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Reconcile markers against the current snapshot list.
    ///
    /// For each vehicle with valid coordinates: create a marker if none
    /// exists; otherwise refresh the icon unconditionally but write the
    /// position only when the coordinates actually changed, so repeated
    /// patches carrying the same point cause no map redraw or jitter.
    /// Markers whose vehicle left the registry are removed; a vehicle
    /// still registered but without fresh coordinates keeps its marker
    /// at the last-known position.
    pub fn sync(&mut self, snapshots: &[VehicleSnapshot], now: DateTime<Utc>) {
        for snapshot in snapshots {
            let Some(position) = snapshot.position() else {
                continue;
            };
            if !position.is_valid() {
                debug!(vehicle_id = %snapshot.id, "Skipping invalid coordinates");
                continue;
            }

            let color = classify(snapshot, now).color;
            match self.markers.get_mut(&snapshot.id) {
                None => {
                    self.backend.add_marker(&snapshot.id, position, color);
                    self.markers
                        .insert(snapshot.id.clone(), MarkerEntry { position, color });
                }
                Some(entry) => {
                    self.backend.set_icon(&snapshot.id, color);
                    entry.color = color;
                    if entry.position != position {
                        self.backend.set_position(&snapshot.id, position);
                        entry.position = position;
                    }
                }
            }
        }

        // Drop markers for vehicles no longer in the registry
        let registered: std::collections::HashSet<&VehicleId> =
            snapshots.iter().map(|s| &s.id).collect();
        let orphans: Vec<VehicleId> = self
            .markers
            .keys()
            .filter(|id| !registered.contains(id))
            .cloned()
            .collect();
        for id in orphans {
            debug!(vehicle_id = %id, "Removing orphan marker");
            self.backend.remove_marker(&id);
            self.markers.remove(&id);
        }
    }

    /// React to a selection change: open the marker's popup and fly the
    /// viewport to it. A selection without a marker (no coordinates yet)
    /// is a no-op.
    pub fn focus(&mut self, selected: Option<&VehicleId>) {
        let Some(id) = selected else {
            return;
        };
        let Some(entry) = self.markers.get(id) else {
            debug!(vehicle_id = %id, "Selected vehicle has no marker yet");
            return;
        };

        self.backend.open_popup(id);
        self.backend.fly_to(entry.position, FOCUS_ZOOM);
    }
}

// ============================================================================
// TESTS
// ============================================================================
