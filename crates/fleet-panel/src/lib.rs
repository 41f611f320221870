//! # Fleet Panel - Tracking Panel Controller
//!
//! Pure derivation over the registry store's classification buckets plus
//! the panel's own transient state: active category tab, free-text
//! search, and the selected vehicle shared with the map and detail
//! views. The controller never mutates snapshots; it only filters what
//! the store derived.

use serde::{Deserialize, Serialize};
use tracing::debug;

use fleet_core::{StatusCategory, VehicleId, VehicleSnapshot};
use fleet_registry::StatusBuckets;

/// Category tab selection: the pseudo-category All, or one status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryFilter {
    /// The full registry list, independent of classification
    All,
    Status(StatusCategory),
}

impl Default for CategoryFilter {
    fn default() -> Self {
        Self::All
    }
}

/// Per-tab counts, recomputed from the buckets on every store change —
/// a stale count is a correctness bug, not a cosmetic one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelCounts {
    pub all: usize,
    pub running: usize,
    pub idle: usize,
    pub parked: usize,
    pub offline: usize,
    pub new: usize,
    pub unknown: usize,
}

impl PanelCounts {
    pub fn from_buckets(buckets: &StatusBuckets) -> Self {
        Self {
            all: buckets.total(),
            running: buckets.count(StatusCategory::Running),
            idle: buckets.count(StatusCategory::Idle),
            parked: buckets.count(StatusCategory::Parked),
            offline: buckets.count(StatusCategory::Offline),
            new: buckets.count(StatusCategory::New),
            unknown: buckets.count(StatusCategory::Unknown),
        }
    }
}

/// Transient UI state of the tracking panel
#[derive(Debug, Clone, Default)]
pub struct TrackingPanel {
    active_category: CategoryFilter,
    search_text: String,
    selected: Option<VehicleId>,
}

impl TrackingPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_category(&self) -> CategoryFilter {
        self.active_category
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn selected(&self) -> Option<&VehicleId> {
        self.selected.as_ref()
    }

    /// Switch the visible category tab
    pub fn set_active_category(&mut self, category: CategoryFilter) {
        debug!(?category, "Panel category switched");
        self.active_category = category;
    }

    /// Set the free-text search applied on top of the active category
    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.search_text = text.into();
    }

    /// Toggle-select: selecting the already-selected vehicle clears the
    /// selection; selecting a different one replaces it.
    pub fn select_vehicle(&mut self, vehicle_id: Option<VehicleId>) {
        self.selected = match (self.selected.take(), vehicle_id) {
            (Some(current), Some(next)) if current == next => None,
            (_, next) => next,
        };
        debug!(selected = ?self.selected, "Panel selection changed");
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// The shown device list: the active category's bucket, narrowed by
    /// the search text (case-insensitive substring over display name).
    pub fn visible<'a>(&self, buckets: &'a StatusBuckets) -> Vec<&'a VehicleSnapshot> {
        let base: &[VehicleSnapshot] = match self.active_category {
            CategoryFilter::All => &buckets.all,
            CategoryFilter::Status(category) => buckets.of(category),
        };

        if self.search_text.is_empty() {
            return base.iter().collect();
        }

        let needle = self.search_text.to_lowercase();
        base.iter()
            .filter(|v| v.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Current per-tab counts
    pub fn counts(&self, buckets: &StatusBuckets) -> PanelCounts {
        PanelCounts::from_buckets(buckets)
    }

    /// Resolve the selected vehicle against the current buckets; a
    /// selection pointing at a vehicle that vanished in a reload
    /// resolves to `None`.
    pub fn selected_snapshot<'a>(&self, buckets: &'a StatusBuckets) -> Option<&'a VehicleSnapshot> {
        let selected = self.selected.as_ref()?;
        buckets.all.iter().find(|v| &v.id == selected)
    }
}

// ============================================================================
// TESTS
// ============================================================================
