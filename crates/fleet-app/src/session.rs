//! Tracking session orchestration
//!
//! Owns the read side of the pipeline: a periodic tick re-derives the
//! classification buckets (so staleness moves vehicles to Offline even
//! with no inbound data), syncs the map markers, and refreshes the
//! metrics gauges. Store change events stream into the metrics counters
//! between ticks.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use fleet_channel::LiveChannel;
use fleet_core::{GeoPoint, StatusColor, VehicleId};
use fleet_map::{MapView, MarkerBackend};
use fleet_metrics::MetricsCollector;
use fleet_panel::TrackingPanel;
use fleet_registry::RegistryStore;

/// Marker backend that renders to the log instead of a map widget.
/// Headless runs (and the demo) still exercise the full sync path.
pub struct LogMarkerBackend;

impl MarkerBackend for LogMarkerBackend {
    fn add_marker(&mut self, id: &VehicleId, position: GeoPoint, color: StatusColor) {
        debug!(vehicle_id = %id, lat = position.latitude, lng = position.longitude, color = color.hex(), "Marker added");
    }

    fn set_position(&mut self, id: &VehicleId, position: GeoPoint) {
        debug!(vehicle_id = %id, lat = position.latitude, lng = position.longitude, "Marker moved");
    }

    fn set_icon(&mut self, id: &VehicleId, color: StatusColor) {
        debug!(vehicle_id = %id, color = color.hex(), "Marker icon updated");
    }

    fn remove_marker(&mut self, id: &VehicleId) {
        debug!(vehicle_id = %id, "Marker removed");
    }

    fn open_popup(&mut self, id: &VehicleId) {
        debug!(vehicle_id = %id, "Marker popup opened");
    }

    fn fly_to(&mut self, position: GeoPoint, zoom: u8) {
        debug!(lat = position.latitude, lng = position.longitude, zoom, "Viewport moved");
    }
}

/// Run the tracking session until the surrounding task is cancelled.
///
/// The channel handle is only read for its connection state; the channel
/// itself writes to the store from its own reader task.
pub async fn run_session(
    store: Arc<RegistryStore>,
    metrics: Arc<MetricsCollector>,
    channel: Option<Arc<LiveChannel>>,
    tick_interval: Duration,
) {
    let mut panel = TrackingPanel::new();
    let mut map = MapView::new(LogMarkerBackend);
    let mut events = store.subscribe();
    let mut ticker = tokio::time::interval(tick_interval);

    info!(
        tick_secs = tick_interval.as_secs(),
        "Tracking session started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                let buckets = store.buckets(now);

                map.sync(&buckets.all, now);
                metrics.update_buckets(&buckets);
                if let Some(channel) = &channel {
                    metrics.set_channel_connected(channel.is_connected());
                }

                let counts = panel.counts(&buckets);
                info!(
                    total = counts.all,
                    running = counts.running,
                    idle = counts.idle,
                    parked = counts.parked,
                    offline = counts.offline,
                    new = counts.new,
                    markers = map.marker_count(),
                    "Fleet tick"
                );

                // A selection that vanished in a reload is dropped here
                if let Some(id) = panel.selected().cloned()
                    && panel.selected_snapshot(&buckets).is_none()
                {
                    debug!(vehicle_id = %id, "Selected vehicle left the registry");
                    panel.clear_selection();
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => metrics.record_event(&event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Store event stream lagged");
                    }
                    Err(RecvError::Closed) => {
                        info!("Store event stream closed, session ending");
                        break;
                    }
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{TelemetryPatch, VehicleSnapshot};

    #[test]
    fn test_log_backend_drives_full_sync() {
        let mut snapshot = VehicleSnapshot::new("V-01", "Bus 1", "KA-01", "8601");
        snapshot.apply_patch(&TelemetryPatch {
            latitude: Some(12.97),
            longitude: Some(77.59),
            timestamp: Some(Utc::now()),
            ignition: Some(true),
            movement: Some(true),
            ..Default::default()
        });

        let mut map = MapView::new(LogMarkerBackend);
        map.sync(std::slice::from_ref(&snapshot), Utc::now());
        assert_eq!(map.marker_count(), 1);

        map.focus(Some(&VehicleId::new("V-01")));
        map.sync(&[], Utc::now());
        assert_eq!(map.marker_count(), 0);
    }
}
