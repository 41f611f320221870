//! # Fleet Metrics - Observability
//!
//! Prometheus metrics exporter for the fleet multitrack system:
//! - Vehicle counts per status category
//! - Patch stream health (applied / dropped)
//! - Live channel connection state
//! - Fetch failures at the REST boundary

use prometheus::{IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use tracing::info;

use fleet_core::{PatchDropReason, StatusCategory, StoreEvent, StoreEventKind};
use fleet_registry::StatusBuckets;

/// Metrics collector for the fleet multitrack system
pub struct MetricsCollector {
    registry: Registry,

    // Fleet metrics
    vehicles_total: IntGauge,
    vehicles_by_status: IntGaugeVec,

    // Patch stream metrics
    patches_applied: IntCounter,
    patches_dropped: IntCounterVec,
    status_changes: IntCounter,
    registry_loads: IntCounter,

    // Channel metrics
    channel_connected: IntGauge,

    // Fetch boundary metrics
    fetch_failures: IntCounter,
}

impl MetricsCollector {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let vehicles_total = IntGauge::new(
            "fleet_vehicles_total",
            "Total number of vehicles in the registry",
        )?;
        registry.register(Box::new(vehicles_total.clone()))?;

        let vehicles_by_status = IntGaugeVec::new(
            Opts::new("fleet_vehicles_by_status", "Vehicle count per status category"),
            &["status"],
        )?;
        registry.register(Box::new(vehicles_by_status.clone()))?;

        let patches_applied = IntCounter::new(
            "fleet_patches_applied_total",
            "Telemetry patches merged into the store",
        )?;
        registry.register(Box::new(patches_applied.clone()))?;

        let patches_dropped = IntCounterVec::new(
            Opts::new("fleet_patches_dropped_total", "Telemetry patches discarded"),
            &["reason"],
        )?;
        registry.register(Box::new(patches_dropped.clone()))?;

        let status_changes = IntCounter::new(
            "fleet_status_changes_total",
            "Vehicle reclassifications caused by patches",
        )?;
        registry.register(Box::new(status_changes.clone()))?;

        let registry_loads = IntCounter::new(
            "fleet_registry_loads_total",
            "Full registry list replacements",
        )?;
        registry.register(Box::new(registry_loads.clone()))?;

        let channel_connected = IntGauge::new(
            "fleet_channel_connected",
            "Live update channel connection state",
        )?;
        registry.register(Box::new(channel_connected.clone()))?;

        let fetch_failures = IntCounter::new(
            "fleet_fetch_failures_total",
            "Failed registry or per-device fetches",
        )?;
        registry.register(Box::new(fetch_failures.clone()))?;

        info!("Metrics collector initialized");

        Ok(Self {
            registry,
            vehicles_total,
            vehicles_by_status,
            patches_applied,
            patches_dropped,
            status_changes,
            registry_loads,
            channel_connected,
            fetch_failures,
        })
    }

    /// Get Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> prometheus::Result<String> {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("metrics not valid UTF-8: {e}")))
    }

    /// Refresh the per-status gauges from freshly derived buckets
    pub fn update_buckets(&self, buckets: &StatusBuckets) {
        self.vehicles_total.set(buckets.total() as i64);
        for category in StatusCategory::ALL {
            self.vehicles_by_status
                .with_label_values(&[&category.to_string()])
                .set(buckets.count(category) as i64);
        }
    }

    /// Fold a store event into the counters
    pub fn record_event(&self, event: &StoreEvent) {
        match &event.kind {
            StoreEventKind::RegistryLoaded { .. } => self.registry_loads.inc(),
            StoreEventKind::PatchApplied { .. } => self.patches_applied.inc(),
            StoreEventKind::PatchDropped { reason, .. } => {
                let label = match reason {
                    PatchDropReason::UnknownDevice => "unknown_device",
                    PatchDropReason::Malformed => "malformed",
                };
                self.patches_dropped.with_label_values(&[label]).inc();
            }
            StoreEventKind::StatusChanged { .. } => self.status_changes.inc(),
        }
    }

    /// Set channel connection state
    pub fn set_channel_connected(&self, connected: bool) {
        self.channel_connected.set(if connected { 1 } else { 0 });
    }

    /// Record a failed fetch at the REST boundary
    pub fn record_fetch_failure(&self) {
        self.fetch_failures.inc();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleet_core::{DeviceId, VehicleId, VehicleSnapshot};

    #[test]
    fn test_metrics_creation() {
        assert!(MetricsCollector::new().is_ok());
    }

    #[test]
    fn test_bucket_gauges_exported() {
        let metrics = MetricsCollector::new().unwrap();

        let buckets = StatusBuckets::derive(
            vec![VehicleSnapshot::new("V-01", "Bus 1", "KA-01", "8601")],
            Utc::now(),
        );
        metrics.update_buckets(&buckets);
        metrics.set_channel_connected(true);

        let export = metrics.export().unwrap();
        assert!(export.contains("fleet_vehicles_total 1"));
        assert!(export.contains("fleet_vehicles_by_status{status=\"NEW\"} 1"));
        assert!(export.contains("fleet_channel_connected 1"));
    }

    #[test]
    fn test_store_events_counted() {
        let metrics = MetricsCollector::new().unwrap();

        metrics.record_event(&StoreEvent::registry_loaded(3));
        metrics.record_event(&StoreEvent::patch_applied(
            VehicleId::new("V-01"),
            DeviceId::new("8601"),
        ));
        metrics.record_event(&StoreEvent::patch_dropped(
            Some(DeviceId::new("9999")),
            PatchDropReason::UnknownDevice,
        ));

        let export = metrics.export().unwrap();
        assert!(export.contains("fleet_registry_loads_total 1"));
        assert!(export.contains("fleet_patches_applied_total 1"));
        assert!(export.contains("fleet_patches_dropped_total{reason=\"unknown_device\"} 1"));
    }
}
