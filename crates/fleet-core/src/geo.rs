//! Geographic position type for vehicle tracking

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair as reported by vehicle telemetry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if this position is within valid coordinate ranges
    pub fn is_valid(&self) -> bool {
        self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Convert to (latitude, longitude) tuple
    pub fn to_tuple(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_validity() {
        let valid = GeoPoint::new(12.9716, 77.5946);
        let invalid_lat = GeoPoint::new(100.0, 0.0);
        let invalid_lng = GeoPoint::new(0.0, 200.0);

        assert!(valid.is_valid());
        assert!(!invalid_lat.is_valid());
        assert!(!invalid_lng.is_valid());
    }

    #[test]
    fn test_to_tuple() {
        let point = GeoPoint::new(12.9716, 77.5946);
        assert_eq!(point.to_tuple(), (12.9716, 77.5946));
    }
}
