//! Location value objects

use serde::{Deserialize, Serialize};

/// A point on the globe with optional altitude and accuracy (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl Location {
    #[must_use]
    pub const fn new(
        latitude: f64,
        longitude: f64,
        altitude: Option<f64>,
        accuracy: Option<f64>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            accuracy,
        }
    }

    /// Build a location only when both coordinates are present
    #[must_use]
    pub fn from_parts(
        latitude: Option<f64>,
        longitude: Option<f64>,
        altitude: Option<f64>,
        accuracy: Option<f64>,
    ) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => {
                Some(Self::new(latitude, longitude, altitude, accuracy))
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.accuracy.is_none_or(|accuracy| accuracy >= 0.0)
    }
}

/// Rectangular lat/lng filter for listing notes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min_lat <= self.max_lat
            && self.min_lng <= self.max_lng
            && self.min_lat >= -90.0
            && self.max_lat <= 90.0
            && self.min_lng >= -180.0
            && self.max_lng <= 180.0
    }

    #[must_use]
    pub fn contains(&self, location: &Location) -> bool {
        (self.min_lat..=self.max_lat).contains(&location.latitude)
            && (self.min_lng..=self.max_lng).contains(&location.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_requires_both_coordinates() {
        assert!(Location::from_parts(Some(1.0), None, None, None).is_none());
        assert!(Location::from_parts(None, Some(1.0), Some(3.0), None).is_none());
        let location = Location::from_parts(Some(1.0), Some(2.0), None, Some(5.0)).unwrap();
        assert_eq!(location.accuracy, Some(5.0));
    }

    #[test]
    fn location_validates_ranges() {
        assert!(Location::new(45.0, 120.0, None, None).is_valid());
        assert!(!Location::new(91.0, 0.0, None, None).is_valid());
        assert!(!Location::new(0.0, -181.0, None, None).is_valid());
        assert!(!Location::new(0.0, 0.0, None, Some(-1.0)).is_valid());
    }

    #[test]
    fn bounding_box_validation_and_containment() {
        let bbox = BoundingBox::new(-10.0, 10.0, -20.0, 20.0);
        assert!(bbox.is_valid());
        assert!(bbox.contains(&Location::new(0.0, 0.0, None, None)));
        assert!(!bbox.contains(&Location::new(11.0, 0.0, None, None)));

        assert!(!BoundingBox::new(10.0, -10.0, 0.0, 1.0).is_valid());
        assert!(!BoundingBox::new(-95.0, 10.0, 0.0, 1.0).is_valid());
    }
}
