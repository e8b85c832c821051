use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single geolocation reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level
    pub altitude: f64,
    /// Radius of uncertainty in meters. Negative means the coordinates are unusable.
    pub horizontal_accuracy: f64,
    pub captured_at: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, altitude: f64, horizontal_accuracy: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            horizontal_accuracy,
            captured_at: Utc::now(),
        }
    }

    /// Check the fix against the ranges a receiver can actually report
    pub fn validate(&self) -> Result<(), String> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(format!("latitude {} out of range", self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(format!("longitude {} out of range", self.longitude));
        }
        if !self.altitude.is_finite() {
            return Err(format!("altitude {} is not finite", self.altitude));
        }
        if !self.horizontal_accuracy.is_finite() || self.horizontal_accuracy < 0.0 {
            return Err(format!(
                "horizontal accuracy {} is invalid",
                self.horizontal_accuracy
            ));
        }
        Ok(())
    }
}

/// One line of a JSON-lines track file
#[derive(Debug, Clone, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
    #[serde(default)]
    pub horizontal_accuracy: f64,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
}

impl TrackPoint {
    pub fn into_fix(self) -> LocationFix {
        LocationFix {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            horizontal_accuracy: self.horizontal_accuracy,
            captured_at: self.captured_at.unwrap_or_else(Utc::now),
        }
    }
}
