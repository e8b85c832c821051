use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LocationConfig {
    Fixed(FixedLocationConfig),
    Track(TrackConfig),
}

impl Default for LocationConfig {
    fn default() -> Self {
        LocationConfig::Fixed(FixedLocationConfig::default())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FixedLocationConfig {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
    #[serde(default)]
    pub horizontal_accuracy: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackConfig {
    /// JSON-lines file, one fix per line
    pub path: PathBuf,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Start over at the first point when the track runs out
    #[serde(default)]
    pub repeat: bool,
}

fn default_interval_ms() -> u64 {
    1000
}
