use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::Orientation;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CameraConfig {
    #[serde(flatten)]
    pub source: CameraSourceConfig,
    #[serde(default)]
    pub orientation: Orientation,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: CameraSourceConfig::Pattern(PatternCameraConfig::default()),
            orientation: Orientation::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum CameraSourceConfig {
    Directory(DirectoryCameraConfig),
    Pattern(PatternCameraConfig),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryCameraConfig {
    /// Folder of jpg/png frames handed out in name order
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternCameraConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for PatternCameraConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 960,
        }
    }
}
