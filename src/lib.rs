use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub mod address;
pub mod camera;
pub mod capture;
pub mod display;
pub mod library;
pub mod location;
pub mod startup_checks;
pub mod watermark;

use address::AddressConfig;
use camera::{CameraConfig, CameraError, DynCameraSession};
use capture::CaptureController;
use display::{DisplayConfig, DisplayHandle};
use library::LibraryConfig;
use location::{LatestFix, LocationConfig};
use watermark::{WatermarkAssets, WatermarkConfig};

/// Text of the "About" dialog
pub const ABOUT_TEXT: &str = "GeoCam\n\
    Camera application that stamps every photo with its location, the time and a logo.";

/// Outcome of asking the user for access to a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub address: AddressConfig,
    #[serde(default)]
    pub watermark: WatermarkConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "GeoCam".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// `--log-level` when given, otherwise the configured level
    pub fn effective_log_level<'a>(&'a self, flag: Option<&'a str>) -> &'a str {
        flag.unwrap_or(&self.log_level)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    ParseError(#[from] toml_edit::de::Error),
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml_edit::de::from_str::<Config>(content)?)
    }

    /// Read `path`, or fall back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config = Self::from_toml(&content)?;
            info!("Configuration loaded from: {:?}", path);
            Ok(config)
        } else {
            info!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("{0} access denied")]
    PermissionDenied(String),

    #[error("Camera configuration failed: {0}")]
    Camera(#[from] CameraError),
}

/// Ask for camera access and start the session
pub async fn start_camera(camera: DynCameraSession) -> Result<DynCameraSession, SetupError> {
    if camera.request_access().await == PermissionStatus::Denied {
        return Err(SetupError::PermissionDenied(camera.name().to_string()));
    }
    camera.start_session().await?;
    info!("Camera ready: {}", camera.name());
    Ok(camera)
}

/// The running application: every collaborator wired to the capture button
pub struct App {
    pub controller: Arc<CaptureController>,
    pub display: DisplayHandle,
    pub location: LatestFix,
    camera: Option<DynCameraSession>,
    tasks: Vec<JoinHandle<()>>,
}

impl App {
    /// Stop the camera session and background tasks
    pub async fn shutdown(self) {
        if let Some(camera) = &self.camera {
            camera.stop_session().await;
        }
        for task in &self.tasks {
            task.abort();
        }
        info!("Application stopped");
    }
}

/// Build the application. A failing subsystem is logged and left disabled;
/// the rest of the app keeps working.
pub async fn create_app(config: &Config) -> App {
    let (location, location_task) =
        location::start_location_updates(location::create_provider(&config.location));

    let camera = match start_camera(camera::create_camera(&config.camera.source)).await {
        Ok(camera) => Some(camera),
        Err(e) => {
            error!("Camera setup failed, captures disabled: {}", e);
            None
        }
    };

    let assets = WatermarkAssets::load(&config.watermark.font_path, &config.watermark.logo_path);
    if assets.logo.is_none() {
        warn!("Photos will be stamped without a logo");
    }

    let library = library::create_library(&config.library);
    info!("Saving photos with {}", library.name());

    let (display, display_task) = display::spawn_display(&config.display);

    let controller = CaptureController::new(
        camera.clone(),
        location.clone(),
        library,
        display.clone(),
    )
    .with_orientation(config.camera.orientation)
    .with_addresses(address::create_resolver(&config.address), config.address.clone())
    .with_watermark(assets, config.watermark.clone());

    App {
        controller: Arc::new(controller),
        display,
        location,
        camera,
        tasks: vec![location_task, display_task],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraSourceConfig, Orientation};
    use crate::location::TrackConfig;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.app.name, "GeoCam");
        assert_eq!(config.display.clear_after_ms, 1000);
        assert_eq!(config.watermark.panel_height, 180);
        assert!(matches!(config.camera.source, CameraSourceConfig::Pattern(_)));
        assert!(matches!(config.library, LibraryConfig::Directory(_)));
    }

    #[test]
    fn test_full_config_parses() {
        let config = Config::from_toml(
            r#"
[app]
name = "Field Camera"
log_level = "debug"

[camera]
source = "directory"
directory = "frames"
orientation = "landscape-left"

[location]
provider = "track"
path = "track.jsonl"
interval_ms = 250

[address]
placeholder = "Unknown"
resolve_timeout_ms = 100

[[address.places]]
name = "Office"
latitude = 40.7
longitude = -74.0

[watermark]
logo_path = "assets/logo.png"
font_size = 24.0

[library]
kind = "null"

[display]
clear_after_ms = 1500
"#,
        )
        .unwrap();

        assert_eq!(config.app.name, "Field Camera");
        assert_eq!(config.camera.orientation, Orientation::LandscapeLeft);
        match &config.camera.source {
            CameraSourceConfig::Directory(directory) => {
                assert_eq!(directory.directory, Path::new("frames"))
            }
            other => panic!("unexpected camera source {:?}", other),
        }
        match &config.location {
            LocationConfig::Track(TrackConfig {
                interval_ms,
                repeat,
                ..
            }) => {
                assert_eq!(*interval_ms, 250);
                assert!(!repeat);
            }
            other => panic!("unexpected location config {:?}", other),
        }
        assert_eq!(config.address.placeholder, "Unknown");
        assert_eq!(config.address.places.len(), 1);
        assert_eq!(config.address.places[0].radius_m, 100.0);
        assert_eq!(config.watermark.font_size, 24.0);
        assert_eq!(config.watermark.inset, 20);
        assert!(matches!(config.library, LibraryConfig::Null));
        assert_eq!(config.display.clear_after_ms, 1500);
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::from_toml(include_str!("../config.example.toml")).unwrap();
        assert!(matches!(config.location, LocationConfig::Track(_)));
        assert_eq!(config.address.places.len(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(Config::from_toml("[camera]\nsource = \"webcam\"\n").is_err());
    }

    #[test]
    fn test_log_level_flag_overrides_config() {
        let config = Config::from_toml("[app]\nname = \"GeoCam\"\nlog_level = \"debug\"\n").unwrap();
        assert_eq!(config.app.effective_log_level(None), "debug");
        assert_eq!(config.app.effective_log_level(Some("warn")), "warn");
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = Config::load_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.app.log_level, "info");
    }
}
