use crate::Config;
use crate::camera::CameraSourceConfig;
use crate::library::LibraryConfig;
use crate::location::LocationConfig;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create photo library directory: {0}")]
    LibraryDirectoryCreationFailed(#[from] std::io::Error),

    #[error("Camera frame directory does not exist: {0:?}")]
    FrameDirectoryMissing(PathBuf),

    #[error("Location track file does not exist: {0:?}")]
    TrackFileMissing(PathBuf),

    #[error("Required file missing: {0:?}")]
    RequiredFileMissing(PathBuf),
}

impl StartupCheckError {
    /// Only a library we cannot write to stops the app; everything else
    /// degrades a single feature
    pub fn is_critical(&self) -> bool {
        matches!(self, StartupCheckError::LibraryDirectoryCreationFailed(_))
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    // Photo library directory
    if let LibraryConfig::Directory(library) = &config.library {
        let library_dir = &library.directory;
        if !library_dir.exists() {
            info!(
                "Photo library directory does not exist, creating: {:?}",
                library_dir
            );
            if let Err(e) = tokio::fs::create_dir_all(library_dir).await {
                error!("Failed to create photo library directory: {}", e);
                errors.push(StartupCheckError::LibraryDirectoryCreationFailed(e));
            } else {
                info!("Photo library directory created successfully");
            }
        } else {
            info!("Photo library directory exists: {:?}", library_dir);
        }
    }

    // Camera frames
    if let CameraSourceConfig::Directory(camera) = &config.camera.source {
        if camera.directory.is_dir() {
            info!("Camera frame directory exists: {:?}", camera.directory);
        } else {
            warn!(
                "Camera frame directory does not exist: {:?}",
                camera.directory
            );
            errors.push(StartupCheckError::FrameDirectoryMissing(
                camera.directory.clone(),
            ));
        }
    }

    // Location track
    if let LocationConfig::Track(track) = &config.location {
        if track.path.is_file() {
            info!("Location track found: {:?}", track.path);
        } else {
            warn!("Location track does not exist: {:?}", track.path);
            errors.push(StartupCheckError::TrackFileMissing(track.path.clone()));
        }
    }

    // Watermark assets
    for file in [&config.watermark.font_path, &config.watermark.logo_path] {
        if file.exists() {
            info!("Required file found: {:?}", file);
        } else {
            warn!("Required file missing: {:?}", file);
            errors.push(StartupCheckError::RequiredFileMissing(file.clone()));
        }
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
