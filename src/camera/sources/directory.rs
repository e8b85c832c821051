use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::PermissionStatus;
use crate::camera::{CameraError, CameraSession, CapturedPhoto, DirectoryCameraConfig};

/// Serves the image files of a folder as camera frames, cycling in name order
pub struct DirectoryCamera {
    directory: PathBuf,
    frames: RwLock<Vec<PathBuf>>,
    next_frame: AtomicUsize,
    running: AtomicBool,
}

impl DirectoryCamera {
    pub fn new(config: &DirectoryCameraConfig) -> Self {
        Self {
            directory: config.directory.clone(),
            frames: RwLock::new(Vec::new()),
            next_frame: AtomicUsize::new(0),
            running: AtomicBool::new(false),
        }
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ext.eq_ignore_ascii_case("jpg")
                || ext.eq_ignore_ascii_case("jpeg")
                || ext.eq_ignore_ascii_case("png")
        })
        .unwrap_or(false)
}

fn scan_frames(directory: &Path) -> Vec<PathBuf> {
    let mut frames: Vec<PathBuf> = WalkDir::new(directory)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_frame_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    frames.sort();
    frames
}

#[async_trait]
impl CameraSession for DirectoryCamera {
    async fn request_access(&self) -> PermissionStatus {
        match tokio::fs::read_dir(&self.directory).await {
            Ok(_) => PermissionStatus::Granted,
            Err(e) => {
                debug!("Frame directory {:?} not readable: {}", self.directory, e);
                PermissionStatus::Denied
            }
        }
    }

    async fn start_session(&self) -> Result<(), CameraError> {
        let directory = self.directory.clone();
        let frames = tokio::task::spawn_blocking(move || scan_frames(&directory))
            .await
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

        if frames.is_empty() {
            return Err(CameraError::NoFrames(format!(
                "no jpg or png files in {:?}",
                self.directory
            )));
        }

        info!(
            "Camera session started with {} frames from {:?}",
            frames.len(),
            self.directory
        );
        *self.frames.write().await = frames;
        self.next_frame.store(0, Ordering::Relaxed);
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    async fn capture_photo(&self) -> Result<CapturedPhoto, CameraError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(CameraError::SessionNotRunning);
        }

        let frame_path = {
            let frames = self.frames.read().await;
            if frames.is_empty() {
                return Err(CameraError::SessionNotRunning);
            }
            let index = self.next_frame.fetch_add(1, Ordering::Relaxed) % frames.len();
            frames[index].clone()
        };

        debug!("Capturing frame {:?}", frame_path);
        let data = tokio::fs::read(&frame_path).await?;
        Ok(CapturedPhoto::new(data))
    }

    async fn stop_session(&self) {
        self.running.store(false, Ordering::Release);
        self.frames.write().await.clear();
        info!("Camera session stopped");
    }

    fn name(&self) -> &str {
        "Directory Camera"
    }
}
