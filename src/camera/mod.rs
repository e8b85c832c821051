pub mod config;
pub mod error;
pub mod sources;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

use crate::PermissionStatus;

/// A hardware capture pipeline that hands out encoded photos on request
#[async_trait]
pub trait CameraSession: Send + Sync {
    async fn request_access(&self) -> PermissionStatus;
    async fn start_session(&self) -> Result<(), CameraError>;
    /// Fails with [`CameraError::SessionNotRunning`] until a session is started
    async fn capture_photo(&self) -> Result<CapturedPhoto, CameraError>;
    async fn stop_session(&self);
    fn name(&self) -> &str;
}

pub type DynCameraSession = Arc<dyn CameraSession>;

pub fn create_camera(config: &CameraSourceConfig) -> DynCameraSession {
    match config {
        CameraSourceConfig::Directory(directory) => {
            Arc::new(sources::directory::DirectoryCamera::new(directory))
        }
        CameraSourceConfig::Pattern(pattern) => {
            Arc::new(sources::pattern::PatternCamera::new(pattern))
        }
    }
}
