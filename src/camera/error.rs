use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera session is not running")]
    SessionNotRunning,

    #[error("No frames available: {0}")]
    NoFrames(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
