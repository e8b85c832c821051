use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::info;

use crate::PermissionStatus;
use crate::camera::{CameraError, CameraSession, CapturedPhoto, PatternCameraConfig};

/// Synthesizes a gradient test frame per capture, tinted by the frame number
pub struct PatternCamera {
    width: u32,
    height: u32,
    frame: AtomicU32,
    running: AtomicBool,
}

impl PatternCamera {
    pub fn new(config: &PatternCameraConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            frame: AtomicU32::new(0),
            running: AtomicBool::new(false),
        }
    }
}

fn render_frame(width: u32, height: u32, frame: u32) -> RgbImage {
    let tint = (frame.wrapping_mul(40) % 256) as u8;
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            tint,
        ])
    })
}

fn encode_png(image: RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image).write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

#[async_trait]
impl CameraSession for PatternCamera {
    async fn request_access(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn start_session(&self) -> Result<(), CameraError> {
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::NoFrames(format!(
                "invalid pattern size {}x{}",
                self.width, self.height
            )));
        }
        info!(
            "Pattern camera session started at {}x{}",
            self.width, self.height
        );
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    async fn capture_photo(&self) -> Result<CapturedPhoto, CameraError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(CameraError::SessionNotRunning);
        }

        let frame = self.frame.fetch_add(1, Ordering::Relaxed);
        let (width, height) = (self.width, self.height);
        let data = tokio::task::spawn_blocking(move || encode_png(render_frame(width, height, frame)))
            .await
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))??;

        Ok(CapturedPhoto::new(data))
    }

    async fn stop_session(&self) {
        self.running.store(false, Ordering::Release);
        info!("Pattern camera session stopped");
    }

    fn name(&self) -> &str {
        "Pattern Camera"
    }
}
