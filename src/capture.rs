use chrono::NaiveDateTime;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::address::{AddressConfig, DynAddressResolver, PlaceholderResolver, resolve_or_placeholder};
use crate::camera::{CameraError, DynCameraSession, Orientation};
use crate::display::DisplayHandle;
use crate::library::{DynPhotoLibrary, SavedPhoto};
use crate::location::{LatestFix, LocationFix};
use crate::watermark::{WatermarkAssets, WatermarkConfig, composite_watermark};

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Camera is not available")]
    CameraUnavailable,

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Could not decode captured photo: {0}")]
    Decode(#[from] image::ImageError),

    #[error("No location fix available")]
    NoLocationFix,

    #[error("Compositing failed: {0}")]
    Compositing(String),
}

/// A stamped photo that has been put on screen and handed to the library
pub struct StampedPhoto {
    pub image: Arc<DynamicImage>,
    pub fix: LocationFix,
    pub address: String,
    pub taken_at: NaiveDateTime,
    /// Resolves once the library write finishes; `None` if it failed
    pub save: JoinHandle<Option<SavedPhoto>>,
}

/// Runs the capture button: camera, location, stamping, display and save
pub struct CaptureController {
    camera: Option<DynCameraSession>,
    orientation: Orientation,
    location: LatestFix,
    resolver: DynAddressResolver,
    address: AddressConfig,
    assets: Arc<WatermarkAssets>,
    watermark: Arc<WatermarkConfig>,
    library: DynPhotoLibrary,
    display: DisplayHandle,
}

impl CaptureController {
    /// `camera` is `None` when the camera failed to set up; captures then
    /// fail with [`CaptureError::CameraUnavailable`]
    pub fn new(
        camera: Option<DynCameraSession>,
        location: LatestFix,
        library: DynPhotoLibrary,
        display: DisplayHandle,
    ) -> Self {
        Self {
            camera,
            orientation: Orientation::default(),
            location,
            resolver: Arc::new(PlaceholderResolver),
            address: AddressConfig::default(),
            assets: Arc::new(WatermarkAssets::default()),
            watermark: Arc::new(WatermarkConfig::default()),
            library,
            display,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_addresses(mut self, resolver: DynAddressResolver, config: AddressConfig) -> Self {
        self.resolver = resolver;
        self.address = config;
        self
    }

    pub fn with_watermark(mut self, assets: WatermarkAssets, config: WatermarkConfig) -> Self {
        self.assets = Arc::new(assets);
        self.watermark = Arc::new(config);
        self
    }

    pub fn is_camera_available(&self) -> bool {
        self.camera.is_some()
    }

    /// Take one photo, stamp it with the latest fix, show it and start saving it.
    ///
    /// Without a fix the photo is dropped and nothing is shown or saved.
    pub async fn capture(&self) -> Result<StampedPhoto, CaptureError> {
        let camera = self.camera.as_ref().ok_or(CaptureError::CameraUnavailable)?;
        let photo = camera.capture_photo().await?;

        // The fix is read when the photo arrives, not when the button was pressed
        let fix = self.location.current().ok_or(CaptureError::NoLocationFix)?;

        let address = resolve_or_placeholder(
            self.resolver.as_ref(),
            &fix,
            Duration::from_millis(self.address.resolve_timeout_ms),
            &self.address.placeholder,
        )
        .await;
        let taken_at = photo.captured_at.naive_local();

        let orientation = self.orientation;
        let assets = self.assets.clone();
        let config = self.watermark.clone();
        let overlay_address = address.clone();
        let image = tokio::task::spawn_blocking(move || -> Result<DynamicImage, image::ImageError> {
            let source = orientation.apply(photo.decode()?);
            Ok(composite_watermark(
                &source,
                &fix,
                &overlay_address,
                taken_at,
                &assets,
                &config,
            ))
        })
        .await
        .map_err(|e| CaptureError::Compositing(e.to_string()))??;

        let image = Arc::new(image);
        info!(
            "Stamped {}x{} photo at {:.6}, {:.6}",
            image.width(),
            image.height(),
            fix.latitude,
            fix.longitude
        );

        self.display.show(image.clone());
        let save = self.spawn_save(image.clone());

        Ok(StampedPhoto {
            image,
            fix,
            address,
            taken_at,
            save,
        })
    }

    /// [`capture`](Self::capture), logging and swallowing any failure
    pub async fn capture_or_log(&self) -> Option<StampedPhoto> {
        match self.capture().await {
            Ok(stamped) => Some(stamped),
            Err(CaptureError::NoLocationFix) => {
                info!("No location fix yet, photo dropped");
                None
            }
            Err(e) => {
                error!("Capture failed: {}", e);
                None
            }
        }
    }

    fn spawn_save(&self, image: Arc<DynamicImage>) -> JoinHandle<Option<SavedPhoto>> {
        let library = self.library.clone();
        tokio::spawn(async move {
            match library.save(image).await {
                Ok(saved) => Some(saved),
                Err(e) => {
                    error!("Failed to save photo to {}: {}", library.name(), e);
                    None
                }
            }
        })
    }
}
