use async_trait::async_trait;
use chrono::Local;
use image::{DynamicImage, ImageEncoder, codecs::jpeg::JpegEncoder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Save task failed: {0}")]
    TaskFailed(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LibraryConfig {
    Directory(DirectoryLibraryConfig),
    Null,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        LibraryConfig::Directory(DirectoryLibraryConfig::default())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryLibraryConfig {
    pub directory: PathBuf,
    pub jpeg_quality: Option<u8>,
}

impl Default for DirectoryLibraryConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("photos"),
            jpeg_quality: Some(90),
        }
    }
}

/// Where a saved photo ended up
#[derive(Debug, Clone, PartialEq)]
pub struct SavedPhoto {
    pub location: Option<PathBuf>,
}

#[async_trait]
pub trait PhotoLibrary: Send + Sync {
    async fn save(&self, photo: Arc<DynamicImage>) -> Result<SavedPhoto, LibraryError>;
    fn name(&self) -> &str;
}

pub type DynPhotoLibrary = Arc<dyn PhotoLibrary>;

pub fn create_library(config: &LibraryConfig) -> DynPhotoLibrary {
    match config {
        LibraryConfig::Directory(directory) => Arc::new(DirectoryLibrary::new(directory)),
        LibraryConfig::Null => Arc::new(NullLibrary),
    }
}

/// Writes photos as JPEG files into a directory
pub struct DirectoryLibrary {
    directory: PathBuf,
    jpeg_quality: u8,
}

impl DirectoryLibrary {
    pub fn new(config: &DirectoryLibraryConfig) -> Self {
        Self {
            directory: config.directory.clone(),
            jpeg_quality: config.jpeg_quality.unwrap_or(90).clamp(1, 100),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

fn photo_filename() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "IMG_{}_{}.jpg",
        Local::now().format("%Y%m%d_%H%M%S"),
        &id[..8]
    )
}

/// Encode as baseline JPEG. JPEG has no alpha channel, so flatten to RGB first.
pub fn write_jpeg(image: &DynamicImage, path: &Path, quality: u8) -> Result<(), LibraryError> {
    let rgb_image = image.to_rgb8();
    let output = std::io::BufWriter::new(std::fs::File::create(path)?);
    let encoder = JpegEncoder::new_with_quality(output, quality);
    encoder.write_image(
        &rgb_image,
        rgb_image.width(),
        rgb_image.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(())
}

#[async_trait]
impl PhotoLibrary for DirectoryLibrary {
    async fn save(&self, photo: Arc<DynamicImage>) -> Result<SavedPhoto, LibraryError> {
        tokio::fs::create_dir_all(&self.directory).await?;

        let path = self.directory.join(photo_filename());
        let quality = self.jpeg_quality;
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_jpeg(&photo, &target, quality))
            .await
            .map_err(|e| LibraryError::TaskFailed(e.to_string()))??;

        info!("Photo saved to {:?}", path);
        Ok(SavedPhoto {
            location: Some(path),
        })
    }

    fn name(&self) -> &str {
        "Directory Library"
    }
}

/// Discards photos, logging what would have been saved
pub struct NullLibrary;

#[async_trait]
impl PhotoLibrary for NullLibrary {
    async fn save(&self, photo: Arc<DynamicImage>) -> Result<SavedPhoto, LibraryError> {
        info!(
            "NULL PHOTO LIBRARY - Would save {}x{} photo",
            photo.width(),
            photo.height()
        );
        debug!("Photo color type: {:?}", photo.color());
        Ok(SavedPhoto { location: None })
    }

    fn name(&self) -> &str {
        "Null Photo Library (Logging Only)"
    }
}
