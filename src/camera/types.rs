use chrono::{DateTime, Local};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Encoded photo bytes as delivered by a camera session
#[derive(Debug, Clone)]
pub struct CapturedPhoto {
    pub data: Vec<u8>,
    pub captured_at: DateTime<Local>,
}

impl CapturedPhoto {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            captured_at: Local::now(),
        }
    }

    pub fn decode(&self) -> Result<DynamicImage, image::ImageError> {
        image::load_from_memory(&self.data)
    }
}

/// How the device was held when the photo was taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    /// Home button on the right
    LandscapeLeft,
    /// Home button on the left
    LandscapeRight,
}

impl Orientation {
    /// Rotate a sensor frame so it is upright for this orientation
    pub fn apply(&self, image: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Portrait => image,
            Orientation::PortraitUpsideDown => image.rotate180(),
            Orientation::LandscapeLeft => image.rotate90(),
            Orientation::LandscapeRight => image.rotate270(),
        }
    }
}
