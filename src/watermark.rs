use ab_glyph::{FontArc, PxScale};
use chrono::NaiveDateTime;
use image::{DynamicImage, Rgba, RgbaImage, imageops::FilterType};
use imageproc::drawing::{draw_text_mut, text_size};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::location::LocationFix;

/// Pattern used for the `Date:` line of the overlay
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Inner margin between the panel edge and the text block
const TEXT_MARGIN: u32 = 8;

/// Configuration for the watermark overlay
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// TrueType font used for the text panel
    pub font_path: PathBuf,
    /// Logo stamped in the top-right corner
    pub logo_path: PathBuf,
    /// Font size for the text panel
    pub font_size: f32,
    /// Distance in pixels from the image edges to the panel and logo
    pub inset: u32,
    /// Height of the text panel in pixels
    pub panel_height: u32,
    /// Side of the square logo in pixels
    pub logo_size: u32,
    /// Opacity of the black panel background, 0.0 to 1.0
    pub panel_opacity: f32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            font_path: PathBuf::from("static/DejaVuSans.ttf"),
            logo_path: PathBuf::from("static/logo.png"),
            font_size: 20.0,
            inset: 20,
            panel_height: 180,
            logo_size: 100,
            panel_opacity: 0.7,
        }
    }
}

impl WatermarkConfig {
    /// Alpha byte of the panel background
    pub fn panel_alpha(&self) -> u8 {
        // f32 0.7 * 255 lands exactly on 178.5; widen first so 0.7 maps to 178
        (f64::from(self.panel_opacity.clamp(0.0, 1.0)) * 255.0).round() as u8
    }

    fn line_height(&self) -> u32 {
        (self.font_size * 1.2).round() as u32
    }
}

/// Axis-aligned rectangle in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Where the text panel and the logo land on an image of a given size.
///
/// Both rectangles are clamped to the image bounds. Images narrower than
/// twice the inset get an empty panel, and images too short for the full
/// panel height get a shorter one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayLayout {
    pub panel: PixelRect,
    pub logo: PixelRect,
}

impl OverlayLayout {
    pub fn compute(width: u32, height: u32, config: &WatermarkConfig) -> Self {
        let inset = config.inset;

        let panel_x = inset.min(width);
        let panel_width = width.saturating_sub(inset.saturating_mul(2));
        let panel_bottom = height.saturating_sub(inset);
        let panel_y = panel_bottom.saturating_sub(config.panel_height);
        let panel = PixelRect::new(panel_x, panel_y, panel_width, panel_bottom - panel_y);

        let logo_x = width.saturating_sub(inset.saturating_add(config.logo_size));
        let logo_y = inset.min(height);
        let logo = PixelRect::new(
            logo_x,
            logo_y,
            config.logo_size.min(width - logo_x),
            config.logo_size.min(height - logo_y),
        );

        Self { panel, logo }
    }
}

/// Font and logo used by the compositor. Either may be absent.
#[derive(Clone, Default)]
pub struct WatermarkAssets {
    pub font: Option<FontArc>,
    pub logo: Option<RgbaImage>,
}

impl WatermarkAssets {
    /// Load the font and logo from disk, logging and skipping whichever fails
    pub fn load(font_path: &Path, logo_path: &Path) -> Self {
        let font = match load_font(font_path) {
            Ok(font) => {
                info!("Loaded watermark font from {:?}", font_path);
                Some(font)
            }
            Err(e) => {
                warn!("Could not load watermark font {:?}: {}", font_path, e);
                None
            }
        };

        let logo = match image::open(logo_path) {
            Ok(img) => {
                info!("Loaded watermark logo from {:?}", logo_path);
                Some(img.to_rgba8())
            }
            Err(e) => {
                warn!("Could not load watermark logo {:?}: {}", logo_path, e);
                None
            }
        };

        Self { font, logo }
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_logo(mut self, logo: RgbaImage) -> Self {
        self.logo = Some(logo);
        self
    }
}

fn load_font(path: &Path) -> Result<FontArc, Box<dyn Error>> {
    let font_data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(font_data).map_err(|_| "Failed to parse font")?;
    Ok(font)
}

/// The six text lines burned into the panel, top to bottom
pub fn overlay_lines(fix: &LocationFix, address: &str, taken_at: NaiveDateTime) -> [String; 6] {
    [
        format!("Latitude: {:.6}", fix.latitude),
        format!("Longitude: {:.6}", fix.longitude),
        format!("Elevation: {:.1} m", fix.altitude),
        format!("Accuracy: {:.1} m", fix.horizontal_accuracy),
        format!("Date: {}", taken_at.format(DATE_FORMAT)),
        format!("Address: {}", address),
    ]
}

/// Burn the location panel and logo onto a copy of `source`.
///
/// The result always has the dimensions of `source`. A missing logo only
/// skips the logo and a missing font only skips the text, so a capture is
/// never lost to an asset problem.
pub fn composite_watermark(
    source: &DynamicImage,
    fix: &LocationFix,
    address: &str,
    taken_at: NaiveDateTime,
    assets: &WatermarkAssets,
    config: &WatermarkConfig,
) -> DynamicImage {
    let mut canvas = source.to_rgba8();
    let layout = OverlayLayout::compute(canvas.width(), canvas.height(), config);

    if layout.panel.is_empty() {
        debug!(
            "Image {}x{} too small for the text panel, skipping it",
            canvas.width(),
            canvas.height()
        );
    } else {
        fill_translucent(&mut canvas, layout.panel, Rgba([0, 0, 0, config.panel_alpha()]));

        match &assets.font {
            Some(font) => {
                let lines = overlay_lines(fix, address, taken_at);
                draw_panel_text(&mut canvas, layout.panel, &lines, font, config);
            }
            None => warn!("No watermark font available, panel drawn without text"),
        }
    }

    match &assets.logo {
        Some(logo) if !layout.logo.is_empty() => {
            let logo = fit_logo(logo, config.logo_size);
            image::imageops::overlay(&mut canvas, &logo, layout.logo.x as i64, layout.logo.y as i64);
        }
        Some(_) => debug!("No room for the logo, skipping it"),
        // Keep the text panel; only the logo is dropped
        None => warn!("Logo could not be loaded, stamping without it"),
    }

    DynamicImage::ImageRgba8(canvas)
}

/// Blend a flat color over `rect`, treating `color[3]` as its coverage
fn fill_translucent(image: &mut RgbaImage, rect: PixelRect, color: Rgba<u8>) {
    let alpha = color[3] as u32;
    let keep = 255 - alpha;
    let x_end = rect.right().min(image.width());
    let y_end = rect.bottom().min(image.height());

    for y in rect.y..y_end {
        for x in rect.x..x_end {
            let pixel = image.get_pixel_mut(x, y);
            for channel in 0..3 {
                pixel[channel] =
                    ((pixel[channel] as u32 * keep + color[channel] as u32 * alpha + 127) / 255)
                        as u8;
            }
            pixel[3] = (alpha + (pixel[3] as u32 * keep + 127) / 255).min(255) as u8;
        }
    }
}

fn draw_panel_text(
    image: &mut RgbaImage,
    panel: PixelRect,
    lines: &[String],
    font: &FontArc,
    config: &WatermarkConfig,
) {
    let scale = PxScale::from(config.font_size);
    let line_height = config.line_height();
    let max_width = panel.width.saturating_sub(TEXT_MARGIN * 2);
    let x = panel.x + TEXT_MARGIN;
    let mut y = panel.y + TEXT_MARGIN;

    for line in lines {
        // Stop rather than spill text out of a shortened panel
        if y + line_height > panel.bottom() {
            debug!("Panel too short, dropping remaining overlay lines");
            break;
        }

        let fitted = fit_line(line, max_width, scale, font);
        draw_text_mut(
            image,
            Rgba([255, 255, 255, 255]),
            x as i32,
            y as i32,
            scale,
            font,
            &fitted,
        );
        y += line_height;
    }
}

/// Truncate `line` with an ellipsis until it renders within `max_width`
fn fit_line(line: &str, max_width: u32, scale: PxScale, font: &FontArc) -> String {
    if text_size(scale, font, line).0 <= max_width {
        return line.to_string();
    }

    let mut chars: Vec<char> = line.chars().collect();
    while chars.pop().is_some() {
        let mut candidate: String = chars.iter().collect();
        candidate.push('…');
        if text_size(scale, font, &candidate).0 <= max_width {
            return candidate;
        }
    }

    String::new()
}

fn fit_logo(logo: &RgbaImage, size: u32) -> RgbaImage {
    if logo.dimensions() == (size, size) {
        logo.clone()
    } else {
        image::imageops::resize(logo, size, size, FilterType::Lanczos3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    const SOURCE_COLOR: Rgba<u8> = Rgba([200, 100, 50, 255]);
    const LOGO_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn test_fix() -> LocationFix {
        LocationFix {
            latitude: 40.712776,
            longitude: -74.005974,
            altitude: 10.0,
            horizontal_accuracy: 5.0,
            captured_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn test_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn source(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, SOURCE_COLOR))
    }

    fn logo_assets() -> WatermarkAssets {
        WatermarkAssets::default().with_logo(RgbaImage::from_pixel(100, 100, LOGO_COLOR))
    }

    fn test_font() -> FontArc {
        load_font(Path::new("static/DejaVuSans.ttf")).expect("bundled font should load")
    }

    /// Runs of consecutive rows where `image` differs from `plain`
    fn changed_bands(image: &RgbaImage, plain: &RgbaImage) -> Vec<(u32, u32)> {
        let mut bands: Vec<(u32, u32)> = Vec::new();
        for y in 0..image.height() {
            if (0..image.width()).all(|x| image.get_pixel(x, y) == plain.get_pixel(x, y)) {
                continue;
            }
            match bands.last_mut() {
                Some((_, end)) if *end + 1 == y => *end = y,
                _ => bands.push((y, y)),
            }
        }
        bands
    }

    #[test]
    fn test_watermark_config_default() {
        let config = WatermarkConfig::default();
        assert_eq!(config.font_size, 20.0);
        assert_eq!(config.inset, 20);
        assert_eq!(config.panel_height, 180);
        assert_eq!(config.logo_size, 100);
        assert_eq!(config.panel_alpha(), 178);
    }

    #[test]
    fn test_panel_alpha_bounds() {
        let mut config = WatermarkConfig::default();
        config.panel_opacity = 1.0;
        assert_eq!(config.panel_alpha(), 255);
        config.panel_opacity = 0.0;
        assert_eq!(config.panel_alpha(), 0);
        config.panel_opacity = 3.0;
        assert_eq!(config.panel_alpha(), 255);
    }

    #[test]
    fn test_layout_for_reference_image() {
        let layout = OverlayLayout::compute(1000, 1200, &WatermarkConfig::default());
        assert_eq!(layout.panel, PixelRect::new(20, 1000, 960, 180));
        assert_eq!(layout.logo, PixelRect::new(880, 20, 100, 100));
    }

    #[test]
    fn test_layout_minimum_size_fits_inside() {
        let layout = OverlayLayout::compute(41, 201, &WatermarkConfig::default());
        assert_eq!(layout.panel, PixelRect::new(20, 1, 1, 180));
        assert!(layout.panel.right() <= 41);
        assert!(layout.panel.bottom() <= 201);
    }

    #[test]
    fn test_layout_clamps_small_images() {
        let layout = OverlayLayout::compute(30, 100, &WatermarkConfig::default());
        assert!(layout.panel.is_empty());
        assert_eq!(layout.panel.bottom(), 80);
        assert_eq!(layout.logo.x, 0);
        assert!(layout.logo.right() <= 30);

        let layout = OverlayLayout::compute(10, 10, &WatermarkConfig::default());
        assert!(layout.panel.is_empty());
        assert!(layout.logo.is_empty());
    }

    #[test]
    fn test_overlay_lines_formatting() {
        let lines = overlay_lines(&test_fix(), "Test Ave", test_time());
        assert_eq!(
            lines,
            [
                "Latitude: 40.712776".to_string(),
                "Longitude: -74.005974".to_string(),
                "Elevation: 10.0 m".to_string(),
                "Accuracy: 5.0 m".to_string(),
                "Date: 2024-01-01 00:00:00".to_string(),
                "Address: Test Ave".to_string(),
            ]
        );
    }

    #[test]
    fn test_overlay_lines_fixed_precision() {
        let mut fix = test_fix();
        fix.latitude = 1.0 / 3.0;
        fix.altitude = 12.345;
        let lines = overlay_lines(&fix, "", test_time());
        assert_eq!(lines[0], "Latitude: 0.333333");
        assert_eq!(lines[2], "Elevation: 12.3 m");
    }

    #[test]
    fn test_composite_keeps_dimensions() {
        let output = composite_watermark(
            &source(1000, 1200),
            &test_fix(),
            "Test Ave",
            test_time(),
            &logo_assets(),
            &WatermarkConfig::default(),
        );
        assert_eq!(output.width(), 1000);
        assert_eq!(output.height(), 1200);
    }

    #[test]
    fn test_panel_darkens_source() {
        let output = composite_watermark(
            &source(1000, 1200),
            &test_fix(),
            "Test Ave",
            test_time(),
            &WatermarkAssets::default(),
            &WatermarkConfig::default(),
        )
        .to_rgba8();

        // Bottom-right corner of the panel never carries text
        assert_eq!(output.get_pixel(979, 1179), &Rgba([60, 30, 15, 255]));
        assert_eq!(output.get_pixel(20, 1000), &Rgba([60, 30, 15, 255]));
        // Just outside the panel
        assert_eq!(output.get_pixel(19, 1100), &SOURCE_COLOR);
        assert_eq!(output.get_pixel(500, 999), &SOURCE_COLOR);
        assert_eq!(output.get_pixel(500, 1180), &SOURCE_COLOR);
    }

    #[test]
    fn test_logo_stamped_top_right() {
        let output = composite_watermark(
            &source(1000, 1200),
            &test_fix(),
            "Test Ave",
            test_time(),
            &logo_assets(),
            &WatermarkConfig::default(),
        )
        .to_rgba8();

        assert_eq!(output.get_pixel(880, 20), &LOGO_COLOR);
        assert_eq!(output.get_pixel(979, 119), &LOGO_COLOR);
        assert_eq!(output.get_pixel(879, 20), &SOURCE_COLOR);
        assert_eq!(output.get_pixel(980, 20), &SOURCE_COLOR);
        assert_eq!(output.get_pixel(900, 120), &SOURCE_COLOR);
    }

    #[test]
    fn test_missing_logo_only_skips_logo_region() {
        let config = WatermarkConfig::default();
        let with_logo = composite_watermark(
            &source(400, 400),
            &test_fix(),
            "Test Ave",
            test_time(),
            &logo_assets(),
            &config,
        )
        .to_rgba8();
        let without_logo = composite_watermark(
            &source(400, 400),
            &test_fix(),
            "Test Ave",
            test_time(),
            &WatermarkAssets::default(),
            &config,
        )
        .to_rgba8();

        let layout = OverlayLayout::compute(400, 400, &config);
        for (x, y, pixel) in without_logo.enumerate_pixels() {
            if layout.logo.contains(x, y) {
                assert_eq!(pixel, &SOURCE_COLOR);
            } else {
                assert_eq!(pixel, with_logo.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn test_logo_is_resized_to_square() {
        let assets =
            WatermarkAssets::default().with_logo(RgbaImage::from_pixel(40, 60, LOGO_COLOR));
        let output = composite_watermark(
            &source(400, 400),
            &test_fix(),
            "",
            test_time(),
            &assets,
            &WatermarkConfig::default(),
        )
        .to_rgba8();

        // Center of the 100x100 logo area is well inside the resized logo
        assert_eq!(output.get_pixel(330, 70), &LOGO_COLOR);
        assert_eq!(fit_logo(&RgbaImage::new(40, 60), 100).dimensions(), (100, 100));
    }

    #[test]
    fn test_transparent_logo_keeps_source() {
        let assets = WatermarkAssets::default()
            .with_logo(RgbaImage::from_pixel(100, 100, Rgba([255, 0, 0, 0])));
        let output = composite_watermark(
            &source(400, 400),
            &test_fix(),
            "",
            test_time(),
            &assets,
            &WatermarkConfig::default(),
        )
        .to_rgba8();
        assert_eq!(output.get_pixel(330, 70), &SOURCE_COLOR);
    }

    #[test]
    fn test_tiny_image_is_returned_unchanged() {
        let tiny = source(10, 10);
        let output = composite_watermark(
            &tiny,
            &test_fix(),
            "Test Ave",
            test_time(),
            &logo_assets(),
            &WatermarkConfig::default(),
        );
        assert_eq!(output.to_rgba8(), tiny.to_rgba8());
    }

    #[test]
    fn test_source_is_not_modified() {
        let original = source(300, 300);
        let copy = original.clone();
        let _ = composite_watermark(
            &original,
            &test_fix(),
            "Test Ave",
            test_time(),
            &logo_assets(),
            &WatermarkConfig::default(),
        );
        assert_eq!(original.to_rgba8(), copy.to_rgba8());
    }

    #[test]
    fn test_composite_is_deterministic() {
        let assets = logo_assets().with_font(test_font());
        let config = WatermarkConfig::default();

        let first = composite_watermark(
            &source(640, 480),
            &test_fix(),
            "Test Ave",
            test_time(),
            &assets,
            &config,
        );
        let second = composite_watermark(
            &source(640, 480),
            &test_fix(),
            "Test Ave",
            test_time(),
            &assets,
            &config,
        );
        assert_eq!(first.to_rgba8(), second.to_rgba8());
    }

    #[test]
    fn test_text_is_drawn_inside_panel() {
        let config = WatermarkConfig::default();
        let assets = WatermarkAssets::default().with_font(test_font());
        let plain = composite_watermark(
            &source(1000, 1200),
            &test_fix(),
            "Test Ave",
            test_time(),
            &WatermarkAssets::default(),
            &config,
        )
        .to_rgba8();
        let with_text = composite_watermark(
            &source(1000, 1200),
            &test_fix(),
            "Test Ave",
            test_time(),
            &assets,
            &config,
        )
        .to_rgba8();

        let layout = OverlayLayout::compute(1000, 1200, &config);
        let mut changed = 0;
        for (x, y, pixel) in with_text.enumerate_pixels() {
            if pixel != plain.get_pixel(x, y) {
                assert!(layout.panel.contains(x, y), "text drawn outside panel at {x},{y}");
                changed += 1;
            }
        }
        assert!(changed > 0);
    }

    #[test]
    fn test_six_text_lines_in_panel() {
        let config = WatermarkConfig::default();
        let render = |assets: &WatermarkAssets| {
            composite_watermark(
                &source(1000, 1200),
                &test_fix(),
                "Test Ave",
                test_time(),
                assets,
                &config,
            )
            .to_rgba8()
        };
        let plain = render(&WatermarkAssets::default());
        let output = render(&WatermarkAssets::default().with_font(test_font()));

        let panel = OverlayLayout::compute(1000, 1200, &config).panel;
        let bands = changed_bands(&output, &plain);
        assert_eq!(bands.len(), 6, "text bands: {:?}", bands);
        assert!(bands[0].0 >= panel.y + TEXT_MARGIN);
        assert!(bands[5].1 < panel.bottom());
    }

    #[test]
    fn test_long_address_on_narrow_image() {
        let output = composite_watermark(
            &source(60, 400),
            &test_fix(),
            &"Very Long Street ".repeat(120),
            test_time(),
            &WatermarkAssets::default().with_font(test_font()),
            &WatermarkConfig::default(),
        );
        assert_eq!((output.width(), output.height()), (60, 400));
    }

    #[test]
    fn test_fit_line_truncates_long_text() {
        let font = test_font();

        let scale = PxScale::from(20.0);
        let long = "Address: ".to_string() + &"x".repeat(400);
        let fitted = fit_line(&long, 300, scale, &font);
        assert!(fitted.ends_with('…'));
        assert!(text_size(scale, &font, &fitted).0 <= 300);

        assert_eq!(fit_line("short", 300, scale, &font), "short");
    }
}
