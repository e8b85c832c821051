use chrono::{NaiveDate, NaiveDateTime};
use geocam::location::LocationFix;
use geocam::watermark::{
    OverlayLayout, PixelRect, WatermarkAssets, WatermarkConfig, composite_watermark, overlay_lines,
};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

fn reference_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn reference_fix() -> LocationFix {
    let mut fix = LocationFix::new(40.712776, -74.005974, 10.0, 5.0);
    fix.captured_at = reference_time().and_utc();
    fix
}

fn reference_source() -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(1000, 1200, Rgba([240, 240, 240, 255])))
}

fn assets() -> WatermarkAssets {
    let mut assets = WatermarkAssets::load(
        std::path::Path::new("static/DejaVuSans.ttf"),
        std::path::Path::new("static/logo.png"),
    );
    assert!(assets.font.is_some(), "bundled font should load");
    assets.logo = Some(RgbaImage::from_pixel(100, 100, Rgba([0, 0, 255, 255])));
    assets
}

/// Rows where `image` differs from `plain`, grouped into consecutive runs
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
fn test_reference_scenario_layout_and_content() {
    let config = WatermarkConfig::default();
    let output = composite_watermark(
        &reference_source(),
        &reference_fix(),
        "Test Ave",
        reference_time(),
        &assets(),
        &config,
    );
    assert_eq!(output.dimensions(), (1000, 1200));

    let layout = OverlayLayout::compute(1000, 1200, &config);
    assert_eq!(layout.panel, PixelRect::new(20, 1000, 960, 180));
    assert_eq!(layout.logo, PixelRect::new(880, 20, 100, 100));

    let lines = overlay_lines(&reference_fix(), "Test Ave", reference_time());
    assert_eq!(lines[0], "Latitude: 40.712776");
    assert_eq!(lines[1], "Longitude: -74.005974");
    assert_eq!(lines[2], "Elevation: 10.0 m");
    assert_eq!(lines[3], "Accuracy: 5.0 m");
    assert_eq!(lines[4], "Date: 2024-01-01 00:00:00");
    assert_eq!(lines[5], "Address: Test Ave");

    let output = output.to_rgba8();
    assert_eq!(output.get_pixel(930, 70), &Rgba([0, 0, 255, 255]));
    // 240 * 77 / 255, rounded
    assert_eq!(output.get_pixel(975, 1175), &Rgba([72, 72, 72, 255]));
    assert_eq!(output.get_pixel(10, 10), &Rgba([240, 240, 240, 255]));

    // Six lines of text, all inside the panel
    let mut no_font = assets();
    no_font.font = None;
    let plain = composite_watermark(
        &reference_source(),
        &reference_fix(),
        "Test Ave",
        reference_time(),
        &no_font,
        &config,
    )
    .to_rgba8();

    let bands = changed_bands(&output, &plain);
    assert_eq!(bands.len(), 6, "text bands: {:?}", bands);
    assert!(bands[0].0 >= 1000 && bands[5].1 < 1180);
    let mut white = 0;
    for (x, y, pixel) in output.enumerate_pixels() {
        if pixel != plain.get_pixel(x, y) {
            assert!(layout.panel.contains(x, y), "text outside panel at {x},{y}");
            if pixel == &Rgba([255, 255, 255, 255]) {
                white += 1;
            }
        }
    }
    assert!(white > 0);
}

#[test]
fn test_missing_logo_still_gets_panel() {
    let config = WatermarkConfig::default();
    let mut no_logo = assets();
    no_logo.logo = None;

    let output = composite_watermark(
        &reference_source(),
        &reference_fix(),
        "Test Ave",
        reference_time(),
        &no_logo,
        &config,
    )
    .to_rgba8();

    assert_eq!(output.dimensions(), (1000, 1200));
    assert_eq!(output.get_pixel(930, 70), &Rgba([240, 240, 240, 255]));
    assert_eq!(output.get_pixel(975, 1175), &Rgba([72, 72, 72, 255]));
}

#[test]
fn test_same_inputs_same_pixels() {
    let config = WatermarkConfig::default();
    let assets = assets();
    let run = || {
        composite_watermark(
            &reference_source(),
            &reference_fix(),
            "Test Ave",
            reference_time(),
            &assets,
            &config,
        )
        .to_rgba8()
    };
    assert_eq!(run(), run());
}
