//! Pixel-region image differ.
//!
//! Two rasters (or two regions of them) are compared over their common
//! top-left window. Pixels outside that window, present in only one side,
//! always count as different. When anything differs a visualization is
//! rendered on a canvas the size of the larger side and persisted through
//! the [`ArtifactStore`].

use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::artifacts::ArtifactStore;
use crate::error::{ItemError, Result, SnapdiffError};
use crate::image_loader::load_image;
use crate::types::{Area, PixelRegion};

/// Opaque red marks differing pixels and the area outside the common window.
pub const HIGHLIGHT: Rgba<u8> = Rgba([255, 0, 0, 255]);

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// What a visualization shows under the highlights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// The actual crop with differing pixels painted over.
    Background,
    /// Only the differing pixels on a transparent window.
    Transparent,
}

/// Which part of the two rasters is compared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiffScope {
    Whole,
    /// Element bounds in logical pixels; `retina` doubles them.
    Regions {
        actual: Area,
        expected: Area,
        retina: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageDiff {
    pub diff_pixels: u64,
    pub percentage: f64,
    /// Reference to the persisted visualization, when one was written.
    pub artifact: Option<String>,
}

impl ImageDiff {
    fn identical() -> Self {
        Self {
            diff_pixels: 0,
            percentage: 0.0,
            artifact: None,
        }
    }
}

/// Rounds a percentage to three decimals.
pub fn round_percentage(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Compares two rasters and persists a visualization when they differ.
///
/// Passing `None` for `artifacts` measures without rendering.
pub fn compare_images(
    actual: &RgbaImage,
    expected: &RgbaImage,
    scope: DiffScope,
    inaccuracy: u8,
    mode: RenderMode,
    artifacts: Option<&ArtifactStore>,
) -> std::result::Result<ImageDiff, ItemError> {
    let (actual_region, expected_region, scale) = match scope {
        DiffScope::Whole => (
            PixelRegion::whole(actual.width(), actual.height()),
            PixelRegion::whole(expected.width(), expected.height()),
            1,
        ),
        DiffScope::Regions {
            actual,
            expected,
            retina,
        } => (
            PixelRegion::from_area(&actual),
            PixelRegion::from_area(&expected),
            if retina { 2 } else { 1 },
        ),
    };
    let actual_region = scale_region(actual_region, scale);
    let expected_region = scale_region(expected_region, scale);

    let min_w = actual_region.width.min(expected_region.width);
    let min_h = actual_region.height.min(expected_region.height);
    let max_w = actual_region.width.max(expected_region.width);
    let max_h = actual_region.height.max(expected_region.height);
    if min_w == 0 || min_h == 0 {
        return Ok(ImageDiff::identical());
    }

    let actual_window = PixelRegion {
        width: min_w,
        height: min_h,
        ..actual_region
    };
    let expected_window = PixelRegion {
        width: min_w,
        height: min_h,
        ..expected_region
    };
    ensure_fits("actual", &actual_window, actual)?;
    ensure_fits("expected", &expected_window, expected)?;

    let mut canvas = artifacts.map(|_| RgbaImage::from_pixel(max_w, max_h, HIGHLIGHT));
    let mut diff_pixels: u64 = 0;
    for y in 0..min_h {
        for x in 0..min_w {
            let a = actual.get_pixel(actual_window.x + x, actual_window.y + y);
            let e = expected.get_pixel(expected_window.x + x, expected_window.y + y);
            let differs = pixels_differ(a, e, inaccuracy);
            if differs {
                diff_pixels += 1;
            }
            if let Some(canvas) = canvas.as_mut() {
                let shown = match (differs, mode) {
                    (true, _) => HIGHLIGHT,
                    (false, RenderMode::Background) => *a,
                    (false, RenderMode::Transparent) => TRANSPARENT,
                };
                canvas.put_pixel(x, y, shown);
            }
        }
    }

    let outer_w = u64::from(max_w - min_w);
    let outer_h = u64::from(max_h - min_h);
    diff_pixels += outer_w * u64::from(min_h) + u64::from(min_w) * outer_h;

    if diff_pixels == 0 {
        return Ok(ImageDiff::identical());
    }

    let percentage = diff_pixels as f64 * 100.0 / (u64::from(max_w) * u64::from(max_h)) as f64;
    let artifact = match (artifacts, canvas) {
        (Some(store), Some(canvas)) => Some(store.save(&canvas).map_err(|e| {
            ItemError::image_compare(format!("failed to persist diff image: {e}"))
        })?),
        _ => None,
    };

    Ok(ImageDiff {
        diff_pixels,
        percentage,
        artifact,
    })
}

/// Whole-image comparison of two files, outside of any report.
pub fn compare_files(
    actual: &Path,
    expected: &Path,
    inaccuracy: u8,
    artifacts: Option<&ArtifactStore>,
) -> Result<ImageDiff> {
    let actual = load_image(actual)?;
    let expected = load_image(expected)?;
    let mut diff = compare_images(
        &actual,
        &expected,
        DiffScope::Whole,
        inaccuracy,
        RenderMode::Background,
        artifacts,
    )
    .map_err(|e| SnapdiffError::Compare(e.to_string()))?;
    diff.percentage = round_percentage(diff.percentage);
    Ok(diff)
}

fn pixels_differ(a: &Rgba<u8>, e: &Rgba<u8>, inaccuracy: u8) -> bool {
    a.0.iter()
        .zip(e.0.iter())
        .any(|(x, y)| x.abs_diff(*y) > inaccuracy)
}

fn scale_region(region: PixelRegion, scale: u32) -> PixelRegion {
    PixelRegion {
        x: region.x.saturating_mul(scale),
        y: region.y.saturating_mul(scale),
        width: region.width.saturating_mul(scale),
        height: region.height.saturating_mul(scale),
    }
}

fn ensure_fits(
    side: &str,
    window: &PixelRegion,
    image: &RgbaImage,
) -> std::result::Result<(), ItemError> {
    if window.fits_within(image.width(), image.height()) {
        Ok(())
    } else {
        Err(ItemError::image_compare(format!(
            "{side} region {}x{} at ({}, {}) exceeds image bounds {}x{}",
            window.width,
            window.height,
            window.x,
            window.y,
            image.width(),
            image.height()
        )))
    }
}
