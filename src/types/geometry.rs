//! Geometry and comparison value types shared by the image and element differs.

use serde::{Deserialize, Serialize};

/// Element bounds in logical (CSS) pixels, as reported by the capture script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub right: f64,
    #[serde(default)]
    pub bottom: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

impl Area {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            right: left + width,
            bottom: top + height,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }
}

/// Integer pixel window inside a raster: offset plus size.
///
/// Logical areas are truncated to whole pixels before any retina scaling,
/// so a `10.7` wide element becomes `10` (or `20` on a 2x raster).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRegion {
    pub fn whole(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn from_area(area: &Area) -> Self {
        Self {
            x: truncate(area.left),
            y: truncate(area.top),
            width: truncate(area.width),
            height: truncate(area.height),
        }
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }
}

fn truncate(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.trunc().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

/// An actual/expected pair with an optional third slot describing the change.
///
/// `diff` stays empty for plain value changes and carries a sentinel such as
/// `[value added]` when only one side has the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<T>,
}

impl<T> Delta<T> {
    pub fn new(actual: Option<T>, expected: Option<T>) -> Self {
        Self {
            actual,
            expected,
            diff: None,
        }
    }

    pub fn both(actual: T, expected: T) -> Self {
        Self::new(Some(actual), Some(expected))
    }

    pub fn with_diff(mut self, diff: T) -> Self {
        self.diff = Some(diff);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_none() && self.expected.is_none() && self.diff.is_none()
    }
}

impl<T> Default for Delta<T> {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Field-by-field before/after view of two element areas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaDelta {
    pub left: Delta<f64>,
    pub top: Delta<f64>,
    pub right: Delta<f64>,
    pub bottom: Delta<f64>,
    pub width: Delta<f64>,
    pub height: Delta<f64>,
}

impl AreaDelta {
    pub fn between(actual: &Area, expected: &Area) -> Self {
        Self {
            left: Delta::both(actual.left, expected.left),
            top: Delta::both(actual.top, expected.top),
            right: Delta::both(actual.right, expected.right),
            bottom: Delta::both(actual.bottom, expected.bottom),
            width: Delta::both(actual.width, expected.width),
            height: Delta::both(actual.height, expected.height),
        }
    }
}
