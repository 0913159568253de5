use serde::Deserialize;
use std::borrow::Cow;

use super::labels::label_name;

/// Tracker lifecycle state reported for each object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingStatus {
    New,
    #[default]
    Tracked,
    Lost,
    Removed,
}

/// Bounding box in normalized (0..1) preview-frame coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

/// Bounding box in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Scale to a `width` x `height` frame, truncating toward zero.
    pub fn denormalize(&self, width: u32, height: u32) -> PixelRect {
        let (w, h) = (width as f32, height as f32);
        PixelRect {
            x1: (self.x_min * w) as i32,
            y1: (self.y_min * h) as i32,
            x2: (self.x_max * w) as i32,
            y2: (self.y_max * h) as i32,
        }
    }
}

/// One object as reported by the external tracking stage.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TrackedObject {
    pub id: u32,
    /// Class index into the detector's label map.
    pub label: u32,
    #[serde(rename = "roi")]
    pub bbox: BoundingBox,
    #[serde(default)]
    pub status: TrackingStatus,
}

impl TrackedObject {
    pub fn label_name(&self) -> Cow<'static, str> {
        label_name(self.label)
    }
}
