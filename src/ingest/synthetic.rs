//! Synthetic frame source (`stub://...`).
//!
//! Generates a static background with a periodic "visit" by the target. Even
//! visits render the target as a crisp checkerboard patch, odd visits as a
//! soft gradient, so both the save path and the not-sharp path get exercised
//! without camera hardware.

use std::time::{Duration, Instant};

use crate::detect::{label_index, BoundingBox, TrackedObject, TrackingStatus};
use crate::error::CaptureError;
use crate::frame::{ChannelOrder, FrameCycle, FrameSample, Image};

use super::FrameSource;

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    /// Square preview edge (detector input size).
    pub preview_size: u32,
    pub width: u32,
    pub height: u32,
    /// Class index reported for the visiting object.
    pub target_label: u32,
    /// Frames from the start of one visit to the start of the next.
    pub visit_period: u64,
    /// Frames the target stays in view per visit.
    pub visit_length: u64,
    /// Simulated wait per pull (camera frame interval).
    pub frame_interval: Duration,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "camera".to_string(),
            preview_size: 300,
            width: 640,
            height: 360,
            target_label: label_index("bird").unwrap_or(3),
            visit_period: 400,
            visit_length: 60,
            frame_interval: Duration::from_millis(25),
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        log::info!("SyntheticSource: connected to stub://{}", config.name);
        Self {
            config,
            frame_count: 0,
        }
    }

    fn visit(&self) -> Option<(u64, u64)> {
        let period = self.config.visit_period.max(1);
        let offset = self.frame_count % period;
        if offset < self.config.visit_length {
            Some((self.frame_count / period, offset))
        } else {
            None
        }
    }

    fn target_box(&self, offset: u64) -> BoundingBox {
        // Drift slowly left to right across the visit.
        let progress = offset as f32 / self.config.visit_length.max(1) as f32;
        let x_min = 0.2 + 0.3 * progress;
        BoundingBox {
            x_min,
            y_min: 0.3,
            x_max: x_min + 0.3,
            y_max: 0.7,
        }
    }

    fn render(&self, width: u32, height: u32, target: Option<(BoundingBox, bool)>) -> Image {
        let rect = target.map(|(bbox, sharp)| (bbox.denormalize(width, height), sharp));
        Image::from_fn(width, height, ChannelOrder::Bgr, |x, y| {
            if let Some((r, sharp)) = rect {
                let (xi, yi) = (x as i32, y as i32);
                if xi >= r.x1 && xi < r.x2 && yi >= r.y1 && yi < r.y2 {
                    let v = if sharp {
                        if ((x / 2) + (y / 2)) % 2 == 0 {
                            230
                        } else {
                            20
                        }
                    } else {
                        let span = (r.x2 - r.x1).max(1) as u32;
                        (60 + (x - r.x1 as u32) * 120 / span) as u8
                    };
                    return [v, v, v];
                }
            }
            // Sky-ish background: smooth vertical gradient.
            let v = (80 + y * 100 / height.max(1)) as u8;
            [v.saturating_add(60), v.saturating_add(20), v]
        })
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("stub://{}", self.config.name)
    }

    fn next_cycle(&mut self) -> Result<FrameCycle, CaptureError> {
        if !self.config.frame_interval.is_zero() {
            std::thread::sleep(self.config.frame_interval);
        }
        self.frame_count += 1;

        let target = self
            .visit()
            .map(|(visit, offset)| (self.target_box(offset), visit % 2 == 0));
        let objects = match target {
            Some((bbox, _)) => vec![TrackedObject {
                id: 0,
                label: self.config.target_label,
                bbox,
                status: TrackingStatus::Tracked,
            }],
            None => Vec::new(),
        };

        let preview = self.render(self.config.preview_size, self.config.preview_size, target);
        let full = self.render(self.config.width, self.config.height, target);
        Ok(FrameCycle {
            sample: FrameSample {
                preview,
                full,
                captured_at: Instant::now(),
            },
            objects,
        })
    }

    fn frames_delivered(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::{laplacian_variance, DEFAULT_SHARPNESS_THRESHOLD};

    fn fast_source() -> SyntheticSource {
        SyntheticSource::new(SyntheticConfig {
            width: 160,
            height: 90,
            preview_size: 60,
            visit_period: 10,
            visit_length: 4,
            frame_interval: Duration::ZERO,
            ..SyntheticConfig::default()
        })
    }

    #[test]
    fn target_appears_only_during_visits() {
        let mut source = fast_source();
        let present: Vec<bool> = (0..20)
            .map(|_| !source.next_cycle().unwrap().objects.is_empty())
            .collect();
        // frame_count is 1-based; offsets 1..=3 of each period plus offset 0 of the next.
        assert_eq!(present.iter().filter(|p| **p).count(), 8);
        assert!(present[0] && !present[5]);
        assert_eq!(source.frames_delivered(), 20);
    }

    #[test]
    fn alternate_visits_are_sharp_then_soft() {
        let mut source = fast_source();
        let first = source.next_cycle().unwrap();
        assert!(laplacian_variance(&first.sample.full) > DEFAULT_SHARPNESS_THRESHOLD);

        for _ in 0..9 {
            source.next_cycle().unwrap();
        }
        // frame 11 sits inside the second (soft) visit.
        let second = source.next_cycle().unwrap();
        assert!(!second.objects.is_empty());
        assert!(laplacian_variance(&second.sample.full) < DEFAULT_SHARPNESS_THRESHOLD);
    }
}
