use std::time::{Duration, Instant};

use crate::detect::TargetMatcher;
use crate::error::CaptureError;
use crate::frame::Image;
use crate::ingest::FrameSource;

use super::Clock;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_TARGET_SAMPLES: usize = 5;
pub const DEFAULT_SAMPLE_SPACING: Duration = Duration::from_millis(200);

/// Bounds for one burst.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BurstLimits {
    /// Maximum pulls from the source per burst.
    pub max_attempts: u32,
    /// Stop early once this many frames still show the target.
    pub target_samples: usize,
    /// Pause after every pull.
    pub spacing: Duration,
}

impl Default for BurstLimits {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            target_samples: DEFAULT_TARGET_SAMPLES,
            spacing: DEFAULT_SAMPLE_SPACING,
        }
    }
}

/// An in-progress burst capture.
#[derive(Clone, Debug)]
pub struct CaptureEvent {
    pub started_at: Instant,
    /// Full-resolution frames in which the target was still present.
    pub candidates: Vec<Image>,
    pub attempts: u32,
    pub limits: BurstLimits,
}

impl CaptureEvent {
    pub fn new(started_at: Instant, limits: BurstLimits) -> Self {
        Self {
            started_at,
            candidates: Vec::with_capacity(limits.target_samples),
            attempts: 0,
            limits,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.candidates.len() >= self.limits.target_samples
            || self.attempts >= self.limits.max_attempts
    }
}

/// Pulls a bounded burst of fresh cycles after a detection fires.
#[derive(Clone, Debug)]
pub struct BurstSampler {
    limits: BurstLimits,
    matcher: TargetMatcher,
}

impl BurstSampler {
    pub fn new(limits: BurstLimits, matcher: TargetMatcher) -> Self {
        Self { limits, matcher }
    }

    pub fn limits(&self) -> BurstLimits {
        self.limits
    }

    /// Run one burst. Blocks the caller for up to `max_attempts` pulls and sleeps.
    ///
    /// Each pulled cycle is re-checked for the target; only cycles that still
    /// show it contribute their full-resolution frame. Source errors abort the
    /// burst and propagate.
    pub fn sample(
        &self,
        source: &mut dyn FrameSource,
        clock: &dyn Clock,
    ) -> Result<CaptureEvent, CaptureError> {
        let mut event = CaptureEvent::new(clock.now(), self.limits);
        while !event.is_complete() {
            let cycle = source.next_cycle()?;
            event.attempts += 1;
            if self.matcher.is_present(&cycle.objects) {
                event.candidates.push(cycle.sample.full);
                log::debug!(
                    "valid {} frame collected ({}/{})",
                    self.matcher.label(),
                    event.candidates.len(),
                    self.limits.target_samples
                );
            } else {
                log::debug!("burst frame skipped: no {} present", self.matcher.label());
            }
            clock.sleep(self.limits.spacing);
        }
        Ok(event)
    }
}
