//! Detection-triggered burst capture with best-frame selection.
//!
//! Per frame cycle:
//!
//! ```text
//! IDLE --(target present & debounce elapsed)--> BURST_SAMPLING
//! BURST_SAMPLING --(no candidates)--> IDLE            SkippedNoValidFrames
//! BURST_SAMPLING --(>=1 candidate)--> SCORING
//! SCORING --(best <= threshold)--> IDLE               SkippedNotSharp
//! SCORING --(best > threshold)--> SAVE --> IDLE        Saved (debounce reset)
//! ```
//!
//! The burst runs inline: while sampling, nothing else consumes frames.

mod burst;
mod clock;
mod debounce;
mod fps;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::CaptureConfig;
use crate::detect::TargetMatcher;
use crate::error::CaptureError;
use crate::focus::{select_max, FocusMetric, LaplacianVariance, SharpnessScore};
use crate::ingest::FrameSource;
use crate::storage::{CaptureFile, CaptureStore};

pub use burst::{
    BurstLimits, BurstSampler, CaptureEvent, DEFAULT_MAX_ATTEMPTS, DEFAULT_SAMPLE_SPACING,
    DEFAULT_TARGET_SAMPLES,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use debounce::{DebounceGate, DEFAULT_DEBOUNCE};
pub use fps::FpsMeter;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Result of one frame cycle.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// Target not present this cycle.
    Idle,
    /// Target present, but the last capture is too recent.
    CoolingDown,
    /// Burst finished without a single frame still showing the target.
    SkippedNoValidFrames { attempts: u32 },
    /// Best candidate did not clear the sharpness threshold.
    SkippedNotSharp {
        best: SharpnessScore,
        candidates: usize,
    },
    /// Best candidate cleared the threshold but could not be written.
    PersistFailed {
        score: SharpnessScore,
        error: CaptureError,
    },
    Saved {
        file: CaptureFile,
        score: SharpnessScore,
        candidates: usize,
        attempts: u32,
    },
}

/// Running totals for health logging.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub cycles: u64,
    pub bursts: u64,
    pub saved: u64,
    pub skipped_no_frames: u64,
    pub skipped_not_sharp: u64,
    pub persist_failures: u64,
}

pub struct CapturePipeline {
    source: Box<dyn FrameSource>,
    store: Box<dyn CaptureStore>,
    metric: Box<dyn FocusMetric>,
    clock: Box<dyn Clock>,
    matcher: TargetMatcher,
    gate: DebounceGate,
    sampler: BurstSampler,
    threshold: f64,
    fps: FpsMeter,
    stats: CaptureStats,
}

impl CapturePipeline {
    pub fn new(
        config: &CaptureConfig,
        source: Box<dyn FrameSource>,
        store: Box<dyn CaptureStore>,
    ) -> Self {
        let matcher = TargetMatcher::new(&config.target_label);
        let limits = BurstLimits {
            max_attempts: config.max_attempts,
            target_samples: config.target_samples,
            spacing: config.sample_spacing,
        };
        Self {
            source,
            store,
            metric: Box::new(LaplacianVariance),
            clock: Box::new(SystemClock),
            sampler: BurstSampler::new(limits, matcher.clone()),
            matcher,
            gate: DebounceGate::new(config.debounce),
            threshold: config.sharpness_threshold,
            fps: FpsMeter::new(),
            stats: CaptureStats::default(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_metric(mut self, metric: impl FocusMetric + 'static) -> Self {
        self.metric = Box::new(metric);
        self
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn gate(&self) -> &DebounceGate {
        &self.gate
    }

    pub fn fps(&self) -> f64 {
        self.fps.fps()
    }

    /// Pull one cycle and, if it triggers, run the full burst/score/save sequence.
    ///
    /// Only source failures are returned as errors; everything else is an outcome.
    pub fn run_cycle(&mut self) -> Result<CaptureOutcome, CaptureError> {
        let cycle = self.source.next_cycle()?;
        let now = self.clock.now();
        self.stats.cycles += 1;
        self.fps.tick(now);

        let present = self.matcher.is_present(&cycle.objects);
        if !present {
            return Ok(CaptureOutcome::Idle);
        }
        if !self.gate.should_open(present, now) {
            return Ok(CaptureOutcome::CoolingDown);
        }
        // The triggering cycle only opens the event; candidates come from fresh pulls.
        drop(cycle);

        let limits = self.sampler.limits();
        log::info!(
            "{} detected; capturing up to {} valid frames for focus check",
            self.matcher.label(),
            limits.target_samples
        );
        self.stats.bursts += 1;
        let event = self
            .sampler
            .sample(self.source.as_mut(), self.clock.as_ref())?;

        if event.candidates.is_empty() {
            self.stats.skipped_no_frames += 1;
            log::info!(
                "skipped: no valid {} frames in {} attempts",
                self.matcher.label(),
                event.attempts
            );
            return Ok(CaptureOutcome::SkippedNoValidFrames {
                attempts: event.attempts,
            });
        }

        let scores: Vec<f64> = event
            .candidates
            .iter()
            .map(|image| self.metric.score(image))
            .collect();
        for (i, score) in scores.iter().enumerate() {
            log::debug!(
                "candidate {} {}={:.1}",
                i + 1,
                self.metric.name(),
                score
            );
        }
        let Some(pick) = select_max(&scores) else {
            return Ok(CaptureOutcome::SkippedNoValidFrames {
                attempts: event.attempts,
            });
        };
        let best = SharpnessScore::new(pick.score, self.threshold);
        let candidates = event.candidates.len();

        if !best.passes() {
            self.stats.skipped_not_sharp += 1;
            log::info!(
                "skipped: no sharp frame found (best={:.1}, threshold={:.1}, candidates={})",
                best.value,
                best.threshold,
                candidates
            );
            return Ok(CaptureOutcome::SkippedNotSharp { best, candidates });
        }

        let image = &event.candidates[pick.index];
        match self.store.persist(image, self.clock.local_now()) {
            Ok(file) => {
                self.gate.record_capture(self.clock.now());
                self.stats.saved += 1;
                log::info!(
                    "saved sharpest frame ({}={:.1}, {}/{} candidates) as {}",
                    self.metric.name(),
                    best.value,
                    pick.index + 1,
                    candidates,
                    file.name
                );
                Ok(CaptureOutcome::Saved {
                    file,
                    score: best,
                    candidates,
                    attempts: event.attempts,
                })
            }
            Err(error) => {
                self.stats.persist_failures += 1;
                log::warn!(
                    "dropping capture (score={:.1}): {}",
                    best.value,
                    error
                );
                Ok(CaptureOutcome::PersistFailed { score: best, error })
            }
        }
    }

    /// Run cycles until `stop` is set or the source fails.
    pub fn run_until(&mut self, stop: &AtomicBool) -> Result<(), CaptureError> {
        let mut last_health_log = self.clock.now();
        log::info!(
            "capture running: source={} target={} debounce={:?} threshold={:.1}",
            self.source.describe(),
            self.matcher.label(),
            self.gate.interval(),
            self.threshold
        );
        while !stop.load(Ordering::Relaxed) {
            self.run_cycle()?;

            let now = self.clock.now();
            if now.saturating_duration_since(last_health_log) >= HEALTH_LOG_INTERVAL {
                log::info!(
                    "source={} frames={} fps={:.1} saved={} skipped(no_frames={}, not_sharp={}) persist_failures={}",
                    self.source.describe(),
                    self.source.frames_delivered(),
                    self.fps.fps(),
                    self.stats.saved,
                    self.stats.skipped_no_frames,
                    self.stats.skipped_not_sharp,
                    self.stats.persist_failures
                );
                last_health_log = now;
            }
        }
        log::info!("capture stopped after {} cycles", self.stats.cycles);
        Ok(())
    }
}
