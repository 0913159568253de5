use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Frame-rate estimate refreshed roughly once per second of arrivals.
#[derive(Clone, Debug, Default)]
pub struct FpsMeter {
    window_start: Option<Instant>,
    frames: u32,
    fps: f64,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one frame arriving at `now` and return the current estimate.
    pub fn tick(&mut self, now: Instant) -> f64 {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed > WINDOW {
            self.fps = self.frames as f64 / elapsed.as_secs_f64();
            self.frames = 0;
            self.window_start = Some(now);
        }
        self.fps
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}
