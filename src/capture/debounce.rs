use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(10);

/// Cool-down between successful captures.
///
/// The gate opens when the target is present and more than `interval` has
/// passed since the last *saved* capture. Opening does not touch the timer;
/// only `record_capture` does.
#[derive(Clone, Debug)]
pub struct DebounceGate {
    interval: Duration,
    last_capture: Option<Instant>,
}

impl DebounceGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_capture: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_capture(&self) -> Option<Instant> {
        self.last_capture
    }

    /// True once the cool-down since the last capture has elapsed.
    pub fn is_elapsed(&self, now: Instant) -> bool {
        match self.last_capture {
            Some(last) => now.saturating_duration_since(last) > self.interval,
            None => true,
        }
    }

    pub fn should_open(&self, target_present: bool, now: Instant) -> bool {
        target_present && self.is_elapsed(now)
    }

    pub fn record_capture(&mut self, at: Instant) {
        self.last_capture = Some(at);
    }
}

impl Default for DebounceGate {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_detection_always_opens() {
        let gate = DebounceGate::default();
        assert!(gate.should_open(true, Instant::now()));
        assert!(!gate.should_open(false, Instant::now()));
    }

    #[test]
    fn opens_only_strictly_after_interval() {
        let mut gate = DebounceGate::new(Duration::from_secs(10));
        let t0 = Instant::now();
        gate.record_capture(t0);

        assert!(!gate.should_open(true, t0 + Duration::from_secs(5)));
        assert!(!gate.should_open(true, t0 + Duration::from_secs(10)));
        assert!(gate.should_open(true, t0 + Duration::from_millis(10_001)));
        assert!(!gate.should_open(false, t0 + Duration::from_secs(60)));
    }

    #[test]
    fn opening_does_not_reset_the_timer() {
        let mut gate = DebounceGate::new(Duration::from_secs(10));
        let t0 = Instant::now();
        gate.record_capture(t0);
        let later = t0 + Duration::from_secs(11);
        assert!(gate.should_open(true, later));
        // A failed burst never calls record_capture, so the gate stays open.
        assert!(gate.should_open(true, later + Duration::from_millis(1)));
        assert_eq!(gate.last_capture(), Some(t0));
    }
}
