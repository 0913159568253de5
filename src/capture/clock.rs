use chrono::{DateTime, Local};
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Time source for the capture loop.
///
/// `now` drives debounce and pacing; `local_now` names capture files.
pub trait Clock {
    fn now(&self) -> Instant;

    fn local_now(&self) -> DateTime<Local>;

    fn sleep(&self, duration: Duration);
}

/// Wall clock + real sleeps.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn local_now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Manually driven clock. `sleep` advances time instead of blocking.
///
/// Clones share the same timeline, so a test can keep one handle and give the
/// other to the pipeline.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    local_origin: DateTime<Local>,
    elapsed: Rc<Cell<Duration>>,
    slept: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new(local_origin: DateTime<Local>) -> Self {
        Self {
            origin: Instant::now(),
            local_origin,
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
            slept: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    /// Total time spent in `sleep`.
    pub fn slept(&self) -> Duration {
        self.slept.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed.get()
    }

    fn local_now(&self) -> DateTime<Local> {
        let elapsed_ms = self.elapsed.get().as_millis() as i64;
        self.local_origin + chrono::Duration::milliseconds(elapsed_ms)
    }

    fn sleep(&self, duration: Duration) {
        self.slept.set(self.slept.get() + duration);
        self.advance(duration);
    }
}
