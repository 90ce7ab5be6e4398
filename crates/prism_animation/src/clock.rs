//! Animation clocks
//!
//! A clock turns the host's frame time into the elapsed time of an animation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use prism_core::{Clock, ClockRef};

/// Clock whose elapsed time is set explicitly (tests, scrubbing, tooling)
#[derive(Debug, Default)]
pub struct ManualClock {
    elapsed_nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::Acquire))
    }

    /// Times past `u64::MAX` nanoseconds saturate
    pub fn set(&self, elapsed: Duration) {
        self.elapsed_nanos.store(saturating_nanos(elapsed), Ordering::Release);
    }

    pub fn advance(&self, delta: Duration) {
        let delta = saturating_nanos(delta);
        let _ = self
            .elapsed_nanos
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |nanos| {
                Some(nanos.saturating_add(delta))
            });
    }
}

fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

impl Clock for ManualClock {
    /// Ignores the frame time
    fn elapsed_time(&self, _now: Duration) -> Duration {
        self.elapsed()
    }
}

/// Clock measuring time since its storyboard began
///
/// The begin time latches on the first frame that reads the clock, unless it
/// was set up front with [`begin_at`](Self::begin_at).
#[derive(Debug)]
pub struct StoryboardClock {
    begin: Mutex<Option<Duration>>,
    speed_ratio: f32,
}

impl StoryboardClock {
    pub fn new() -> Self {
        Self {
            begin: Mutex::new(None),
            speed_ratio: 1.0,
        }
    }

    /// Scale elapsed time; non-finite values and values `<= 0` are treated as 1
    pub fn with_speed_ratio(mut self, ratio: f32) -> Self {
        self.speed_ratio = if ratio.is_finite() && ratio > 0.0 { ratio } else { 1.0 };
        self
    }

    pub fn into_ref(self) -> ClockRef {
        Arc::new(self)
    }

    /// Fix the begin time
    pub fn begin_at(&self, time: Duration) {
        *self.begin.lock().unwrap() = Some(time);
    }

    /// Forget the begin time; the next frame starts the storyboard over
    pub fn restart(&self) {
        *self.begin.lock().unwrap() = None;
    }

    pub fn begin_time(&self) -> Option<Duration> {
        *self.begin.lock().unwrap()
    }
}

impl Default for StoryboardClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StoryboardClock {
    fn elapsed_time(&self, now: Duration) -> Duration {
        let begin = *self.begin.lock().unwrap().get_or_insert(now);
        let elapsed = now.saturating_sub(begin);
        if self.speed_ratio == 1.0 {
            elapsed
        } else {
            Duration::try_from_secs_f64(elapsed.as_secs_f64() * f64::from(self.speed_ratio))
                .unwrap_or(Duration::MAX)
        }
    }
}
