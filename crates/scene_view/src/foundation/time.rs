//! Frame and redraw timing
//!
//! The host event loop owns the clock. Both timers take the current
//! `Instant` as an argument so the viewer never samples time mid-frame.

use std::time::{Duration, Instant};

/// Default redraw cadence of the viewer
pub const DEFAULT_REDRAW_HZ: f32 = 20.0;

/// Slowest accepted redraw cadence
pub const MIN_REDRAW_HZ: f32 = 0.01;

/// Frame statistics accumulated over rendered frames
#[derive(Debug, Clone)]
pub struct FrameTimer {
    last_frame: Option<Instant>,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            last_frame: None,
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Record a rendered frame at `now`
    pub fn record_frame(&mut self, now: Instant) {
        if let Some(last) = self.last_frame {
            self.delta_time = now.saturating_duration_since(last).as_secs_f32();
            self.total_time += self.delta_time;
        }
        self.last_frame = Some(now);
        self.frame_count += 1;
    }

    /// Time between the two most recent frames in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Number of frames recorded
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average FPS since the first recorded frame
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            (self.frame_count.saturating_sub(1)) as f32 / self.total_time
        } else {
            0.0
        }
    }
}

/// Fixed-cadence redraw trigger
///
/// The host polls [`RedrawTimer::poll`] from its periodic tick; a redraw is
/// due once per period. Missed periods are not queued up.
#[derive(Debug, Clone)]
pub struct RedrawTimer {
    period: Duration,
    last_redraw: Option<Instant>,
}

impl RedrawTimer {
    /// Create a timer firing `hz` times per second
    ///
    /// Rates that are not finite or below [`MIN_REDRAW_HZ`] fall back to
    /// [`DEFAULT_REDRAW_HZ`].
    pub fn from_hz(hz: f32) -> Self {
        let hz = if hz.is_finite() && hz >= MIN_REDRAW_HZ {
            hz
        } else {
            log::warn!("redraw rate {hz} Hz out of range, using {DEFAULT_REDRAW_HZ} Hz");
            DEFAULT_REDRAW_HZ
        };
        // Whole nanoseconds so 20 Hz is exactly 50 ms
        let nanos = (1e9 / f64::from(hz)).round() as u64;
        Self {
            period: Duration::from_nanos(nanos.max(1)),
            last_redraw: None,
        }
    }

    /// Redraw period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Returns true (and re-arms) when a redraw is due at `now`
    pub fn poll(&mut self, now: Instant) -> bool {
        let due = match self.last_redraw {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        };
        if due {
            self.last_redraw = Some(now);
        }
        due
    }
}

impl Default for RedrawTimer {
    fn default() -> Self {
        Self::from_hz(DEFAULT_REDRAW_HZ)
    }
}
