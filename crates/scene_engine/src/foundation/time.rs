//! Frame timing helpers used by the scene statistics and the demo loop

use std::time::{Duration, Instant};

/// Measures wall-clock sections such as a simulate or render call
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    /// Start measuring now
    pub fn start() -> Self {
        Self { started: Instant::now() }
    }

    /// Time elapsed since `start`
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Elapsed time in milliseconds
    pub fn elapsed_millis(&self) -> f32 {
        self.elapsed().as_secs_f32() * 1000.0
    }
}

/// Produces per-frame delta times, clamped so a stalled frame cannot
/// explode the simulation step
#[derive(Debug, Clone)]
pub struct FrameTimer {
    last_frame: Instant,
    max_delta: f32,
    total_time: f32,
    frame_count: u64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(0.25)
    }
}

impl FrameTimer {
    /// Create a timer whose deltas never exceed `max_delta` seconds
    pub fn new(max_delta: f32) -> Self {
        Self {
            last_frame: Instant::now(),
            max_delta,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Advance one frame and return the clamped delta in seconds
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame).as_secs_f32().min(self.max_delta);
        self.last_frame = now;
        self.total_time += delta;
        self.frame_count += 1;
        delta
    }

    /// Sum of all deltas returned so far
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Number of ticks
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
