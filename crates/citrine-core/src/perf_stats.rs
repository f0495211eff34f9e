use std::time::{Duration, Instant};

use citrine_timing::BASE_CLOCK_RATE_ARM11;
use serde::Serialize;

/// Emulated ticks per displayed frame.
pub const FRAME_TICKS: u64 = 4_481_136;

/// Emulated screen refresh rate, in Hz (about 59.83).
pub const SCREEN_REFRESH_RATE: f64 = BASE_CLOCK_RATE_ARM11 as f64 / FRAME_TICKS as f64;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PerfResults {
    /// Emulated time elapsed per unit of host time (1.0 is full speed).
    pub emulation_speed: f64,
    /// Frames presented by the emulated program per host second.
    pub game_fps: f64,
    /// Frames completed by the emulated system per host second.
    pub system_fps: f64,
    /// Mean host time spent per system frame, in seconds.
    pub frametime: f64,
}

/// Host-side performance counters of a session.
///
/// Every `*_at` method takes the host instant explicitly; the plain variants use
/// [`Instant::now`].
#[derive(Debug, Clone)]
pub struct PerfStats {
    reset_point: Instant,
    reset_point_system_us: u64,
    frame_begin: Instant,
    previous_frame_end: Instant,
    previous_frame_length: Duration,
    accumulated_frametime: Duration,
    system_frames: u32,
    game_frames: u32,
}

impl PerfStats {
    pub fn new() -> Self {
        Self::new_at(Instant::now())
    }

    pub fn new_at(now: Instant) -> Self {
        Self {
            reset_point: now,
            reset_point_system_us: 0,
            frame_begin: now,
            previous_frame_end: now,
            previous_frame_length: Duration::ZERO,
            accumulated_frametime: Duration::ZERO,
            system_frames: 0,
            game_frames: 0,
        }
    }

    pub fn begin_system_frame(&mut self) {
        self.begin_system_frame_at(Instant::now());
    }

    pub fn begin_system_frame_at(&mut self, now: Instant) {
        self.frame_begin = now;
    }

    pub fn end_system_frame(&mut self) {
        self.end_system_frame_at(Instant::now());
    }

    pub fn end_system_frame_at(&mut self, now: Instant) {
        self.accumulated_frametime += now.saturating_duration_since(self.frame_begin);
        self.system_frames += 1;
        self.previous_frame_length = self
            .frame_begin
            .saturating_duration_since(self.previous_frame_end);
        self.previous_frame_end = now;
    }

    pub fn end_game_frame(&mut self) {
        self.game_frames += 1;
    }

    pub fn get_and_reset_stats(&mut self, system_time_us: u64) -> PerfResults {
        self.get_and_reset_stats_at(Instant::now(), system_time_us)
    }

    /// Computes the statistics accumulated since the previous reset and starts a new interval.
    ///
    /// `system_time_us` is the emulated global time; the emulation speed is the emulated time
    /// that elapsed during the interval divided by the host time that did.
    pub fn get_and_reset_stats_at(&mut self, now: Instant, system_time_us: u64) -> PerfResults {
        let interval = now.saturating_duration_since(self.reset_point).as_secs_f64();
        let system_us = system_time_us.saturating_sub(self.reset_point_system_us) as f64;

        let mut results = PerfResults::default();
        if interval > 0.0 {
            results.emulation_speed = system_us / interval / 1_000_000.0;
            results.system_fps = f64::from(self.system_frames) / interval;
            results.game_fps = f64::from(self.game_frames) / interval;
        }
        if self.system_frames > 0 {
            results.frametime =
                self.accumulated_frametime.as_secs_f64() / f64::from(self.system_frames);
        }

        self.reset_at(now, system_time_us);
        results
    }

    /// Starts a new measurement interval without computing anything.
    pub fn reset(&mut self, system_time_us: u64) {
        self.reset_at(Instant::now(), system_time_us);
    }

    pub fn reset_at(&mut self, now: Instant, system_time_us: u64) {
        self.reset_point = now;
        self.reset_point_system_us = system_time_us;
        self.accumulated_frametime = Duration::ZERO;
        self.system_frames = 0;
        self.game_frames = 0;
    }

    /// Length of the previous frame relative to the emulated frame period.
    pub fn last_frame_time_scale(&self) -> f64 {
        self.previous_frame_length.as_secs_f64() * SCREEN_REFRESH_RATE
    }
}

impl Default for PerfStats {
    fn default() -> Self {
        Self::new()
    }
}
