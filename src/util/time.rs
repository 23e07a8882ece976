//! Time utilities for the simulation loop

use std::time::{Duration, Instant};

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default tick rate
pub const SIMULATION_TPS: u32 = 60;

/// Wall-clock duration of one tick at `tick_rate`
pub fn tick_duration(tick_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / tick_rate.max(1) as u64)
}

/// Calculate delta time for physics (in seconds)
pub fn tick_delta(tick_rate: u32) -> f32 {
    1.0 / tick_rate.max(1) as f32
}

/// Monotonic stopwatch measuring real frame time between ticks
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous call, capped so a stalled task cannot
    /// hand the simulation one enormous step
    pub fn delta(&mut self, cap: f32) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        dt.min(cap)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
