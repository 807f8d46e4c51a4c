//! Fixed-step timers driven by accumulated elapsed time.
//!
//! The server loop wakes at a coarse interval and feeds the real elapsed
//! time in here; each timer then reports how many of its periods became due.
//! Leftover time carries over, so the average rate stays exact even when the
//! loop itself jitters.

use crate::config::ServerConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FixedStep {
    period: Duration,
    accumulated: Duration,
}

impl FixedStep {
    /// A zero `period` disables the timer.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            accumulated: Duration::ZERO,
        }
    }

    /// Adds `dt` and returns how many whole periods elapsed.
    pub fn advance(&mut self, dt: Duration) -> u32 {
        if self.period.is_zero() {
            return 0;
        }

        self.accumulated += dt;
        let mut steps = 0;
        while self.accumulated >= self.period {
            self.accumulated -= self.period;
            steps += 1;
        }
        steps
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
    }
}

/// Work made due by one call to [`TickScheduler::advance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduledWork {
    pub frames: u32,
    pub ticks: u32,
    pub danger_ticks: u32,
}

#[derive(Debug, Clone)]
pub struct TickScheduler {
    frame: FixedStep,
    tick: FixedStep,
    danger: FixedStep,
}

impl TickScheduler {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            frame: FixedStep::new(config.frame_period),
            tick: FixedStep::new(config.tick_period),
            danger: FixedStep::new(config.danger_period),
        }
    }

    /// Advances every timer by `dt`. The danger timer only runs while
    /// `hazards_active`; time spent in the lobby never counts towards it.
    pub fn advance(&mut self, dt: Duration, hazards_active: bool) -> ScheduledWork {
        let danger_ticks = if hazards_active {
            self.danger.advance(dt)
        } else {
            self.danger.reset();
            0
        };

        ScheduledWork {
            // Frames have no server-side work yet, they are only counted
            frames: self.frame.advance(dt),
            ticks: self.tick.advance(dt),
            danger_ticks,
        }
    }
}
