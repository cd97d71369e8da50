// Simulation-clock timers.
//
// All timers read the sim clock (seconds since sim start, advanced by the
// fixed tick interval) rather than wall time, so the same command stream
// always produces the same timer expirations.
//
// - `CountdownTimer`: started with a duration, elapses once `now` passes the
//   deadline. An invalidated timer is never elapsed.
// - `IntervalTimer`: measures time since it was last started.
//
// See also: `locomotion.rs` (physics-prop ignore window, stuck monitor),
// `path.rs` (path age).

use serde::{Deserialize, Serialize};

/// One-shot countdown against the sim clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CountdownTimer {
    deadline: Option<f32>,
    duration: f32,
}

impl CountdownTimer {
    pub fn start(&mut self, now: f32, duration: f32) {
        self.deadline = Some(now + duration);
        self.duration = duration;
    }

    pub fn invalidate(&mut self) {
        self.deadline = None;
    }

    pub fn has_started(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_elapsed(&self, now: f32) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    /// Time left before the deadline; zero once elapsed or when not started.
    pub fn remaining(&self, now: f32) -> f32 {
        self.deadline.map_or(0.0, |d| (d - now).max(0.0))
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }
}

/// Elapsed-time stopwatch against the sim clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalTimer {
    started_at: Option<f32>,
}

impl IntervalTimer {
    pub fn start(&mut self, now: f32) {
        self.started_at = Some(now);
    }

    pub fn invalidate(&mut self) {
        self.started_at = None;
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Seconds since `start`, or zero if never started.
    pub fn elapsed(&self, now: f32) -> f32 {
        self.started_at.map_or(0.0, |t| (now - t).max(0.0))
    }
}
