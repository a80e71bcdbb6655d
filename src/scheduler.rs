//! Timer Scheduler
//!
//! Owns the logical clock and the queue of pending timer callbacks.
//! Callbacks are handed back to the engine one timeslice at a time so they
//! run without the scheduler borrowed.

use crate::cell::Time;
use crate::pq::{TimerId, TimerQueue};
use std::time::Instant;

/// Scheduler execution mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerMode {
    /// Logical time follows the wall clock, scaled by the rate.
    Realtime,
    /// Logical time only moves when the engine steps it.
    Offline,
}

/// A timer callback.
pub type TimerCallback = Box<dyn FnOnce()>;

/// The timer scheduler.
pub struct TimerScheduler {
    pub mode: SchedulerMode,

    /// Time dilation anchors (realtime only).
    rate: f64,
    wall_anchor: Instant,
    logical_anchor: Time,

    /// Offline clock.
    pub offline_now: Time,

    timers: TimerQueue<TimerCallback>,
}

impl TimerScheduler {
    /// Create a scheduler whose clock starts at `start_time`.
    pub fn new(mode: SchedulerMode, start_time: Time) -> Self {
        Self {
            mode,
            rate: 1.0,
            wall_anchor: Instant::now(),
            logical_anchor: start_time,
            offline_now: start_time,
            timers: TimerQueue::new(),
        }
    }

    /// Get the current logical time.
    pub fn now(&self) -> Time {
        match self.mode {
            SchedulerMode::Offline => self.offline_now,
            SchedulerMode::Realtime => {
                let dt = self.wall_anchor.elapsed().as_secs_f64();
                self.logical_anchor + dt * self.rate
            }
        }
    }

    /// Set the time dilation rate (realtime only).
    pub fn set_rate(&mut self, rate: f64) {
        if self.mode == SchedulerMode::Offline {
            return;
        }
        let r = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        self.logical_anchor = self.now();
        self.wall_anchor = Instant::now();
        self.rate = r;
    }

    /// Get the current rate.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Run `callback` once logical time reaches `deadline`.
    pub fn schedule_at(&mut self, deadline: Time, callback: TimerCallback) -> TimerId {
        self.timers.push(deadline, callback)
    }

    /// Run `callback` after `delay` units of logical time.
    /// Negative or non-finite delays are treated as zero.
    pub fn schedule_after(&mut self, delay: Time, callback: TimerCallback) -> TimerId {
        let delay = if delay.is_finite() && delay > 0.0 { delay } else { 0.0 };
        let deadline = self.now() + delay;
        self.schedule_at(deadline, callback)
    }

    /// Cancel a timer. Returns whether it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.timers.cancel(id).is_some()
    }

    /// The deadline of the next pending timer.
    pub fn peek_next_event_time(&mut self) -> Option<Time> {
        self.timers.peek_deadline()
    }

    /// Take every callback due at the next deadline, in scheduling order.
    /// In offline mode the clock is moved to that deadline first.
    pub fn take_next_timeslice(&mut self) -> Option<(Time, Vec<TimerCallback>)> {
        let t = self.timers.peek_deadline()?;
        if self.mode == SchedulerMode::Offline {
            self.offline_now = self.offline_now.max(t);
        }
        let batch = self.timers.pop_at(t).into_iter().map(|(_, cb)| cb).collect();
        Some((t, batch))
    }

    /// Check if there are any pending timers.
    pub fn has_pending_timers(&self) -> bool {
        !self.timers.is_empty()
    }

    /// Number of timers still pending.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}
