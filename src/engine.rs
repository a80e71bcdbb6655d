//! Engine - a timer host for deferred tasks
//!
//! The engine supplies the clock that executions read and lifts timers into
//! [`Deferred`] values. Timer callbacks run one timeslice at a time, with
//! the scheduler released, so they may freely start or kill other timers.
//! - Realtime: logical time follows the wall clock; waits use spin_sleep
//! - Offline: logical time only moves through the stepping API

use crate::cell::Time;
use crate::deferred::{Clock, Deferred, Execution};
use crate::kill::Kill;
use crate::pq::TimerId;
use crate::scheduler::TimerScheduler;
use spin_sleep::SpinSleeper;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

pub use crate::scheduler::SchedulerMode;

fn cancel_timer(scheduler: Weak<RefCell<TimerScheduler>>, id: TimerId) -> Kill {
    Kill::with(
        move |id| {
            if let Some(scheduler) = scheduler.upgrade() {
                scheduler.borrow_mut().cancel(id);
            }
        },
        id,
    )
}

/// Configuration for launching the engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Logical seconds per wall second (realtime only).
    pub rate: f64,
    /// Initial logical time.
    pub start_time: Time,
    /// Upper bound on timeslices processed by one `advance_to` call.
    pub max_timeslices: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            start_time: 0.0,
            max_timeslices: 200_000,
        }
    }
}

/// The timer engine.
pub struct Engine {
    pub scheduler: Rc<RefCell<TimerScheduler>>,
    sleeper: SpinSleeper,
    max_timeslices: usize,
}

impl Engine {
    /// Create a new engine with the given mode and configuration.
    pub fn new(mode: SchedulerMode, config: EngineConfig) -> Self {
        let scheduler = Rc::new(RefCell::new(TimerScheduler::new(mode, config.start_time)));
        if mode == SchedulerMode::Realtime {
            scheduler.borrow_mut().set_rate(config.rate);
        }

        Self {
            scheduler,
            sleeper: SpinSleeper::default(),
            max_timeslices: config.max_timeslices,
        }
    }

    /// Create an offline engine with the default configuration.
    pub fn offline() -> Self {
        Self::new(SchedulerMode::Offline, EngineConfig::default())
    }

    /// The current logical time.
    pub fn now(&self) -> Time {
        self.scheduler.borrow().now()
    }

    /// A clock reading this engine's logical time.
    pub fn clock(&self) -> Clock {
        let scheduler = self.scheduler.clone();
        Rc::new(move || scheduler.borrow().now())
    }

    /// Run `callback` after `delay` units of logical time.
    pub fn schedule_after(&self, delay: Time, callback: impl FnOnce() + 'static) -> TimerId {
        self.scheduler.borrow_mut().schedule_after(delay, Box::new(callback))
    }

    /// Cancel a pending timer. Returns whether it was still pending.
    pub fn cancel(&self, id: TimerId) -> bool {
        self.scheduler.borrow_mut().cancel(id)
    }

    /// A kill that cancels timer `id` if it is still pending.
    pub fn cancel_kill(&self, id: TimerId) -> Kill {
        cancel_timer(Rc::downgrade(&self.scheduler), id)
    }

    /// A task that completes with `value` after `delay` units of logical
    /// time, measured from when it is run. Killing it cancels the timer.
    pub fn delay<T: Clone + 'static>(&self, delay: Time, value: T) -> Deferred<T> {
        let scheduler = Rc::downgrade(&self.scheduler);
        Deferred::lift(move |complete| {
            let Some(sched) = scheduler.upgrade() else {
                return Kill::noop();
            };
            let value = value.clone();
            let id = sched
                .borrow_mut()
                .schedule_after(delay, Box::new(move || complete.complete(value)));
            cancel_timer(Rc::downgrade(&sched), id)
        })
    }

    /// Start `deferred` against this engine's clock.
    pub fn execute<T: Clone + 'static>(&self, deferred: &Deferred<T>) -> Execution<T> {
        deferred.start(&self.clock())
    }

    /// Whether any timers are still pending.
    pub fn has_pending_timers(&self) -> bool {
        self.scheduler.borrow().has_pending_timers()
    }

    /// Number of timers still pending.
    pub fn pending_timers(&self) -> usize {
        self.scheduler.borrow().pending_timers()
    }

    /// Fire the next timeslice. Returns its time, or `None` when idle.
    fn fire_next_timeslice(&self) -> Option<Time> {
        let (t, batch) = self.scheduler.borrow_mut().take_next_timeslice()?;
        tracing::debug!(time = t, timers = batch.len(), "timeslice");
        for callback in batch {
            callback();
        }
        Some(t)
    }

    /// Advance offline time to `target`, firing every timer due on the way.
    pub fn advance_to(&mut self, target: Time) {
        let mut processed = 0;
        loop {
            let next = self.scheduler.borrow_mut().peek_next_event_time();
            match next {
                Some(next_t) if next_t <= target => {}
                _ => break,
            }
            self.fire_next_timeslice();

            processed += 1;
            if processed > self.max_timeslices {
                panic!(
                    "advance_to({}) exceeded {} timeslices - likely infinite scheduling",
                    target, self.max_timeslices
                );
            }
        }

        let mut sched = self.scheduler.borrow_mut();
        if sched.mode == SchedulerMode::Offline {
            sched.offline_now = sched.offline_now.max(target);
        }
    }

    /// Step offline time forward by `dt`.
    pub fn step_sec(&mut self, dt: Time) {
        let s = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        let target = self.now() + s;
        self.advance_to(target);
    }

    /// Fire timers until none are pending. Offline, time jumps straight to
    /// each deadline; realtime, the engine sleeps until it is due.
    pub fn run_until_idle(&mut self) {
        self.run_until(|| false);
    }

    /// Fire timers until `is_done` returns true or no timers remain.
    pub fn run_until<F>(&mut self, is_done: F)
    where
        F: Fn() -> bool,
    {
        loop {
            if is_done() {
                break;
            }

            let next = self.scheduler.borrow_mut().peek_next_event_time();
            let Some(next_t) = next else {
                break;
            };

            let (mode, now, rate) = {
                let sched = self.scheduler.borrow();
                (sched.mode, sched.now(), sched.rate())
            };
            if mode == SchedulerMode::Offline || next_t <= now {
                self.fire_next_timeslice();
                continue;
            }

            // Sleep until due
            let dt_wall = ((next_t - now) / rate).max(0.0);
            self.sleeper.sleep(Duration::from_secs_f64(dt_wall));
        }
    }
}
