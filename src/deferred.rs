//! Deferred - unstarted work producing one timed reaction
//!
//! A `Deferred<T>` holds a run function. Running it starts the work and
//! returns a [`Kill`]; the work later reacts exactly once with `(time, value)`
//! unless it is killed first. Construction never starts anything, and every
//! run is an independent execution with its own kill and result.
//!
//! Callback-style operations enter through [`Deferred::lift`]: the starter
//! receives a [`Completion`] and returns the kill for its own work.

use crate::cell::{Time, TimedCell};
use crate::error::{Error, Result};
use crate::kill::Kill;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Caller-supplied monotonic clock.
pub type Clock = Rc<dyn Fn() -> Time>;

/// The single callback an execution reacts with.
pub type Reaction<T> = Box<dyn FnOnce(Time, T)>;

type RunFn<T> = dyn Fn(&Clock, Reaction<T>) -> Kill;

/// A composable unit of work whose result arrives at a logical time.
pub struct Deferred<T> {
    run: Option<Rc<RunFn<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            run: self.run.clone(),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.run {
            None => f.write_str("Deferred::Never"),
            Some(_) => f.write_str("Deferred { .. }"),
        }
    }
}

/// A started execution: its kill and the cell its result lands in.
#[derive(Debug)]
pub struct Execution<T> {
    pub kill: Kill,
    pub result: TimedCell<T>,
}

impl<T> Deferred<T> {
    /// The work that never completes. Running it does nothing.
    pub fn never() -> Self {
        Self { run: None }
    }

    /// Whether this is the never task.
    pub fn is_never(&self) -> bool {
        self.run.is_none()
    }

    /// A task from its raw run function. The function must react at most
    /// once and return a kill that stops whatever it started.
    pub fn from_run(run: impl Fn(&Clock, Reaction<T>) -> Kill + 'static) -> Self {
        Self {
            run: Some(Rc::new(run)),
        }
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// A task whose value is already known. It reacts with `(now(), value)`
    /// before returning, and its kill is a no-op.
    pub fn known(value: T) -> Self {
        Self::from_run(move |clock, reaction| {
            reaction(clock(), value.clone());
            Kill::noop()
        })
    }

    /// Lift a callback-style operation.
    ///
    /// `starter` begins the work, hands the [`Completion`] to whatever will
    /// finish it, and returns the kill for that work. The completion records
    /// `now()` at the moment it is called.
    ///
    /// ```
    /// # use timed_tasks::{Deferred, Kill, run};
    /// let task = Deferred::lift(|complete| {
    ///     complete.complete("done");
    ///     Kill::noop()
    /// });
    /// let exec = run(&task, || 3.0);
    /// assert_eq!(exec.result.get(), Some((3.0, "done")));
    /// ```
    pub fn lift<S>(starter: S) -> Self
    where
        S: Fn(Completion<T>) -> Kill + 'static,
    {
        Self::from_run(move |clock, reaction| {
            let state = Rc::new(LiftState {
                clock: clock.clone(),
                reaction: RefCell::new(Some(reaction)),
                status: Cell::new(Status::Running),
            });
            let stop = starter(Completion {
                state: state.clone(),
            });
            Kill::with(LiftState::kill, (state, stop))
        })
    }

    /// Start the work, reacting through `reaction`.
    pub fn execute(&self, clock: &Clock, reaction: impl FnOnce(Time, T) + 'static) -> Kill {
        self.execute_boxed(clock, Box::new(reaction))
    }

    pub(crate) fn execute_boxed(&self, clock: &Clock, reaction: Reaction<T>) -> Kill {
        match &self.run {
            Some(run) => run(clock, reaction),
            None => Kill::noop(),
        }
    }

    /// Start the work, writing its result into a fresh cell.
    pub fn start(&self, clock: &Clock) -> Execution<T> {
        if self.is_never() {
            return Execution {
                kill: Kill::noop(),
                result: TimedCell::never(),
            };
        }
        let result = TimedCell::unwritten();
        let target = result.clone();
        let kill = self.execute(clock, move |time, value| target.resolve(time, value));
        Execution { kill, result }
    }
}

/// Run `deferred` against the clock `now`.
pub fn run<T, N>(deferred: &Deferred<T>, now: N) -> Execution<T>
where
    T: Clone + 'static,
    N: Fn() -> Time + 'static,
{
    let clock: Clock = Rc::new(now);
    deferred.start(&clock)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Running,
    Completed,
    Killed,
    /// Killed, and the one ignored completion has arrived.
    KilledCompleted,
}

struct LiftState<T> {
    clock: Clock,
    reaction: RefCell<Option<Reaction<T>>>,
    status: Cell<Status>,
}

impl<T> LiftState<T> {
    fn kill((state, stop): (Rc<Self>, Kill)) {
        if state.status.get() != Status::Running {
            return;
        }
        state.status.set(Status::Killed);
        state.reaction.borrow_mut().take();
        stop.kill();
    }
}

/// Completion callback handed to a `lift` starter.
pub struct Completion<T> {
    state: Rc<LiftState<T>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> Completion<T> {
    /// Whether the execution is still waiting for a value.
    pub fn is_pending(&self) -> bool {
        self.state.status.get() == Status::Running
    }

    /// Deliver the value, stamped with the current time.
    ///
    /// The first completion of a killed execution is ignored. Completing
    /// twice is [`Error::DoubleCompletion`], killed or not.
    pub fn try_complete(&self, value: T) -> Result<()> {
        match self.state.status.get() {
            Status::Killed => {
                self.state.status.set(Status::KilledCompleted);
                Ok(())
            }
            Status::Completed | Status::KilledCompleted => Err(Error::DoubleCompletion),
            Status::Running => {
                self.state.status.set(Status::Completed);
                let time = (self.state.clock)();
                let reaction = self.state.reaction.borrow_mut().take();
                if let Some(reaction) = reaction {
                    reaction(time, value);
                }
                Ok(())
            }
        }
    }

    /// Deliver the value. Panics on a second completion.
    pub fn complete(&self, value: T) {
        if let Err(err) = self.try_complete(value) {
            panic!("{err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{counting_stop, fixed_clock, init_test_logging, Recorder};

    #[test]
    fn test_known_reacts_with_now() {
        init_test_logging();
        let exec = run(&Deferred::known(5), || 10.0);
        assert_eq!(exec.result.get(), Some((10.0, 5)));
        assert!(exec.kill.is_noop());
    }

    #[test]
    fn test_never_does_nothing() {
        let exec = run(&Deferred::<i32>::never(), || 0.0);
        assert!(exec.result.is_never());
        assert!(exec.kill.is_noop());
    }

    #[test]
    fn test_lift_is_lazy_and_rerunnable() {
        let starts = Rc::new(Cell::new(0));
        let s = starts.clone();
        let task = Deferred::lift(move |complete| {
            s.set(s.get() + 1);
            complete.complete(s.get());
            Kill::noop()
        });
        assert_eq!(starts.get(), 0);

        let first = run(&task, || 1.0);
        let second = run(&task, || 2.0);
        assert_eq!(first.result.get(), Some((1.0, 1)));
        assert_eq!(second.result.get(), Some((2.0, 2)));
    }

    #[test]
    fn test_completion_time_is_captured_at_completion() {
        let now = Rc::new(Cell::new(0.0));
        let slot: Rc<RefCell<Option<Completion<&str>>>> = Rc::new(RefCell::new(None));

        let s = slot.clone();
        let task = Deferred::lift(move |complete| {
            *s.borrow_mut() = Some(complete);
            Kill::noop()
        });
        let n = now.clone();
        let exec = run(&task, move || n.get());

        now.set(42.0);
        slot.borrow().as_ref().unwrap().complete("late");
        assert_eq!(exec.result.get(), Some((42.0, "late")));
    }

    #[test]
    fn test_kill_before_completion() {
        let (stops, stop) = counting_stop();
        let task: Deferred<i32> = Deferred::lift(move |_complete| stop());
        let recorder = Recorder::new();

        let kill = task.execute(&fixed_clock(0.0), recorder.reaction());
        kill.kill();
        kill.kill();

        assert_eq!(stops.get(), 1);
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_completion_after_kill_is_suppressed() {
        let slot: Rc<RefCell<Option<Completion<i32>>>> = Rc::new(RefCell::new(None));
        let s = slot.clone();
        let task = Deferred::lift(move |complete| {
            *s.borrow_mut() = Some(complete);
            Kill::noop()
        });
        let recorder = Recorder::new();
        let kill = task.execute(&fixed_clock(0.0), recorder.reaction());

        kill.kill();
        let complete = slot.borrow().clone().unwrap();
        assert!(!complete.is_pending());
        assert_eq!(complete.try_complete(1), Ok(()));
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_double_completion_after_kill_is_an_error() {
        let slot: Rc<RefCell<Option<Completion<i32>>>> = Rc::new(RefCell::new(None));
        let s = slot.clone();
        let task = Deferred::lift(move |complete| {
            *s.borrow_mut() = Some(complete);
            Kill::noop()
        });
        let exec = run(&task, || 0.0);

        exec.kill.kill();
        let complete = slot.borrow().clone().unwrap();
        assert_eq!(complete.try_complete(1), Ok(()));
        assert_eq!(complete.try_complete(2), Err(Error::DoubleCompletion));
        assert!(!exec.result.is_written());
    }

    #[test]
    #[should_panic(expected = "completion callback invoked more than once")]
    fn test_complete_twice_after_kill_panics() {
        let slot: Rc<RefCell<Option<Completion<i32>>>> = Rc::new(RefCell::new(None));
        let s = slot.clone();
        let task = Deferred::lift(move |complete| {
            *s.borrow_mut() = Some(complete);
            Kill::noop()
        });
        let exec = run(&task, || 0.0);

        exec.kill.kill();
        let complete = slot.borrow().clone().unwrap();
        complete.complete(1);
        complete.complete(2);
    }

    #[test]
    fn test_kill_after_completion_does_not_stop() {
        let (stops, stop) = counting_stop();
        let task = Deferred::lift(move |complete| {
            complete.complete(1);
            stop()
        });
        let exec = run(&task, || 0.0);
        exec.kill.kill();

        assert_eq!(stops.get(), 0);
        assert_eq!(exec.result.value(), Some(1));
    }

    #[test]
    fn test_double_completion_is_an_error() {
        let task = Deferred::lift(|complete| {
            complete.complete(1);
            assert_eq!(complete.try_complete(2), Err(Error::DoubleCompletion));
            Kill::noop()
        });
        let exec = run(&task, || 0.0);
        assert_eq!(exec.result.value(), Some(1));
    }

    #[test]
    #[should_panic(expected = "completion callback invoked more than once")]
    fn test_double_completion_panics() {
        let task = Deferred::lift(|complete| {
            complete.complete(1);
            complete.complete(2);
            Kill::noop()
        });
        let _ = run(&task, || 0.0);
    }
}
