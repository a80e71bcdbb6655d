//! Task algebra
//!
//! Combinators over [`Deferred`] execution. They mirror the cell algebra but
//! describe work that has not started yet: every combinator is a pure
//! constructor, and running the result runs each sub-task once.
//!
//! Cancellation is built alongside composition. `map` and `extend` pass the
//! child's kill through; `lift2`, `ap`, `concat` and `race` kill both
//! branches; `chain` kills whichever stage is live.
//!
//! `Deferred::never()` is absorbing for every combinator here except `race`,
//! where it is the identity.

use crate::algebra::{self, prefer_left, Pick};
use crate::cell::Time;
use crate::deferred::{Deferred, Reaction};
use crate::kill::Kill;
use crate::semigroup::Semigroup;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A task whose value is already known.
pub fn of<T: Clone + 'static>(value: T) -> Deferred<T> {
    Deferred::known(value)
}

/// Map the eventual value of `task`.
pub fn map<T, U, F>(f: F, task: &Deferred<T>) -> Deferred<U>
where
    T: Clone + 'static,
    U: Clone + 'static,
    F: Fn(T) -> U + 'static,
{
    if task.is_never() {
        return Deferred::never();
    }
    let task = task.clone();
    let f = Rc::new(f);
    Deferred::from_run(move |clock, reaction| {
        let f = f.clone();
        task.execute(clock, move |time, value| reaction(time, f(value)))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    First,
    Second,
    Done,
    Killed,
}

/// Per-execution state of a `chain`.
struct Sequence<U> {
    stage: Cell<Stage>,
    reaction: RefCell<Option<Reaction<U>>>,
    next_kill: RefCell<Kill>,
}

impl<U> Sequence<U> {
    fn finish(&self, time: Time, value: U) {
        if self.stage.get() != Stage::Second {
            return;
        }
        self.stage.set(Stage::Done);
        let reaction = self.reaction.borrow_mut().take();
        if let Some(reaction) = reaction {
            reaction(time, value);
        }
    }

    fn kill(sequence: Rc<Self>) {
        match sequence.stage.get() {
            Stage::Done | Stage::Killed => {}
            stage => {
                tracing::debug!(?stage, "chain killed");
                sequence.stage.set(Stage::Killed);
                sequence.reaction.borrow_mut().take();
                let next = std::mem::take(&mut *sequence.next_kill.borrow_mut());
                next.kill();
            }
        }
    }
}

/// Run `task`, then the task `f` builds from its value.
///
/// The result time is the later of the two stages' times. Killing before the
/// first stage reacts stops it and guarantees the continuation never starts;
/// killing afterwards stops the continuation.
pub fn chain<T, U, F>(f: F, task: &Deferred<T>) -> Deferred<U>
where
    T: Clone + 'static,
    U: Clone + 'static,
    F: Fn(T) -> Deferred<U> + 'static,
{
    if task.is_never() {
        return Deferred::never();
    }
    let task = task.clone();
    let f = Rc::new(f);
    Deferred::from_run(move |clock, reaction| {
        let sequence = Rc::new(Sequence {
            stage: Cell::new(Stage::First),
            reaction: RefCell::new(Some(reaction)),
            next_kill: RefCell::new(Kill::noop()),
        });

        let f = f.clone();
        let seq = sequence.clone();
        let next_clock = clock.clone();
        let first = task.execute(clock, move |first_time, value| {
            if seq.stage.get() != Stage::First {
                return;
            }
            seq.stage.set(Stage::Second);
            tracing::debug!(time = first_time, "chain continuing");

            let done = seq.clone();
            let kill = f(value).execute(&next_clock, move |time, value| {
                done.finish(first_time.max(time), value)
            });
            if seq.stage.get() == Stage::Killed {
                // Killed from inside the continuation's own start.
                kill.kill();
            } else {
                *seq.next_kill.borrow_mut() = kill;
            }
        });

        Kill::both(first, Kill::with(Sequence::kill, sequence))
    })
}

/// Run both tasks concurrently and combine their values once both react.
///
/// The result time is the later of the two; the kill stops both branches.
pub fn lift2<A, B, C, F>(f: F, a: &Deferred<A>, b: &Deferred<B>) -> Deferred<C>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
    F: Fn(A, B) -> C + 'static,
{
    if a.is_never() || b.is_never() {
        return Deferred::never();
    }
    let (a, b) = (a.clone(), b.clone());
    let f = Rc::new(f);
    Deferred::from_run(move |clock, reaction| {
        let left = a.start(clock);
        let right = b.start(clock);
        let f = f.clone();
        algebra::join2(move |x, y| f(x, y), &left.result, &right.result).when_ready(reaction);
        Kill::both(left.kill, right.kill)
    })
}

/// Apply the function produced by `tf` to the value produced by `task`.
pub fn ap<A, B, F>(tf: &Deferred<F>, task: &Deferred<A>) -> Deferred<B>
where
    A: Clone + 'static,
    B: Clone + 'static,
    F: Fn(A) -> B + Clone + 'static,
{
    lift2(|f: F, a| f(a), tf, task)
}

/// Combine two tasks' values with their own associative combination.
pub fn concat<T>(a: &Deferred<T>, b: &Deferred<T>) -> Deferred<T>
where
    T: Semigroup + Clone + 'static,
{
    lift2(T::concat, a, b)
}

/// Run both tasks; the earlier reaction wins and the other task is killed.
///
/// On exactly equal times `a` wins. Killing before either reacts kills both.
pub fn race<T: Clone + 'static>(a: &Deferred<T>, b: &Deferred<T>) -> Deferred<T> {
    if a.is_never() {
        return b.clone();
    }
    if b.is_never() {
        return a.clone();
    }
    let (a, b) = (a.clone(), b.clone());
    Deferred::from_run(move |clock, reaction| {
        let left = a.start(clock);
        let right = b.start(clock);
        let (left_kill, right_kill) = (left.kill.clone(), right.kill.clone());

        algebra::select(prefer_left, &left.result, &right.result).when_ready(
            move |time, (pick, value)| {
                tracing::debug!(?pick, time, "race decided");
                match pick {
                    Pick::Left => right_kill.kill(),
                    Pick::Right => left_kill.kill(),
                }
                reaction(time, value);
            },
        );
        Kill::both(left.kill, right.kill)
    })
}

/// Run `task`, then hand `f` a task equivalent to the completed one.
pub fn extend<T, U, F>(f: F, task: &Deferred<T>) -> Deferred<U>
where
    T: Clone + 'static,
    U: Clone + 'static,
    F: Fn(Deferred<T>) -> U + 'static,
{
    if task.is_never() {
        return Deferred::never();
    }
    let task = task.clone();
    let f = Rc::new(f);
    Deferred::from_run(move |clock, reaction| {
        let f = f.clone();
        task.execute(clock, move |time, value| reaction(time, f(Deferred::known(value))))
    })
}

impl<T: Clone + 'static> Deferred<T> {
    /// Method form of [`map`].
    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + 'static,
        F: Fn(T) -> U + 'static,
    {
        map(f, self)
    }

    /// Method form of [`chain`].
    pub fn chain<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + 'static,
        F: Fn(T) -> Deferred<U> + 'static,
    {
        chain(f, self)
    }

    /// Apply a task of functions to this task's value.
    pub fn ap<B, F>(&self, tf: &Deferred<F>) -> Deferred<B>
    where
        B: Clone + 'static,
        F: Fn(T) -> B + Clone + 'static,
    {
        ap(tf, self)
    }

    /// Method form of [`race`].
    pub fn race(&self, other: &Deferred<T>) -> Deferred<T> {
        race(self, other)
    }

    /// Method form of [`extend`].
    pub fn extend<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + 'static,
        F: Fn(Deferred<T>) -> U + 'static,
    {
        extend(f, self)
    }
}

impl<T: Semigroup + Clone + 'static> Deferred<T> {
    /// Method form of [`concat`].
    pub fn concat(&self, other: &Deferred<T>) -> Deferred<T> {
        concat(self, other)
    }
}
