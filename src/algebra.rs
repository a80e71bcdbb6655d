//! Cell algebra
//!
//! Deterministic combinators over [`TimedCell`]. Each combinator creates its
//! own private result cell and is the only writer of it.
//!
//! - `map` keeps the input time.
//! - `join2` waits for both inputs; the result time is the later of the two.
//! - `earliest` takes whichever input has the smaller time.
//! - `chain` flattens a cell-producing continuation; the result time is the
//!   later of the outer and inner times.
//! - `extend` hands the whole timed cell to `f` and keeps its time.
//!
//! The never cell is absorbing for `map`, `chain`, `extend` and `join2`, and
//! the identity for `earliest`.

use crate::cell::{Time, TimedCell, WeakCell};
use std::cell::RefCell;
use std::rc::Rc;

/// Which side of a two-way selection won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pick {
    Left,
    Right,
}

/// Default tie-break: the first argument wins.
pub fn prefer_left<T>(_: &TimedCell<T>, _: &TimedCell<T>) -> Pick {
    Pick::Left
}

/// Apply `f` to the value of `cell` once it is written.
pub fn map<T, U, F>(f: F, cell: &TimedCell<T>) -> TimedCell<U>
where
    T: Clone + 'static,
    U: Clone + 'static,
    F: FnOnce(T) -> U + 'static,
{
    if cell.is_never() {
        return TimedCell::never();
    }
    if let Some((time, value)) = cell.get() {
        return TimedCell::known(time, f(value));
    }

    let out = TimedCell::unwritten();
    let target = out.clone();
    cell.when_ready(move |time, value| target.resolve(time, f(value)));
    out
}

/// Countdown slot owned by one `join2`.
struct Join<A, B, C, F> {
    left: Option<(Time, A)>,
    right: Option<(Time, B)>,
    remaining: u8,
    combine: Option<F>,
    out: TimedCell<C>,
}

impl<A, B, C, F> Join<A, B, C, F>
where
    C: Clone + 'static,
    F: FnOnce(A, B) -> C,
{
    fn arrive(join: &Rc<RefCell<Self>>, fill: impl FnOnce(&mut Self)) {
        let ready = {
            let mut guard = join.borrow_mut();
            let join = &mut *guard;
            fill(join);
            join.remaining -= 1;
            if join.remaining > 0 {
                return;
            }
            match (join.left.take(), join.right.take(), join.combine.take()) {
                (Some(left), Some(right), Some(combine)) => {
                    Some((left, right, combine, join.out.clone()))
                }
                _ => None,
            }
        };

        if let Some(((ta, a), (tb, b), combine, out)) = ready {
            out.resolve(ta.max(tb), combine(a, b));
        }
    }
}

/// Combine two cells once both are written.
///
/// The result does not depend on which input is written first, even though
/// `combine` always receives the left value first.
pub fn join2<A, B, C, F>(combine: F, a: &TimedCell<A>, b: &TimedCell<B>) -> TimedCell<C>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
    F: FnOnce(A, B) -> C + 'static,
{
    if a.is_never() || b.is_never() {
        return TimedCell::never();
    }
    if let (Some((ta, va)), Some((tb, vb))) = (a.get(), b.get()) {
        return TimedCell::known(ta.max(tb), combine(va, vb));
    }

    let out = TimedCell::unwritten();
    let join = Rc::new(RefCell::new(Join {
        left: None,
        right: None,
        remaining: 2,
        combine: Some(combine),
        out: out.clone(),
    }));

    let left = join.clone();
    a.when_ready(move |time, value| Join::arrive(&left, |j| j.left = Some((time, value))));
    b.when_ready(move |time, value| Join::arrive(&join, |j| j.right = Some((time, value))));
    out
}

/// The earlier of two cells, preferring `a` on a tie.
pub fn earliest<T: Clone + 'static>(a: &TimedCell<T>, b: &TimedCell<T>) -> TimedCell<T> {
    earliest_by(prefer_left, a, b)
}

/// The earlier of two cells, with `tie_break` choosing on equal times.
pub fn earliest_by<T, F>(tie_break: F, a: &TimedCell<T>, b: &TimedCell<T>) -> TimedCell<T>
where
    T: Clone + 'static,
    F: FnOnce(&TimedCell<T>, &TimedCell<T>) -> Pick + 'static,
{
    if a.is_never() {
        return b.clone();
    }
    if b.is_never() {
        return a.clone();
    }
    map(|(_, value)| value, &select(tie_break, a, b))
}

/// Shared decision state for `select`.
struct Select<T, F> {
    left: WeakCell<T>,
    right: WeakCell<T>,
    tie_break: Option<F>,
    out: TimedCell<(Pick, T)>,
}

impl<T, F> Select<T, F>
where
    T: Clone + 'static,
    F: FnOnce(&TimedCell<T>, &TimedCell<T>) -> Pick + 'static,
{
    /// Decide from the current state of both inputs, once.
    fn settle(select: &Rc<RefCell<Self>>) {
        let (left, right, out) = {
            let s = select.borrow();
            if s.out.is_written() {
                return;
            }
            (s.left.upgrade(), s.right.upgrade(), s.out.clone())
        };
        let left = left.unwrap_or_else(TimedCell::never);
        let right = right.unwrap_or_else(TimedCell::never);

        let pick = match (left.time(), right.time()) {
            (Some(tl), Some(tr)) if tl < tr => Pick::Left,
            (Some(tl), Some(tr)) if tr < tl => Pick::Right,
            (Some(_), Some(_)) => {
                let tie_break = select.borrow_mut().tie_break.take();
                tie_break.map_or(Pick::Left, |tie_break| tie_break(&left, &right))
            }
            (Some(_), None) => Pick::Left,
            (None, Some(_)) => Pick::Right,
            (None, None) => return,
        };

        let winner = match pick {
            Pick::Left => &left,
            Pick::Right => &right,
        };
        if let Some((time, value)) = winner.get() {
            tracing::debug!(?pick, time, "selection settled");
            out.resolve(time, (pick, value));
        }
    }
}

/// Race two cells, reporting which side won alongside its value.
pub(crate) fn select<T, F>(tie_break: F, a: &TimedCell<T>, b: &TimedCell<T>) -> TimedCell<(Pick, T)>
where
    T: Clone + 'static,
    F: FnOnce(&TimedCell<T>, &TimedCell<T>) -> Pick + 'static,
{
    match (a.is_never(), b.is_never()) {
        (true, true) => return TimedCell::never(),
        (true, false) => return map(|value| (Pick::Right, value), b),
        (false, true) => return map(|value| (Pick::Left, value), a),
        (false, false) => {}
    }

    let select = Rc::new(RefCell::new(Select {
        left: a.downgrade(),
        right: b.downgrade(),
        tie_break: Some(tie_break),
        out: TimedCell::unwritten(),
    }));
    let out = select.borrow().out.clone();

    if a.is_written() && b.is_written() {
        Select::settle(&select);
        return out;
    }

    let on_left = select.clone();
    a.when_ready(move |_, _| Select::settle(&on_left));
    b.when_ready(move |_, _| Select::settle(&select));
    out
}

/// Sequence a cell-producing continuation after `cell`.
pub fn chain<T, U, F>(f: F, cell: &TimedCell<T>) -> TimedCell<U>
where
    T: Clone + 'static,
    U: Clone + 'static,
    F: FnOnce(T) -> TimedCell<U> + 'static,
{
    if cell.is_never() {
        return TimedCell::never();
    }
    if let Some((outer, value)) = cell.get() {
        let inner = f(value);
        if inner.is_never() {
            return TimedCell::never();
        }
        if let Some((time, value)) = inner.get() {
            return TimedCell::known(outer.max(time), value);
        }
        return flatten(outer, &inner);
    }

    let out = TimedCell::unwritten();
    let target = out.clone();
    cell.when_ready(move |outer, value| {
        f(value).when_ready(move |inner, value| target.resolve(outer.max(inner), value));
    });
    out
}

fn flatten<U: Clone + 'static>(outer: Time, inner: &TimedCell<U>) -> TimedCell<U> {
    let out = TimedCell::unwritten();
    let target = out.clone();
    inner.when_ready(move |time, value| target.resolve(outer.max(time), value));
    out
}

/// Apply `f` to the whole timed cell once it is written, keeping its time.
pub fn extend<T, U, F>(f: F, cell: &TimedCell<T>) -> TimedCell<U>
where
    T: Clone + 'static,
    U: Clone + 'static,
    F: FnOnce(&TimedCell<T>) -> U + 'static,
{
    if cell.is_never() {
        return TimedCell::never();
    }
    if let Some(time) = cell.time() {
        return TimedCell::known(time, f(cell));
    }

    let out = TimedCell::unwritten();
    let target = out.clone();
    cell.when_ready(move |time, value| {
        target.resolve(time, f(&TimedCell::known(time, value)));
    });
    out
}

impl<T: Clone + 'static> TimedCell<T> {
    /// Method form of [`map`].
    pub fn map<U, F>(&self, f: F) -> TimedCell<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        map(f, self)
    }

    /// Method form of [`chain`].
    pub fn chain<U, F>(&self, f: F) -> TimedCell<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> TimedCell<U> + 'static,
    {
        chain(f, self)
    }

    /// Method form of [`extend`].
    pub fn extend<U, F>(&self, f: F) -> TimedCell<U>
    where
        U: Clone + 'static,
        F: FnOnce(&TimedCell<T>) -> U + 'static,
    {
        extend(f, self)
    }

    /// Method form of [`earliest`].
    pub fn earliest(&self, other: &TimedCell<T>) -> TimedCell<T> {
        earliest(self, other)
    }
}
