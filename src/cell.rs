//! TimedCell - write-once (time, value) slots
//!
//! A cell is a value that becomes known at a specific logical time. Neither
//! the time nor the value is known until the cell is written. Any number of
//! awaiters may be registered; each runs exactly once, in registration order,
//! when the cell is written (or immediately, if it already was).
//!
//! `TimedCell::never()` is a handle with no state at all. It is never
//! written and writing it always fails.

use crate::error::{Error, Result};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Logical time.
pub type Time = f64;

type Awaiter<T> = Box<dyn FnOnce(Time, T)>;

enum Slot<T> {
    Pending(Vec<Awaiter<T>>),
    Written(Time, T),
}

/// A write-once, time-stamped value with FIFO awaiters.
///
/// Handles are cheap to clone and share one slot.
pub struct TimedCell<T> {
    slot: Option<Rc<RefCell<Slot<T>>>>,
}

impl<T> Clone for TimedCell<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> TimedCell<T> {
    /// Create a cell with no time or value yet.
    pub fn unwritten() -> Self {
        Self {
            slot: Some(Rc::new(RefCell::new(Slot::Pending(Vec::new())))),
        }
    }

    /// Create a cell already written with `(time, value)`.
    pub fn known(time: Time, value: T) -> Self {
        Self {
            slot: Some(Rc::new(RefCell::new(Slot::Written(time, value)))),
        }
    }

    /// The permanently unwritten cell.
    pub fn never() -> Self {
        Self { slot: None }
    }

    /// Whether this is the never cell.
    pub fn is_never(&self) -> bool {
        self.slot.is_none()
    }

    /// Whether a value has been written.
    pub fn is_written(&self) -> bool {
        self.time().is_some()
    }

    /// The time the value arrived, if written.
    pub fn time(&self) -> Option<Time> {
        let slot = self.slot.as_ref()?;
        match &*slot.borrow() {
            Slot::Written(time, _) => Some(*time),
            Slot::Pending(_) => None,
        }
    }

    pub(crate) fn downgrade(&self) -> WeakCell<T> {
        WeakCell {
            slot: self.slot.as_ref().map(Rc::downgrade),
        }
    }
}

impl<T: Clone + 'static> TimedCell<T> {
    /// The written value, if any.
    pub fn value(&self) -> Option<T> {
        self.get().map(|(_, value)| value)
    }

    /// The written `(time, value)` pair, if any.
    pub fn get(&self) -> Option<(Time, T)> {
        let slot = self.slot.as_ref()?;
        match &*slot.borrow() {
            Slot::Written(time, value) => Some((*time, value.clone())),
            Slot::Pending(_) => None,
        }
    }

    /// Write `(time, value)` and run every pending awaiter in FIFO order.
    ///
    /// Fails with [`Error::AlreadyWritten`] if the cell already holds a value
    /// or is the never cell; the existing contents are left untouched.
    pub fn write(&self, time: Time, value: T) -> Result<()> {
        let Some(slot) = &self.slot else {
            return Err(Error::AlreadyWritten);
        };

        let awaiters = {
            let mut slot = slot.borrow_mut();
            let awaiters = match &mut *slot {
                Slot::Written(..) => return Err(Error::AlreadyWritten),
                Slot::Pending(awaiters) => std::mem::take(awaiters),
            };
            *slot = Slot::Written(time, value);
            awaiters
        };

        tracing::trace!(time, awaiters = awaiters.len(), "cell written");

        // Each awaiter reads the slot fresh; no borrow is held while it runs.
        for awaiter in awaiters {
            if let Some((time, value)) = self.get() {
                awaiter(time, value);
            }
        }
        Ok(())
    }

    /// Write a cell this crate owns. A failure means a combinator wrote its
    /// private result twice.
    pub(crate) fn resolve(&self, time: Time, value: T) {
        if let Err(err) = self.write(time, value) {
            panic!("{err}");
        }
    }

    /// Register an awaiter. Runs it now if the cell is written, otherwise
    /// queues it behind previously registered awaiters. Awaiters on the never
    /// cell are dropped.
    pub fn when_ready(&self, awaiter: impl FnOnce(Time, T) + 'static) {
        let Some(slot) = &self.slot else {
            return;
        };

        {
            let mut slot = slot.borrow_mut();
            if let Slot::Pending(awaiters) = &mut *slot {
                awaiters.push(Box::new(awaiter));
                tracing::trace!(queued = awaiters.len(), "awaiter registered");
                return;
            }
        }

        if let Some((time, value)) = self.get() {
            awaiter(time, value);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for TimedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(slot) = &self.slot else {
            return f.write_str("TimedCell::Never");
        };
        match &*slot.borrow() {
            Slot::Pending(awaiters) => f
                .debug_struct("TimedCell::Pending")
                .field("awaiters", &awaiters.len())
                .finish(),
            Slot::Written(time, value) => f
                .debug_struct("TimedCell::Written")
                .field("time", time)
                .field("value", value)
                .finish(),
        }
    }
}

/// Non-owning cell handle, for awaiters that must not keep a sibling alive.
pub(crate) struct WeakCell<T> {
    slot: Option<Weak<RefCell<Slot<T>>>>,
}

impl<T> WeakCell<T> {
    /// `None` if the cell is gone; a dropped cell can never be written.
    pub(crate) fn upgrade(&self) -> Option<TimedCell<T>> {
        match &self.slot {
            None => Some(TimedCell::never()),
            Some(weak) => weak.upgrade().map(|slot| TimedCell { slot: Some(slot) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_unwritten_then_write() {
        let cell = TimedCell::unwritten();
        assert!(!cell.is_written());
        assert_eq!(cell.get(), None);

        cell.write(1.5, "a").unwrap();
        assert_eq!(cell.get(), Some((1.5, "a")));
        assert_eq!(cell.time(), Some(1.5));
        assert_eq!(cell.value(), Some("a"));
    }

    #[test]
    fn test_write_once() {
        let cell = TimedCell::unwritten();
        cell.write(1.0, 10).unwrap();

        assert_eq!(cell.write(2.0, 20), Err(Error::AlreadyWritten));
        assert_eq!(cell.get(), Some((1.0, 10)));

        let known = TimedCell::known(0.0, 1);
        assert_eq!(known.write(0.0, 2), Err(Error::AlreadyWritten));
        assert_eq!(known.value(), Some(1));
    }

    #[test]
    fn test_never_rejects_writes() {
        let never: TimedCell<i32> = TimedCell::never();
        assert!(never.is_never());
        assert_eq!(never.write(0.0, 1), Err(Error::AlreadyWritten));
        assert!(!never.is_written());
    }

    #[test]
    fn test_awaiters_fire_in_registration_order() {
        let cell = TimedCell::unwritten();
        let order = Rc::new(RefCell::new(Vec::new()));

        for id in ["a1", "a2", "a3"] {
            let o = order.clone();
            cell.when_ready(move |t, v: i32| o.borrow_mut().push((id, t, v)));
        }
        assert!(order.borrow().is_empty());

        cell.write(3.0, 9).unwrap();
        assert_eq!(
            *order.borrow(),
            vec![("a1", 3.0, 9), ("a2", 3.0, 9), ("a3", 3.0, 9)]
        );
    }

    #[test]
    fn test_late_awaiter_fires_synchronously() {
        let cell = TimedCell::known(4.0, 'x');
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();

        cell.when_ready(move |t, v| {
            assert_eq!((t, v), (4.0, 'x'));
            f.set(true);
        });
        assert!(fired.get());
    }

    #[test]
    fn test_awaiter_may_register_during_write() {
        let cell = TimedCell::unwritten();
        let order = Rc::new(RefCell::new(Vec::new()));

        let inner_cell = cell.clone();
        let o = order.clone();
        cell.when_ready(move |_, _: u8| {
            o.borrow_mut().push("first");
            let o = o.clone();
            inner_cell.when_ready(move |_, _| o.borrow_mut().push("nested"));
        });
        let o = order.clone();
        cell.when_ready(move |_, _| o.borrow_mut().push("second"));

        cell.write(0.0, 1).unwrap();
        assert_eq!(*order.borrow(), vec!["first", "nested", "second"]);
    }

    #[test]
    fn test_never_drops_awaiters() {
        let never: TimedCell<u8> = TimedCell::never();
        never.when_ready(|_, _| panic!("never fires"));
    }

    #[test]
    fn test_weak_cell_upgrade() {
        let cell: TimedCell<u8> = TimedCell::unwritten();
        let weak = cell.downgrade();
        assert!(weak.upgrade().is_some());
        drop(cell);
        assert!(weak.upgrade().is_none());

        let never = TimedCell::<u8>::never().downgrade();
        assert!(never.upgrade().is_some_and(|c| c.is_never()));
    }
}
