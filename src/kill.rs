//! Kill - composable cancellation handles
//!
//! A `Kill` is the capability to stop in-progress work. It comes in three
//! shapes: a stateless no-op, an adapter around an external stop function
//! and the key it needs, and a composite of two kills.
//!
//! `kill()` never fails. The adapter consumes its stop function on first use,
//! so invoking the same handle again (or a clone of it) does nothing.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type Stop = Box<dyn FnOnce()>;

#[derive(Clone, Default)]
enum KillInner {
    #[default]
    Noop,
    With(Rc<RefCell<Option<Stop>>>),
    Both(Rc<(Kill, Kill)>),
}

/// A cancellation handle. Cheap to clone; clones share the same stop.
#[derive(Clone, Default)]
pub struct Kill(KillInner);

impl Kill {
    /// Shared stateless kill for finished or never-started work.
    pub const NOOP: Kill = Kill(KillInner::Noop);

    /// The no-op kill.
    pub fn noop() -> Self {
        Self::NOOP
    }

    /// Create a kill that calls `stop(key)` the first time it is invoked.
    ///
    /// ```
    /// # use timed_tasks::Kill;
    /// # use std::cell::Cell;
    /// # use std::rc::Rc;
    /// let stopped = Rc::new(Cell::new(0));
    /// let s = stopped.clone();
    /// let kill = Kill::with(move |id: u64| s.set(s.get() + id), 7);
    /// kill.kill();
    /// kill.kill();
    /// assert_eq!(stopped.get(), 7);
    /// ```
    pub fn with<K: 'static>(stop: impl FnOnce(K) + 'static, key: K) -> Self {
        Self::from_fn(move || stop(key))
    }

    /// Create a kill from a keyless stop function.
    pub fn from_fn(stop: impl FnOnce() + 'static) -> Self {
        Kill(KillInner::With(Rc::new(RefCell::new(Some(Box::new(stop))))))
    }

    /// Combine two kills into one that invokes `first` then `second`.
    pub fn both(first: Kill, second: Kill) -> Self {
        match (first.is_noop(), second.is_noop()) {
            (true, _) => second,
            (_, true) => first,
            _ => Kill(KillInner::Both(Rc::new((first, second)))),
        }
    }

    /// Whether this is the stateless no-op kill.
    pub fn is_noop(&self) -> bool {
        matches!(self.0, KillInner::Noop)
    }

    /// Stop the work behind this handle.
    pub fn kill(&self) {
        match &self.0 {
            KillInner::Noop => {}
            KillInner::With(slot) => {
                // Release the borrow before running foreign code.
                let stop = slot.borrow_mut().take();
                if let Some(stop) = stop {
                    tracing::trace!("kill: invoking stop");
                    stop();
                }
            }
            KillInner::Both(pair) => {
                pair.0.kill();
                pair.1.kill();
            }
        }
    }
}

impl fmt::Debug for Kill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            KillInner::Noop => f.write_str("Kill::Noop"),
            KillInner::With(slot) => f
                .debug_struct("Kill::With")
                .field("spent", &slot.borrow().is_none())
                .finish(),
            KillInner::Both(pair) => f
                .debug_tuple("Kill::Both")
                .field(&pair.0)
                .field(&pair.1)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<u32>>, Kill) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        (count, Kill::from_fn(move || c.set(c.get() + 1)))
    }

    #[test]
    fn test_noop_kill() {
        let k = Kill::noop();
        assert!(k.is_noop());
        k.kill();
        Kill::default().kill();
    }

    #[test]
    fn test_with_passes_key_once() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let k = Kill::with(move |key: &'static str| s.borrow_mut().push(key), "timer-3");

        k.kill();
        k.clone().kill();

        assert_eq!(*seen.borrow(), vec!["timer-3"]);
    }

    #[test]
    fn test_both_kills_in_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        let k = Kill::both(
            Kill::from_fn(move || o1.borrow_mut().push(1)),
            Kill::from_fn(move || o2.borrow_mut().push(2)),
        );

        k.kill();
        assert_eq!(*order.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_both_is_unconditional_and_idempotent() {
        let (a, ka) = counter();
        let (b, kb) = counter();

        // One child already used elsewhere
        ka.kill();
        let k = Kill::both(ka, kb);
        k.kill();
        k.kill();

        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 1);
    }

    #[test]
    fn test_both_with_noop_collapses() {
        let (_, k) = counter();
        assert!(!Kill::both(Kill::noop(), k.clone()).is_noop());
        assert!(Kill::both(Kill::noop(), Kill::noop()).is_noop());
    }
}
