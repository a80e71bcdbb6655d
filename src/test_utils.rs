//! Test utilities
//!
//! - Tracing-based logging initialization shared by all tests
//! - A recorder that collects reactions
//! - Stop functions that count how often they were invoked

use crate::cell::Time;
use crate::deferred::Clock;
use crate::kill::Kill;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}

/// A clock that always reads `t`.
pub fn fixed_clock(t: Time) -> Clock {
    Rc::new(move || t)
}

/// Returns a counter and a factory of kills that bump it when invoked.
pub fn counting_stop() -> (Rc<Cell<u32>>, impl Fn() -> Kill + Clone + 'static) {
    let count = Rc::new(Cell::new(0));
    let c = count.clone();
    let make = move || {
        let c = c.clone();
        Kill::from_fn(move || c.set(c.get() + 1))
    };
    (count, make)
}

/// Collects every reaction it hands out.
pub struct Recorder<T> {
    events: Rc<RefCell<Vec<(Time, T)>>>,
}

impl<T: Clone + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn reaction(&self) -> impl FnOnce(Time, T) + 'static {
        let events = self.events.clone();
        move |time, value| events.borrow_mut().push((time, value))
    }

    pub fn events(&self) -> Vec<(Time, T)> {
        self.events.borrow().clone()
    }
}
