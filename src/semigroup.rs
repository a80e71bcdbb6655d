//! Semigroup capability for `concat`
//!
//! Values that carry their own associative combination implement
//! [`Semigroup`]; `Deferred::concat` is only available for them.

use std::collections::VecDeque;

/// An associative binary combination.
pub trait Semigroup {
    /// Combine `self` with `other`, `self` first.
    fn concat(self, other: Self) -> Self;
}

impl Semigroup for String {
    fn concat(mut self, other: Self) -> Self {
        self.push_str(&other);
        self
    }
}

impl<T> Semigroup for Vec<T> {
    fn concat(mut self, mut other: Self) -> Self {
        self.append(&mut other);
        self
    }
}

impl<T> Semigroup for VecDeque<T> {
    fn concat(mut self, mut other: Self) -> Self {
        self.append(&mut other);
        self
    }
}

impl Semigroup for () {
    fn concat(self, _: Self) -> Self {}
}

// `None` is the identity, so `Option<S>` is a monoid over any semigroup.
impl<S: Semigroup> Semigroup for Option<S> {
    fn concat(self, other: Self) -> Self {
        match (self, other) {
            (Some(a), Some(b)) => Some(a.concat(b)),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

impl<A: Semigroup, B: Semigroup> Semigroup for (A, B) {
    fn concat(self, other: Self) -> Self {
        (self.0.concat(other.0), self.1.concat(other.1))
    }
}
