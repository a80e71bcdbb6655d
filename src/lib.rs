//! Timed Tasks
//!
//! Values that become known at a logical time, and lazy tasks that produce
//! them, with:
//! - Write-once timed cells with ordered awaiters and a functor/monad algebra
//! - Deferred tasks that start only when run, against an injected clock
//! - Composable cancellation (kills) that stop every live branch exactly once
//! - Race with a deterministic tie-break and automatic loser cancellation
//! - A timer engine with realtime (spin_sleep) and offline (stepping) modes

pub mod error;
pub mod kill;
pub mod cell;
pub mod algebra;
pub mod semigroup;
pub mod deferred;
pub mod task;
pub mod pq;
pub mod scheduler;
pub mod engine;

#[cfg(test)]
mod test_utils;

pub use algebra::Pick;
pub use cell::{Time, TimedCell};
pub use deferred::{run, Clock, Completion, Deferred, Execution, Reaction};
pub use engine::{Engine, EngineConfig, SchedulerMode};
pub use error::{Error, Result};
pub use kill::Kill;
pub use semigroup::Semigroup;
