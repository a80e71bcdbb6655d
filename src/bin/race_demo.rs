//! Race Demo for the timed tasks library
//!
//! Runs a handful of composed timer tasks and prints when each one reacts.
//!
//! Usage:
//!   cargo run --bin race_demo                    # Realtime at 1x
//!   cargo run --bin race_demo -- --rate 4        # Realtime, 4 logical seconds per second
//!   cargo run --bin race_demo -- --offline       # Offline, no sleeping
//!
//! Scenarios:
//!   1. Race        - a slow and a fast timer; the slow one is cancelled
//!   2. Timeout     - work chained after a warm-up, guarded by a deadline
//!   3. Join        - two timers combined once both have fired

use std::env;
use timed_tasks::{task, Deferred, Engine, EngineConfig, Kill, SchedulerMode};

fn print_usage() {
    println!("Usage: cargo run --bin race_demo -- [--rate <R>] [--offline]");
}

/// Wrap `task` so that killing it prints `label`.
fn announce_kill<T: Clone + 'static>(task: &Deferred<T>, label: &'static str) -> Deferred<T> {
    let task = task.clone();
    Deferred::from_run(move |clock, reaction| {
        let kill = task.execute(clock, reaction);
        Kill::both(kill, Kill::from_fn(move || println!("  [kill] {}", label)))
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut rate = 1.0;
    let mut mode = SchedulerMode::Realtime;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--rate" | "-r" => {
                i += 1;
                if i < args.len() {
                    rate = args[i].parse()?;
                }
            }
            "--offline" | "-o" => {
                mode = SchedulerMode::Offline;
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                print_usage();
                return Err(format!("Unknown argument {}", other).into());
            }
        }
        i += 1;
    }

    let mut engine = Engine::new(
        mode,
        EngineConfig {
            rate,
            ..Default::default()
        },
    );

    println!("Running {:?} at rate {}", mode, engine.scheduler.borrow().rate());

    let slow = announce_kill(&engine.delay(2.0, "slow"), "slow");
    let fast = engine.delay(1.0, "fast");
    let race = engine.execute(&slow.race(&fast));

    let work = announce_kill(&engine.delay(3.0, Some("payload")), "work");
    let deadline = engine.delay(2.5, None);
    let timeout = engine.execute(&engine.delay(0.5, ()).chain(move |_| work.race(&deadline)));

    let a = engine.delay(1.5, 2);
    let b = engine.delay(0.75, 3);
    let join = engine.execute(&task::lift2(|x, y| x * y, &a, &b));

    for (name, cell) in [("race", race.result.map(|v| v.to_string()))]
        .into_iter()
        .chain([("timeout", timeout.result.map(|v| format!("{:?}", v)))])
        .chain([("join", join.result.map(|v| v.to_string()))])
    {
        cell.when_ready(move |t, value| {
            println!("  {:>8} reacted at {:.3} with {}", name, t, value)
        });
    }

    engine.run_until_idle();
    println!("Finished at logical time {:.3}", engine.now());
    Ok(())
}
