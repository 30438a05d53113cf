#![allow(dead_code)]

use convergence::{ManualClock, TrackingSleeper, WaitPolicy};
use std::time::Duration;

/// Route `tracing` output through the test harness; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A policy whose sleeps advance a manual clock instead of waiting.
pub fn simulated(timeout: Duration, interval: Duration) -> (WaitPolicy, TrackingSleeper) {
    let clock = ManualClock::new();
    let sleeper = TrackingSleeper::with_clock(clock.clone());
    let policy = WaitPolicy::builder()
        .timeout(timeout)
        .interval(interval)
        .with_sleeper(sleeper.clone())
        .with_clock(clock)
        .build()
        .expect("valid policy");
    (policy, sleeper)
}
