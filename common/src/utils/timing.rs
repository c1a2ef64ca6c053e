// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

//! Sleep-and-recheck primitives used while the network is being built.
//!
//! Nothing here spins: every retry or re-check is separated by a fixed sleep.

use std::thread;
use std::time::{Duration, Instant};

use crate::debug;

/// Fixed-delay retry budget for operations that race against node startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Runs `op` until it succeeds or the budget is spent.
    ///
    /// `op` receives the 1-based attempt number. The error of the last attempt
    /// is returned when every attempt failed.
    pub fn run<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        E: std::fmt::Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    debug!("Attempt {attempt}/{attempts} failed: {e}");
                    thread::sleep(self.delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    TimedOut(Duration),
}

/// Polling schedule for a condition that eventually becomes true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
}

impl WaitPolicy {
    pub fn bounded(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout: Some(timeout),
        }
    }

    /// Re-checks `ready` every `interval` until it reports `true` or the
    /// timeout elapses. `on_wait` runs before each sleep.
    pub fn wait_until<E, F, W>(&self, mut ready: F, mut on_wait: W) -> Result<WaitOutcome, E>
    where
        F: FnMut() -> Result<bool, E>,
        W: FnMut(),
    {
        let start = Instant::now();
        loop {
            if ready()? {
                return Ok(WaitOutcome::Ready);
            }
            let elapsed = start.elapsed();
            if let Some(timeout) = self.timeout
                && elapsed >= timeout
            {
                return Ok(WaitOutcome::TimedOut(elapsed));
            }
            on_wait();
            thread::sleep(self.interval);
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
