// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bounded, jittered backoff for the polling loops
//!
//! Both places the consumer blocks on external state (queue discovery and
//! empty receives) poll through this instead of spinning: exponential growth
//! capped at `max`, with up to 50% random jitter so two pollers do not
//! synchronize against the service.

use rand::Rng;
use std::time::{Duration, Instant};
use tokio::time::sleep;

#[derive(Debug)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            attempt: 0,
        }
    }

    /// Forget accumulated growth; called after a successful receive.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Next delay: `initial * 2^attempt` capped at `max`, plus jitter.
    pub fn next_delay(&mut self) -> Duration {
        let base_ms = (self.initial.as_millis() as u64)
            .saturating_mul(1u64 << self.attempt.min(16))
            .min(self.max.as_millis() as u64)
            .max(1);
        if base_ms < self.max.as_millis() as u64 {
            self.attempt += 1;
        }
        let jitter = rand::thread_rng().gen_range(0..=base_ms / 2);
        Duration::from_millis(base_ms + jitter)
    }

    pub async fn wait(&mut self) {
        sleep(self.next_delay()).await;
    }
}

/// Wall-clock deadline shared by the consumer's polling loops.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    pub fn after(duration: Duration) -> Self {
        Self {
            expires_at: Instant::now() + duration,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}
