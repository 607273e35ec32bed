// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Optimistic concurrency retries for Kubernetes writes.
//!
//! Status and annotation writes carry `metadata.resourceVersion`, so a write
//! racing another writer fails with a conflict. [`retry_on_conflict`] re-runs
//! the read-modify-write closure with a short jittered backoff until it
//! succeeds, fails with anything other than a conflict, or the attempt budget
//! is spent.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::constants::MAX_CONFLICT_RETRIES;
use crate::errors::StoreError;

/// Initial retry interval (10ms)
const INITIAL_INTERVAL_MILLIS: u64 = 10;

/// Maximum interval between retries (500ms)
const MAX_INTERVAL_MILLIS: u64 = 500;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent writers retrying in lockstep (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Simple exponential backoff with jitter.
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
}

impl ExponentialBackoff {
    fn new(
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            multiplier,
            randomization_factor,
        }
    }

    /// Get the next backoff interval and grow the current one.
    pub fn next_backoff(&mut self) -> Duration {
        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        jittered
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        // rand::random::<f64>() is uniform in [0, 1)
        let jittered = secs - delta + rand::random::<f64>() * 2.0 * delta;

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Backoff used between conflict retries.
///
/// # Configuration
///
/// - **Initial interval**: 10ms
/// - **Max interval**: 500ms
/// - **Multiplier**: 2.0
/// - **Randomization**: ±10%
#[must_use]
pub fn conflict_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(INITIAL_INTERVAL_MILLIS),
        Duration::from_millis(MAX_INTERVAL_MILLIS),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Runs a read-modify-write operation, retrying it on conflicts.
///
/// The closure must re-read the object on every call so that each attempt
/// works against the latest resource version.
///
/// # Arguments
///
/// * `operation` - Async read-modify-write closure
/// * `operation_name` - Human-readable name for logging (e.g., "update status")
///
/// # Errors
///
/// Returns the first non-conflict error, or the last conflict once
/// `MAX_CONFLICT_RETRIES` attempts have failed.
pub async fn retry_on_conflict<T, F, Fut>(
    mut operation: F,
    operation_name: &str,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut backoff = conflict_backoff();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt, "Write succeeded after conflict retries"
                    );
                }
                return Ok(value);
            }
            Err(e) if e.is_conflict() && attempt < MAX_CONFLICT_RETRIES => {
                let delay = backoff.next_backoff();
                debug!(
                    operation = operation_name,
                    attempt,
                    retry_after = ?delay,
                    "Conflict writing object, will retry"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_conflict() {
                    warn!(
                        operation = operation_name,
                        attempt,
                        error = %e,
                        "Conflict retries exhausted"
                    );
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
