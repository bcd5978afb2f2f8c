//! Cooperative deadlines for long-running operations
//!
//! Every public engine operation accepts a [`Deadline`] and checks it at
//! natural checkpoints (next epoch, next audio, next HTTP call). An exceeded
//! deadline aborts the operation before any partial commit.

use crate::error::{EngineError, Result};
use std::time::{Duration, Instant};

/// A point in time after which an operation must abort.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    expires: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires.
    #[must_use]
    pub fn none() -> Self {
        Self {
            started: Instant::now(),
            expires: None,
        }
    }

    /// A deadline `timeout` from now.
    #[must_use]
    pub fn within(timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            expires: Some(now + timeout),
        }
    }

    /// Milliseconds elapsed since the operation started.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|e| Instant::now() >= e)
    }

    /// Checkpoint: fail with `Cancelled` if the deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            return Err(EngineError::Cancelled {
                elapsed_ms: self.elapsed_ms(),
            });
        }
        Ok(())
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}
