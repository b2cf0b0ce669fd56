//! Cooperative cancellation for long-running pipelines

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// A cloneable flag shared between a caller and the pipelines it started.
///
/// Pipelines check the token before each blocking step; once cancelled, the
/// next check fails with [`Error::Cancelled`] and the pipeline unwinds,
/// releasing its lock and working copy on the way out.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that has not been cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every pipeline holding a clone of this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with `Error::Cancelled` if cancellation has been requested
    pub fn check(&self, step: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled {
                step: step.to_string(),
            });
        }
        Ok(())
    }
}
