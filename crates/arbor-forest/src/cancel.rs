use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ForestError;

/// Shared flag that asks an in-flight training run to stop.
///
/// Clones observe the same flag. Training checks it before each tree and
/// before each node, and a cancelled run returns no partial forest.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Return [`ForestError::Cancelled`] once cancellation was requested.
    pub(crate) fn check(&self) -> Result<(), ForestError> {
        if self.is_cancelled() {
            Err(ForestError::Cancelled)
        } else {
            Ok(())
        }
    }
}
