//! Cooperative cancellation.
//!
//! Long-running operations check a [`CancelToken`] at a few well-defined
//! points (between files in a Load, between frames in an export, between
//! roots in a shader-wiring pass). Cancelling never rolls anything back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ShotkitError, ShotkitResult};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Return `Cancelled` if cancellation was requested.
    pub fn check(&self, point: &str) -> ShotkitResult<()> {
        if self.is_cancelled() {
            tracing::info!(point, "Cancellation observed");
            return Err(ShotkitError::cancelled(point.to_string()));
        }
        Ok(())
    }

    /// The underlying flag for external coordination.
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.flag.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(observer.check("between files").is_ok());

        token.cancel();
        assert!(observer.is_cancelled());
        let err = observer.check("between files").unwrap_err();
        assert_eq!(err.code().as_str(), "cancelled");
    }
}
