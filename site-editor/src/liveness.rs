//! Liveness of the UI context that owns an edit session.
//!
//! The owner tears the guard down when it unmounts. Publish checks the guard
//! between phases and stops quietly once it is torn down; queued uploads hold
//! child tokens so teardown also cancels whatever upload is in flight.

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct LivenessGuard {
    token: CancellationToken,
}

impl LivenessGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn tear_down(&self) {
        self.token.cancel();
    }

    /// Token cancelled by teardown or by its own `cancel()`, whichever comes first.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_cancels_children() {
        let guard = LivenessGuard::new();
        let child = guard.child_token();
        assert!(guard.is_live());

        guard.tear_down();

        assert!(!guard.is_live());
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_cancel_leaves_guard_live() {
        let guard = LivenessGuard::new();
        let child = guard.child_token();
        child.cancel();
        assert!(guard.is_live());
    }
}
