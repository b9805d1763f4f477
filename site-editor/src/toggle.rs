//! Edit mode toggle.

use tracing::debug;

/// Internal on/off bit. Edit mode is only active while the actor is also
/// authorized; the authorization flag is supplied by the caller on every query.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EditModeToggle {
    enabled: bool,
}

impl EditModeToggle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, authorized: bool) -> bool {
        authorized && self.enabled
    }

    /// Flip the bit. Ignored without authorization.
    pub fn toggle(&mut self, authorized: bool) {
        self.set(authorized, !self.enabled);
    }

    /// Ignored without authorization, in either direction.
    pub fn set(&mut self, authorized: bool, enabled: bool) {
        if !authorized {
            debug!("ignoring edit mode request without authorization");
            return;
        }
        self.enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_requires_authorization() {
        let mut toggle = EditModeToggle::new();
        toggle.toggle(false);
        assert!(!toggle.is_active(false));
        assert!(!toggle.is_active(true));
    }

    #[test]
    fn test_active_is_and_of_bit_and_authorization() {
        let mut toggle = EditModeToggle::new();
        toggle.toggle(true);
        assert!(toggle.is_active(true));
        // Revoked authorization hides edit mode without touching the bit.
        assert!(!toggle.is_active(false));
        toggle.toggle(true);
        assert!(!toggle.is_active(true));
    }

    #[test]
    fn test_unauthorized_toggle_keeps_bit() {
        let mut toggle = EditModeToggle::new();
        toggle.toggle(true);

        toggle.toggle(false);
        toggle.set(false, false);

        assert!(toggle.is_active(true));
    }
}
