//! Connection lifecycle of the relay.
//!
//! ```text
//! Disconnected --start--> Authenticating --ready--> Connected --shutdown--> Disconnected
//!                              |
//!                              +--bad token--> Failed (terminal)
//! ```

use std::fmt;

/// Phase of the relay's Discord connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Not connected. Initial state, and the state after shutdown.
    Disconnected,
    /// Opening the Discord session with the bot token.
    Authenticating,
    /// Session ready and both event streams subscribed.
    Connected,
    /// Authentication failed. The relay stays disabled until restarted.
    Failed,
}

impl BridgeState {
    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(self, next: BridgeState) -> bool {
        use BridgeState::*;

        matches!(
            (self, next),
            (Disconnected, Authenticating)
                | (Authenticating, Connected)
                | (Authenticating, Failed)
                | (Authenticating, Disconnected)
                | (Connected, Disconnected)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == BridgeState::Failed
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Authenticating => "authenticating",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::BridgeState::*;

    #[test]
    fn test_happy_path() {
        assert!(Disconnected.can_transition_to(Authenticating));
        assert!(Authenticating.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Disconnected));
    }

    #[test]
    fn test_failed_is_terminal() {
        assert!(Authenticating.can_transition_to(Failed));
        assert!(Failed.is_terminal());
        for next in [Disconnected, Authenticating, Connected] {
            assert!(!Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_no_skipping_authentication() {
        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Authenticating));
        assert!(!Connected.can_transition_to(Failed));
    }
}
