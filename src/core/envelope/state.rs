/*!
Envelope state management.

This module defines envelope states and the state machine for envelope
progression.
*/

use std::fmt;

use crate::core::error::Result;

/// Envelope state for tracking lifecycle progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    /// Backend constructed, no keys yet
    Created,
    /// Ephemeral keypair generated
    KeypairGenerated,
    /// Shared secret established with the peer
    SecretEstablished,
    /// Payload sealed (sender, terminal until destroyed)
    Sealed,
    /// Payload opened (receiver, terminal until destroyed)
    Opened,
    /// A seal or open failed part way; only destroy is allowed
    Failed,
    /// Scope destroyed
    Destroyed,
}

impl fmt::Display for EnvelopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeState::Created => write!(f, "Created"),
            EnvelopeState::KeypairGenerated => write!(f, "KeypairGenerated"),
            EnvelopeState::SecretEstablished => write!(f, "SecretEstablished"),
            EnvelopeState::Sealed => write!(f, "Sealed"),
            EnvelopeState::Opened => write!(f, "Opened"),
            EnvelopeState::Failed => write!(f, "Failed"),
            EnvelopeState::Destroyed => write!(f, "Destroyed"),
        }
    }
}

/// Envelope state manager
///
/// Validates operations against the current state and performs the
/// transitions.
#[derive(Debug, Clone, Copy)]
pub struct StateManager {
    state: EnvelopeState,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    /// Create a new state manager
    pub fn new() -> Self {
        Self {
            state: EnvelopeState::Created,
        }
    }

    /// Get the current state
    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Check if the envelope is in the given state
    pub fn is_state(&self, state: EnvelopeState) -> bool {
        self.state == state
    }

    /// Check if generating a keypair is allowed
    pub fn can_generate_keypair(&self) -> bool {
        self.state == EnvelopeState::Created
    }

    /// Check if sealing is allowed (own keypair is optional for the sender)
    pub fn can_seal(&self) -> bool {
        matches!(
            self.state,
            EnvelopeState::Created | EnvelopeState::KeypairGenerated
        )
    }

    /// Check if opening is allowed
    pub fn can_open(&self) -> bool {
        self.state == EnvelopeState::KeypairGenerated
    }

    /// Fail with `IllegalState` unless `allowed` holds
    pub fn require(&self, allowed: bool, expected: impl fmt::Display) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            crate::invalid_state_err!(expected, self.state)
        }
    }

    /// Transition to the keypair generated state
    pub fn transition_to_keypair_generated(&mut self) {
        if self.state == EnvelopeState::Created {
            self.state = EnvelopeState::KeypairGenerated;
        }
    }

    /// Transition to the secret established state
    pub fn transition_to_secret_established(&mut self) {
        if self.state == EnvelopeState::KeypairGenerated {
            self.state = EnvelopeState::SecretEstablished;
        }
    }

    /// Transition to the sealed state
    pub fn transition_to_sealed(&mut self) {
        if self.state == EnvelopeState::SecretEstablished {
            self.state = EnvelopeState::Sealed;
        }
    }

    /// Transition to the opened state
    pub fn transition_to_opened(&mut self) {
        if self.state == EnvelopeState::SecretEstablished {
            self.state = EnvelopeState::Opened;
        }
    }

    /// Mark a failed seal or open
    pub fn transition_to_failed(&mut self) {
        if self.state != EnvelopeState::Destroyed {
            self.state = EnvelopeState::Failed;
        }
    }

    /// Transition to the destroyed state
    pub fn transition_to_destroyed(&mut self) {
        self.state = EnvelopeState::Destroyed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;

    #[test]
    fn test_sender_transitions() {
        let mut manager = StateManager::new();

        assert_eq!(manager.state(), EnvelopeState::Created);
        assert!(manager.can_seal());
        assert!(!manager.can_open());

        manager.transition_to_keypair_generated();
        manager.transition_to_secret_established();
        manager.transition_to_sealed();
        assert_eq!(manager.state(), EnvelopeState::Sealed);
        assert!(!manager.can_seal());
        assert!(!manager.can_open());

        manager.transition_to_destroyed();
        assert!(manager.is_state(EnvelopeState::Destroyed));
    }

    #[test]
    fn test_receiver_transitions() {
        let mut manager = StateManager::new();
        assert!(!manager.can_open());

        manager.transition_to_keypair_generated();
        assert!(manager.can_open());
        assert!(!manager.can_generate_keypair());

        manager.transition_to_secret_established();
        manager.transition_to_opened();
        assert_eq!(manager.state(), EnvelopeState::Opened);
        assert!(!manager.can_open());
    }

    #[test]
    fn test_out_of_order_transitions_ignored() {
        let mut manager = StateManager::new();
        manager.transition_to_sealed();
        manager.transition_to_opened();
        assert_eq!(manager.state(), EnvelopeState::Created);
    }

    #[test]
    fn test_failed_is_sticky() {
        let mut manager = StateManager::new();
        manager.transition_to_keypair_generated();
        manager.transition_to_failed();

        assert!(!manager.can_seal());
        assert!(!manager.can_open());
        assert!(!manager.can_generate_keypair());

        manager.transition_to_destroyed();
        manager.transition_to_failed();
        assert_eq!(manager.state(), EnvelopeState::Destroyed);
    }

    #[test]
    fn test_require_reports_state() {
        let manager = StateManager::new();
        match manager.require(manager.can_open(), "KeypairGenerated") {
            Err(Error::IllegalState { expected, actual }) => {
                assert_eq!(expected, "KeypairGenerated");
                assert_eq!(actual, "Created");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
