/*!
Envelope handling.

This module provides the envelope lifecycle, its state machine and the
wire format sealed envelopes travel in.
*/

pub mod envelope;
pub mod format;
pub mod state;

// Re-export commonly used items
pub use envelope::Envelope;
pub use format::{KeyMaterial, SealedEnvelope, WireEnvelope};
pub use state::{EnvelopeState, StateManager};
