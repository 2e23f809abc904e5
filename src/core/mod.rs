//! Core components for the envelope.
//!
//! This module contains the fundamental building blocks: capability
//! detection, key-exchange backends, the payload cipher, secure scratch
//! storage, the envelope state machine and error handling.

// Export cryptographic functionality
pub mod crypto;

// Export envelope handling
pub mod envelope;

// Export memory handling for sensitive data
pub mod memory;

// Runtime configuration
pub mod config;

// Envelope constants
pub mod constants;

// Error handling
pub mod error;

// Re-exports for convenience
pub use self::config::EnvelopeConfig;
pub use self::constants::VERSION;
pub use self::envelope::{Envelope, EnvelopeState};
pub use self::error::{BackendError, Error, Result};
