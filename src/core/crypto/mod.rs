/*!
Cryptographic components for the envelope.

This module provides capability detection, the system engine runner, the
key-exchange backends and the authenticated payload cipher.
*/

// Capability detection
pub mod capability;

// System engine invocation
pub mod engine;

// Key exchange backends
pub mod kex;

// Symmetric encryption
pub mod cipher;

// Re-export frequently used types
pub use capability::{Capability, CapabilityInfo, CapabilityLevel};
pub use cipher::Cipher;
pub use engine::Engine;
pub use kex::{Backend, Encapsulation, KeyAgreement, KeyExchange, PublicKey};
