/*!
Memory management for the envelope.

This module provides the secure scratch scope holding key files and the
in-memory secret buffer handed to the cipher.
*/

// Scratch directory for key material
pub mod scope;

// Wiped secret buffers
pub mod secret;

// Re-export the main components
pub use scope::{SecureScope, shred_file};
pub use secret::SharedSecret;
