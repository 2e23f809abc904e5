/*!
# PQC Envelope

One-shot secret transfer between two ephemeral parties, using the strongest
key exchange the host offers and degrading gracefully when post-quantum
primitives are missing.

## Overview

- ML-KEM-1024 through the system OpenSSL when it supports it (level 3)
- X25519 through the system OpenSSL otherwise (level 2)
- In-process X25519 when no engine is usable (level 1)
- AES-256-CBC with HMAC-SHA256 (Encrypt-then-MAC) for the payload
- Per-instance owner-only scratch scopes, shredded on destroy or drop

## Usage

```no_run
use pqc_envelope::Envelope;

# fn main() -> pqc_envelope::Result<()> {
let mut receiver = Envelope::new()?;
let public_key = receiver.generate_keypair()?;

let mut sender = Envelope::new()?;
let sealed = sender.seal(b"token", &public_key)?;

assert_eq!(receiver.open(&sealed)?, b"token");
receiver.destroy()?;
sender.destroy()?;
# Ok(())
# }
```

## Security notes

Secret buffers owned by this crate are wiped with `zeroize`, and scope files
are zero-filled before unlinking. Copies held by the kernel, the OpenSSL
process or the allocator are outside that guarantee.
*/

// Core envelope components
pub mod core;

// Re-export commonly used types for convenience
pub use crate::core::config::EnvelopeConfig;
pub use crate::core::constants::{SELF_TEST_TOKEN, VERSION, sizes};
pub use crate::core::crypto::capability::{
    Capability, CapabilityInfo, CapabilityLevel, current, detect, detect_with, engine_version,
};
pub use crate::core::crypto::cipher::{decrypt, encrypt};
pub use crate::core::crypto::kex::{Backend, PublicKey};
pub use crate::core::envelope::{Envelope, EnvelopeState};
pub use crate::core::error::{BackendError, Error, Result};
pub use crate::core::memory::{SecureScope, SharedSecret};
