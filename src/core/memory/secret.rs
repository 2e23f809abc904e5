/*!
In-memory secret buffers.

`SharedSecret` is the only form in which an established secret travels
between a backend and the cipher. Its bytes are wiped when it is dropped.

Wiping only covers buffers this crate owns. Copies made by the allocator on
reallocation, by the kernel (swap, page cache of a disk-backed scope) or by
the engine process are outside its reach and are not claimed to be erased.
*/

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::constants::sizes::SHARED_SECRET_BYTES;

/// A 32-byte secret established by a key exchange.
///
/// Deliberately neither `Clone` nor serializable.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    bytes: [u8; SHARED_SECRET_BYTES],
}

impl SharedSecret {
    /// Wrap already derived key bytes
    pub fn from_bytes(bytes: [u8; SHARED_SECRET_BYTES]) -> Self {
        Self { bytes }
    }

    /// Borrow the key bytes
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_BYTES] {
        &self.bytes
    }

    /// Compare two secrets in constant time
    pub fn ct_eq(&self, other: &SharedSecret) -> bool {
        self.bytes[..].ct_eq(&other.bytes[..]).into()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}
