/*!
Key-exchange backends.

Two families sit behind one contract:

- KEM (`Encapsulation`): the sender encapsulates against the receiver's public
  key, the receiver decapsulates with its own private key.
- ECDH (`KeyAgreement`): either side derives the same secret from its own
  private key and the peer's public key.

`Backend` is the sum of the two, chosen once from the capability level.
Every backend owns a `SecureScope` holding its private key and scratch files.
*/

use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::core::config::EnvelopeConfig;
use crate::core::constants::{HKDF_SALT, sizes::SHARED_SECRET_BYTES};
use crate::core::crypto::capability::{Capability, CapabilityLevel};
use crate::core::crypto::engine::Engine;
use crate::core::error::{BackendError, Error, Result};
use crate::core::memory::{SecureScope, SharedSecret};

pub mod mlkem;
pub mod pem;
pub mod x25519_engine;
pub mod x25519_native;

pub use mlkem::MlKem1024;
pub use x25519_engine::EngineX25519;
pub use x25519_native::NativeX25519;

/// Text-serialized (PEM) public key, opaque to the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey(String);

impl PublicKey {
    /// Parse a PEM public key, tolerating surrounding whitespace
    pub fn from_pem(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if !pem::is_public_key(trimmed) {
            return Err(BackendError::Decode("not a PEM public key".into()).into());
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The PEM text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_pem(s)
    }
}

impl TryFrom<String> for PublicKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_pem(&value)
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.0
    }
}

/// Contract shared by every backend
pub trait KeyExchange: Send {
    /// Level this backend implements
    fn level(&self) -> CapabilityLevel;

    /// Reported algorithm name
    fn algorithm(&self) -> &'static str {
        self.level().algorithm_name()
    }

    /// Generate this instance's ephemeral keypair and return the public half.
    ///
    /// A backend holds at most one keypair; a second call fails with
    /// `IllegalState`.
    fn generate_keypair(&mut self) -> Result<PublicKey>;

    /// Public key generated by this instance, if any
    fn public_key(&self) -> Option<&PublicKey>;

    /// Scope holding this backend's private material
    fn scope(&self) -> &SecureScope;

    /// Directory of the scope
    fn scope_path(&self) -> &Path {
        self.scope().dir()
    }

    /// Destroy all private material owned by this backend
    fn cleanup(&mut self) -> Result<()>;
}

/// ECDH: symmetric roles
pub trait KeyAgreement: KeyExchange {
    /// Derive the shared secret from our private key and the peer's public key
    fn derive(&mut self, peer: &PublicKey) -> Result<SharedSecret>;
}

/// KEM: asymmetric roles
pub trait Encapsulation: KeyExchange {
    /// Sender side: produce a ciphertext and the secret it carries
    fn encapsulate(&mut self, peer: &PublicKey) -> Result<(Vec<u8>, SharedSecret)>;

    /// Receiver side: recover the secret with our own private key
    fn decapsulate(&mut self, ciphertext: &[u8]) -> Result<SharedSecret>;
}

/// The backend variant selected for an envelope
pub enum Backend {
    /// Key encapsulation (level 3)
    Kem(Box<dyn Encapsulation>),
    /// Key agreement (levels 1 and 2)
    Ecdh(Box<dyn KeyAgreement>),
}

impl Backend {
    /// Build the backend matching a detected capability
    pub fn for_capability(capability: &Capability, config: &EnvelopeConfig) -> Result<Self> {
        match capability.level {
            CapabilityLevel::None => Err(Error::CapabilityUnavailable),
            CapabilityLevel::PostQuantum => {
                let name = capability
                    .engine_algorithm
                    .unwrap_or(crate::core::constants::algorithms::ML_KEM_ENGINE_NAMES[0]);
                Ok(Backend::Kem(Box::new(MlKem1024::new(config, name)?)))
            }
            CapabilityLevel::EngineClassical => {
                Ok(Backend::Ecdh(Box::new(EngineX25519::new(config)?)))
            }
            CapabilityLevel::NativeClassical => {
                Ok(Backend::Ecdh(Box::new(NativeX25519::new(config)?)))
            }
        }
    }

    /// Level of the wrapped backend
    pub fn level(&self) -> CapabilityLevel {
        match self {
            Backend::Kem(kem) => kem.level(),
            Backend::Ecdh(ecdh) => ecdh.level(),
        }
    }

    /// Algorithm name of the wrapped backend
    pub fn algorithm(&self) -> &'static str {
        match self {
            Backend::Kem(kem) => kem.algorithm(),
            Backend::Ecdh(ecdh) => ecdh.algorithm(),
        }
    }

    /// Generate the wrapped backend's keypair
    pub fn generate_keypair(&mut self) -> Result<PublicKey> {
        match self {
            Backend::Kem(kem) => kem.generate_keypair(),
            Backend::Ecdh(ecdh) => ecdh.generate_keypair(),
        }
    }

    /// Public key of the wrapped backend
    pub fn public_key(&self) -> Option<&PublicKey> {
        match self {
            Backend::Kem(kem) => kem.public_key(),
            Backend::Ecdh(ecdh) => ecdh.public_key(),
        }
    }

    /// Scope of the wrapped backend
    pub fn scope(&self) -> &SecureScope {
        match self {
            Backend::Kem(kem) => kem.scope(),
            Backend::Ecdh(ecdh) => ecdh.scope(),
        }
    }

    /// Destroy the wrapped backend's private material
    pub fn cleanup(&mut self) -> Result<()> {
        match self {
            Backend::Kem(kem) => kem.cleanup(),
            Backend::Ecdh(ecdh) => ecdh.cleanup(),
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("level", &self.level())
            .field("scope", &self.scope().dir())
            .finish()
    }
}

/// Turn raw KEM or ECDH output into the secret handed to the cipher.
///
/// HKDF-SHA256 keeps the algebraic structure of the raw output out of the
/// cipher key.
pub fn derive_shared_secret(raw: &[u8], info: &[u8]) -> Result<SharedSecret> {
    if raw.is_empty() {
        return Err(BackendError::Decode("empty shared secret".into()).into());
    }

    let mut okm = [0u8; SHARED_SECRET_BYTES];
    Hkdf::<Sha256>::new(Some(HKDF_SALT), raw)
        .expand(info, &mut okm)
        .map_err(|_e| BackendError::Decode("key derivation failed".into()))?;

    let secret = SharedSecret::from_bytes(okm);
    zeroize::Zeroize::zeroize(&mut okm);
    Ok(secret)
}

/// Run `op`, then shred the named scratch artifacts whatever the outcome
pub(crate) fn with_scratch<T>(
    scope: &SecureScope,
    artifacts: &[&str],
    op: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let result = op();
    let shredded = scope.shred_all(artifacts);
    let value = result?;
    shredded?;
    Ok(value)
}

/// Generate an engine keypair into the scope and return the public half.
///
/// The private key never leaves the scope file `private_name`; the public
/// key is read back from `public_name` and left in place for inspection.
/// A failure shreds whatever the engine managed to write.
pub(crate) fn generate_engine_keypair(
    engine: &Engine,
    scope: &SecureScope,
    algorithm: &str,
    private_name: &str,
    public_name: &str,
) -> Result<PublicKey> {
    let result = write_engine_keypair(engine, scope, algorithm, private_name, public_name);
    if result.is_err() {
        let _ = scope.shred_all(&[private_name, public_name]);
    }
    result
}

fn write_engine_keypair(
    engine: &Engine,
    scope: &SecureScope,
    algorithm: &str,
    private_name: &str,
    public_name: &str,
) -> Result<PublicKey> {
    let private_path = scope.path(private_name)?;
    let public_path = scope.path(public_name)?;

    engine.run(
        "genpkey",
        [
            OsStr::new("genpkey"),
            OsStr::new("-algorithm"),
            OsStr::new(algorithm),
            OsStr::new("-out"),
            private_path.as_os_str(),
        ],
    )?;
    scope.restrict(private_name)?;

    engine.run(
        "pkey -pubout",
        [
            OsStr::new("pkey"),
            OsStr::new("-in"),
            private_path.as_os_str(),
            OsStr::new("-pubout"),
            OsStr::new("-out"),
            public_path.as_os_str(),
        ],
    )?;
    scope.restrict(public_name)?;

    let text = scope.read(public_name)?;
    let text = std::str::from_utf8(&text)
        .map_err(|_e| BackendError::Decode("engine public key is not text".into()))?;
    PublicKey::from_pem(text)
}

/// Refuse a second keypair on the same backend
pub(crate) fn ensure_no_keypair(public: &Option<PublicKey>) -> Result<()> {
    if public.is_some() {
        return crate::invalid_state_err!("no keypair", "keypair already generated");
    }
    Ok(())
}

/// Require a keypair before using the private key
pub(crate) fn ensure_keypair(public: &Option<PublicKey>) -> Result<()> {
    if public.is_none() {
        return crate::invalid_state_err!("keypair generated", "no keypair");
    }
    Ok(())
}
