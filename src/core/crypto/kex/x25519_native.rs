/*!
In-process X25519 (level 1).

Used when no engine is available. The private key is kept on disk in the
backend's scope as PKCS#8 PEM, the same place the engine backends keep
theirs, so every level shares one cleanup path. Public keys are emitted in
the engine's SPKI PEM form.
*/

use rand::RngCore;
use tracing::debug;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

use super::{KeyAgreement, KeyExchange, PublicKey, derive_shared_secret, pem};
use crate::core::config::EnvelopeConfig;
use crate::core::constants::{HKDF_INFO_ECDH, sizes::x25519::KEY_BYTES};
use crate::core::crypto::capability::CapabilityLevel;
use crate::core::error::Result;
use crate::core::memory::{SecureScope, SharedSecret};

const PRIVATE_KEY: &str = "x25519_priv.pem";

/// X25519 computed with `x25519-dalek`
#[derive(Debug)]
pub struct NativeX25519 {
    scope: SecureScope,
    public: Option<PublicKey>,
}

impl NativeX25519 {
    /// Create a backend with a fresh scope
    pub fn new(config: &EnvelopeConfig) -> Result<Self> {
        Ok(Self::with_scope(SecureScope::create(config)?))
    }

    /// Create a backend over an existing scope
    pub fn with_scope(scope: SecureScope) -> Self {
        Self {
            scope,
            public: None,
        }
    }

    fn load_secret(&self) -> Result<StaticSecret> {
        let stored = self.scope.read(PRIVATE_KEY)?;
        let text = std::str::from_utf8(&stored)
            .map_err(|_e| crate::core::error::BackendError::Decode("private key is not PEM".into()))?;
        let raw = pem::x25519_private_from_pem(text)?;
        Ok(StaticSecret::from(*raw))
    }
}

impl KeyExchange for NativeX25519 {
    fn level(&self) -> CapabilityLevel {
        CapabilityLevel::NativeClassical
    }

    fn generate_keypair(&mut self) -> Result<PublicKey> {
        super::ensure_no_keypair(&self.public)?;

        let secret = random_secret();
        let public = X25519Public::from(&secret);

        let mut raw = secret.to_bytes();
        let stored = pem::x25519_private_to_pem(&raw);
        raw.zeroize();
        self.scope.write(PRIVATE_KEY, stored.as_bytes())?;

        let key = PublicKey::from_pem(&pem::x25519_public_to_pem(public.as_bytes()))?;
        debug!(scope = %self.scope.dir().display(), "in-process X25519 keypair generated");
        self.public = Some(key.clone());
        Ok(key)
    }

    fn public_key(&self) -> Option<&PublicKey> {
        self.public.as_ref()
    }

    fn scope(&self) -> &SecureScope {
        &self.scope
    }

    fn cleanup(&mut self) -> Result<()> {
        self.scope.cleanup()
    }
}

impl KeyAgreement for NativeX25519 {
    fn derive(&mut self, peer: &PublicKey) -> Result<SharedSecret> {
        super::ensure_keypair(&self.public)?;

        let peer = X25519Public::from(pem::x25519_public_from_pem(peer.as_str())?);
        let secret = self.load_secret()?;
        let shared = secret.diffie_hellman(&peer);

        // Low-order peer points yield an all-zero output
        if !shared.was_contributory() {
            return crate::decode_err!("peer public key is a low-order point");
        }

        derive_shared_secret(shared.as_bytes(), HKDF_INFO_ECDH)
    }
}

/// Whether the in-process primitive works on this host
pub fn self_check() -> bool {
    let alice = random_secret();
    let bob = random_secret();
    let alice_public = X25519Public::from(&alice);
    let bob_public = X25519Public::from(&bob);

    let ab = alice.diffie_hellman(&bob_public);
    let ba = bob.diffie_hellman(&alice_public);
    ab.was_contributory() && ab.as_bytes() == ba.as_bytes()
}

fn random_secret() -> StaticSecret {
    let mut bytes = Zeroizing::new([0u8; KEY_BYTES]);
    rand::rng().fill_bytes(&mut bytes[..]);
    StaticSecret::from(*bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{BackendError, Error};
    use tempfile::TempDir;

    fn backend(root: &TempDir) -> NativeX25519 {
        NativeX25519::with_scope(SecureScope::create_in(root.path()).expect("scope"))
    }

    #[test]
    fn test_agreement() -> Result<()> {
        let root = TempDir::new()?;
        let mut alice = backend(&root);
        let mut bob = backend(&root);

        let alice_pk = alice.generate_keypair()?;
        let bob_pk = bob.generate_keypair()?;
        assert_ne!(alice_pk, bob_pk);

        let ab = alice.derive(&bob_pk)?;
        let ba = bob.derive(&alice_pk)?;
        assert!(ab.ct_eq(&ba));
        Ok(())
    }

    #[test]
    fn test_private_key_lives_in_scope() -> Result<()> {
        let root = TempDir::new()?;
        let mut alice = backend(&root);
        alice.generate_keypair()?;
        assert!(alice.scope().contains(PRIVATE_KEY));

        let dir = alice.scope().dir().to_path_buf();
        alice.cleanup()?;
        assert!(!dir.exists());
        Ok(())
    }

    #[test]
    fn test_derive_requires_keypair() -> Result<()> {
        let root = TempDir::new()?;
        let mut alice = backend(&root);
        let mut bob = backend(&root);
        let bob_pk = bob.generate_keypair()?;

        assert!(matches!(
            alice.derive(&bob_pk),
            Err(Error::IllegalState { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_single_keypair() -> Result<()> {
        let root = TempDir::new()?;
        let mut alice = backend(&root);
        alice.generate_keypair()?;
        assert!(matches!(
            alice.generate_keypair(),
            Err(Error::IllegalState { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_low_order_point_rejected() -> Result<()> {
        let root = TempDir::new()?;
        let mut alice = backend(&root);
        alice.generate_keypair()?;

        let zero = PublicKey::from_pem(&pem::x25519_public_to_pem(&[0u8; KEY_BYTES]))?;
        assert!(matches!(
            alice.derive(&zero),
            Err(Error::BackendInvocation(BackendError::Decode(_)))
        ));
        Ok(())
    }

    #[test]
    fn test_self_check() {
        assert!(self_check());
    }
}
