/*!
ML-KEM-1024 through the system engine (level 3).

The sender encapsulates against the receiver's public key and transmits the
ciphertext; the receiver decapsulates it with the private key held in its
scope. The raw KEM secret goes through HKDF before reaching the cipher.
*/

use std::ffi::OsStr;

use tracing::debug;

use super::{Encapsulation, KeyExchange, PublicKey, derive_shared_secret, with_scratch};
use crate::core::config::EnvelopeConfig;
use crate::core::constants::HKDF_INFO_KEM;
use crate::core::crypto::capability::CapabilityLevel;
use crate::core::crypto::engine::Engine;
use crate::core::error::Result;
use crate::core::memory::{SecureScope, SharedSecret};

const PRIVATE_KEY: &str = "mlkem_priv.pem";
const PUBLIC_KEY: &str = "mlkem_pub.pem";
const PEER_KEY: &str = "peer_pub.pem";
const KEM_CIPHERTEXT: &str = "kem_ct.bin";
const KEM_SECRET: &str = "kem_ss.bin";

/// ML-KEM-1024 via `openssl pkeyutl -encap/-decap`
#[derive(Debug)]
pub struct MlKem1024 {
    engine: Engine,
    /// Spelling of the algorithm the engine accepted during probing
    engine_algorithm: &'static str,
    scope: SecureScope,
    public: Option<PublicKey>,
}

impl MlKem1024 {
    /// Create a backend with a fresh scope
    pub fn new(config: &EnvelopeConfig, engine_algorithm: &'static str) -> Result<Self> {
        Ok(Self::with_scope(
            Engine::for_operations(config),
            engine_algorithm,
            SecureScope::create(config)?,
        ))
    }

    /// Create a backend over an existing engine handle and scope
    pub fn with_scope(engine: Engine, engine_algorithm: &'static str, scope: SecureScope) -> Self {
        Self {
            engine,
            engine_algorithm,
            scope,
            public: None,
        }
    }

    fn read_secret(&self) -> Result<SharedSecret> {
        let raw = self.scope.read(KEM_SECRET)?;
        derive_shared_secret(&raw, HKDF_INFO_KEM)
    }
}

impl KeyExchange for MlKem1024 {
    fn level(&self) -> CapabilityLevel {
        CapabilityLevel::PostQuantum
    }

    fn generate_keypair(&mut self) -> Result<PublicKey> {
        super::ensure_no_keypair(&self.public)?;
        let key = super::generate_engine_keypair(
            &self.engine,
            &self.scope,
            self.engine_algorithm,
            PRIVATE_KEY,
            PUBLIC_KEY,
        )?;
        debug!(scope = %self.scope.dir().display(), "ML-KEM-1024 keypair generated");
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

impl Encapsulation for MlKem1024 {
    fn encapsulate(&mut self, peer: &PublicKey) -> Result<(Vec<u8>, SharedSecret)> {
        with_scratch(&self.scope, &[PEER_KEY, KEM_CIPHERTEXT, KEM_SECRET], || {
            let peer_path = self.scope.write(PEER_KEY, peer.as_str().as_bytes())?;
            let ct_path = self.scope.path(KEM_CIPHERTEXT)?;
            let ss_path = self.scope.path(KEM_SECRET)?;

            self.engine.run(
                "pkeyutl -encap",
                [
                    OsStr::new("pkeyutl"),
                    OsStr::new("-encap"),
                    OsStr::new("-pubin"),
                    OsStr::new("-inkey"),
                    peer_path.as_os_str(),
                    OsStr::new("-out"),
                    ct_path.as_os_str(),
                    OsStr::new("-secret"),
                    ss_path.as_os_str(),
                ],
            )?;
            self.scope.restrict(KEM_SECRET)?;

            let ciphertext = self.scope.read(KEM_CIPHERTEXT)?.to_vec();
            if ciphertext.is_empty() {
                return crate::decode_err!("engine produced an empty KEM ciphertext");
            }
            Ok((ciphertext, self.read_secret()?))
        })
    }

    fn decapsulate(&mut self, ciphertext: &[u8]) -> Result<SharedSecret> {
        super::ensure_keypair(&self.public)?;
        if ciphertext.is_empty() {
            return crate::decode_err!("empty KEM ciphertext");
        }

        with_scratch(&self.scope, &[KEM_CIPHERTEXT, KEM_SECRET], || {
            let ct_path = self.scope.write(KEM_CIPHERTEXT, ciphertext)?;
            let private_path = self.scope.path(PRIVATE_KEY)?;
            let ss_path = self.scope.path(KEM_SECRET)?;

            self.engine.run(
                "pkeyutl -decap",
                [
                    OsStr::new("pkeyutl"),
                    OsStr::new("-decap"),
                    OsStr::new("-inkey"),
                    private_path.as_os_str(),
                    OsStr::new("-in"),
                    ct_path.as_os_str(),
                    OsStr::new("-secret"),
                    ss_path.as_os_str(),
                ],
            )?;
            self.scope.restrict(KEM_SECRET)?;
            self.read_secret()
        })
    }
}
