/*!
X25519 through the system engine (level 2).
*/

use std::ffi::OsStr;

use tracing::debug;

use super::{KeyAgreement, KeyExchange, PublicKey, derive_shared_secret, with_scratch};
use crate::core::config::EnvelopeConfig;
use crate::core::constants::{
    HKDF_INFO_ECDH, algorithms::X25519_ENGINE_NAME, sizes::x25519::KEY_BYTES,
};
use crate::core::crypto::capability::CapabilityLevel;
use crate::core::crypto::engine::Engine;
use crate::core::error::Result;
use crate::core::memory::{SecureScope, SharedSecret};

const PRIVATE_KEY: &str = "x25519_priv.pem";
const PUBLIC_KEY: &str = "x25519_pub.pem";
const PEER_KEY: &str = "peer_pub.pem";
const RAW_SECRET: &str = "shared_raw.bin";

/// X25519 via `openssl genpkey` / `pkeyutl -derive`
#[derive(Debug)]
pub struct EngineX25519 {
    engine: Engine,
    scope: SecureScope,
    public: Option<PublicKey>,
}

impl EngineX25519 {
    /// Create a backend with a fresh scope
    pub fn new(config: &EnvelopeConfig) -> Result<Self> {
        Ok(Self::with_scope(
            Engine::for_operations(config),
            SecureScope::create(config)?,
        ))
    }

    /// Create a backend over an existing engine handle and scope
    pub fn with_scope(engine: Engine, scope: SecureScope) -> Self {
        Self {
            engine,
            scope,
            public: None,
        }
    }

    fn derive_raw(&self) -> Result<SharedSecret> {
        let private_path = self.scope.path(PRIVATE_KEY)?;
        let peer_path = self.scope.path(PEER_KEY)?;
        let raw_path = self.scope.path(RAW_SECRET)?;

        self.engine.run(
            "pkeyutl -derive",
            [
                OsStr::new("pkeyutl"),
                OsStr::new("-derive"),
                OsStr::new("-inkey"),
                private_path.as_os_str(),
                OsStr::new("-peerkey"),
                peer_path.as_os_str(),
                OsStr::new("-out"),
                raw_path.as_os_str(),
            ],
        )?;
        self.scope.restrict(RAW_SECRET)?;

        let raw = self.scope.read(RAW_SECRET)?;
        if raw.len() != KEY_BYTES {
            return crate::decode_err!("engine produced a {}-byte X25519 secret", raw.len());
        }
        derive_shared_secret(&raw, HKDF_INFO_ECDH)
    }
}

impl KeyExchange for EngineX25519 {
    fn level(&self) -> CapabilityLevel {
        CapabilityLevel::EngineClassical
    }

    fn generate_keypair(&mut self) -> Result<PublicKey> {
        super::ensure_no_keypair(&self.public)?;
        let key = super::generate_engine_keypair(
            &self.engine,
            &self.scope,
            X25519_ENGINE_NAME,
            PRIVATE_KEY,
            PUBLIC_KEY,
        )?;
        debug!(scope = %self.scope.dir().display(), "engine X25519 keypair generated");
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

impl KeyAgreement for EngineX25519 {
    fn derive(&mut self, peer: &PublicKey) -> Result<SharedSecret> {
        super::ensure_keypair(&self.public)?;

        with_scratch(&self.scope, &[PEER_KEY, RAW_SECRET], || {
            self.scope.write(PEER_KEY, peer.as_str().as_bytes())?;
            self.derive_raw()
        })
    }
}
