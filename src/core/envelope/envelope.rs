/*!
The envelope: one sealed message between two ephemeral parties.

```text
receiver                              sender
--------                              ------
let mut rx = Envelope::new()?;
let pk = rx.generate_keypair()?;  -->  let mut tx = Envelope::new()?;
                                       let text = tx.seal(payload, &pk)?;
let payload = rx.open(&text)?;    <--
rx.destroy()?;                         tx.destroy()?;
```

Each instance is single-use. Every key and scratch file lives in the
backend's secure scope, which is shredded by `destroy()` or on drop.
*/

use std::path::Path;

use tracing::{debug, info};

use crate::core::config::EnvelopeConfig;
use crate::core::constants::SELF_TEST_TOKEN;
use crate::core::crypto::capability::{self, Capability, CapabilityInfo, CapabilityLevel};
use crate::core::crypto::cipher::Cipher;
use crate::core::crypto::kex::{Backend, PublicKey};
use crate::core::envelope::format::{KeyMaterial, SealedEnvelope};
use crate::core::envelope::state::{EnvelopeState, StateManager};
use crate::core::error::Result;

/// A single-use envelope endpoint
#[derive(Debug)]
pub struct Envelope {
    capability: Capability,
    config: EnvelopeConfig,
    backend: Backend,
    state: StateManager,
}

impl Envelope {
    /// Create an envelope at the process-wide detected level.
    ///
    /// Configuration comes from the environment.
    pub fn new() -> Result<Self> {
        let config = EnvelopeConfig::from_env()?;
        Self::with_capability(capability::current().clone(), config)
    }

    /// Create an envelope, detecting the level for this configuration
    pub fn with_config(config: EnvelopeConfig) -> Result<Self> {
        config.validate()?;
        let capability = capability::detect_with(&config);
        Self::with_capability(capability, config)
    }

    /// Create an envelope at an explicit level
    pub fn with_capability(capability: Capability, config: EnvelopeConfig) -> Result<Self> {
        let backend = Backend::for_capability(&capability, &config)?;
        debug!(
            level = capability.level.as_u8(),
            scope = %backend.scope().dir().display(),
            "envelope created"
        );
        Ok(Self {
            capability,
            config,
            backend,
            state: StateManager::new(),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> EnvelopeState {
        self.state.state()
    }

    /// Level this envelope runs at
    pub fn level(&self) -> CapabilityLevel {
        self.backend.level()
    }

    /// Algorithm name this envelope runs
    pub fn algorithm(&self) -> &'static str {
        self.backend.algorithm()
    }

    /// Capability this envelope was built from
    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// Public key generated by this envelope, if any
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.backend.public_key()
    }

    /// Directory of the secure scope backing this envelope
    pub fn scope_path(&self) -> &Path {
        self.backend.scope().dir()
    }

    /// Capability report for operators
    pub fn info(&self) -> CapabilityInfo {
        CapabilityInfo::new(&self.capability, &self.config)
    }

    /// Generate this envelope's ephemeral keypair and return the public key
    pub fn generate_keypair(&mut self) -> Result<PublicKey> {
        self.state
            .require(self.state.can_generate_keypair(), EnvelopeState::Created)?;

        match self.backend.generate_keypair() {
            Ok(key) => {
                self.state.transition_to_keypair_generated();
                Ok(key)
            }
            Err(e) => {
                self.state.transition_to_failed();
                Err(e)
            }
        }
    }

    /// Seal `payload` for the holder of `peer`.
    ///
    /// Generates this envelope's own keypair first if there is none yet.
    pub fn seal(&mut self, payload: &[u8], peer: &PublicKey) -> Result<String> {
        self.state
            .require(self.state.can_seal(), "Created or KeypairGenerated")?;

        let result = self.seal_inner(payload, peer);
        if result.is_err() {
            self.state.transition_to_failed();
        }
        result
    }

    /// Open an envelope addressed to this envelope's public key
    pub fn open(&mut self, text: &str) -> Result<Vec<u8>> {
        self.open_checked(text, None)
    }

    /// Open an envelope, deriving against `sender` instead of the key the
    /// envelope carries. KEM envelopes carry no sender key and ignore it.
    pub fn open_with_sender_key(&mut self, text: &str, sender: &PublicKey) -> Result<Vec<u8>> {
        self.open_checked(text, Some(sender))
    }

    /// Shred the scope. Calling it again is a no-op.
    pub fn destroy(&mut self) -> Result<()> {
        if self.state.is_state(EnvelopeState::Destroyed) {
            return Ok(());
        }
        let result = self.backend.cleanup();
        self.state.transition_to_destroyed();
        debug!(scope = %self.scope_path().display(), "envelope destroyed");
        result
    }

    /// Round-trip the self-test token between two envelopes at the
    /// process-wide level
    pub fn self_test() -> Result<bool> {
        let config = EnvelopeConfig::from_env()?;
        Self::self_test_with(capability::current(), &config)
    }

    /// Round-trip the self-test token between two envelopes at `capability`
    pub fn self_test_with(capability: &Capability, config: &EnvelopeConfig) -> Result<bool> {
        let mut receiver = Self::with_capability(capability.clone(), config.clone())?;
        let mut sender = Self::with_capability(capability.clone(), config.clone())?;

        let outcome = (|| {
            let public = receiver.generate_keypair()?;
            let sealed = sender.seal(SELF_TEST_TOKEN.as_bytes(), &public)?;
            receiver.open(&sealed)
        })();

        let sender_cleanup = sender.destroy();
        let receiver_cleanup = receiver.destroy();
        let opened = outcome?;
        sender_cleanup?;
        receiver_cleanup?;

        let ok = opened == SELF_TEST_TOKEN.as_bytes();
        info!(level = capability.level.as_u8(), ok, "self-test finished");
        Ok(ok)
    }

    fn seal_inner(&mut self, payload: &[u8], peer: &PublicKey) -> Result<String> {
        if self.state.is_state(EnvelopeState::Created) {
            self.backend.generate_keypair()?;
            self.state.transition_to_keypair_generated();
        }

        let (exchange, secret) = match &mut self.backend {
            Backend::Kem(kem) => {
                let (ciphertext, secret) = kem.encapsulate(peer)?;
                (KeyMaterial::KemCiphertext(ciphertext), secret)
            }
            Backend::Ecdh(ecdh) => {
                let secret = ecdh.derive(peer)?;
                let own = match ecdh.public_key() {
                    Some(key) => key.clone(),
                    None => return crate::invalid_state_err!("keypair generated", "no keypair"),
                };
                (KeyMaterial::SenderPublicKey(own), secret)
            }
        };
        self.state.transition_to_secret_established();

        let sealed = SealedEnvelope {
            level: self.level(),
            crypto: self.algorithm().to_string(),
            exchange,
            payload: Cipher::new(&secret).encrypt(payload)?,
        };
        drop(secret);

        let text = sealed.encode()?;
        self.state.transition_to_sealed();
        info!(level = sealed.level.as_u8(), "payload sealed");
        Ok(text)
    }

    fn open_checked(&mut self, text: &str, sender: Option<&PublicKey>) -> Result<Vec<u8>> {
        self.state
            .require(self.state.can_open(), EnvelopeState::KeypairGenerated)?;

        let result = self.open_inner(text, sender);
        if result.is_err() {
            self.state.transition_to_failed();
        }
        result
    }

    fn open_inner(&mut self, text: &str, sender: Option<&PublicKey>) -> Result<Vec<u8>> {
        let sealed = SealedEnvelope::decode(text)?;
        if sealed.level != self.level() {
            return crate::envelope_err!(
                "sealed at level {} but this receiver runs level {}",
                sealed.level.as_u8(),
                self.level().as_u8()
            );
        }

        let secret = match (&mut self.backend, &sealed.exchange) {
            (Backend::Kem(kem), KeyMaterial::KemCiphertext(ciphertext)) => {
                kem.decapsulate(ciphertext)?
            }
            (Backend::Ecdh(ecdh), KeyMaterial::SenderPublicKey(carried)) => {
                ecdh.derive(sender.unwrap_or(carried))?
            }
            _ => return crate::envelope_err!("key material does not match level"),
        };
        self.state.transition_to_secret_established();

        let payload = Cipher::new(&secret).decrypt(&sealed.payload)?;
        self.state.transition_to_opened();
        info!(level = sealed.level.as_u8(), "payload opened");
        Ok(payload)
    }

}
