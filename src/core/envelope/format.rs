/*!
Envelope wire format.

An envelope travels as standard base64 of a JSON object:

```text
{
  "version": 1,
  "level": 1..=3,
  "crypto": "<algorithm name>",
  "kem_ciphertext": "<base64>",        // level 3 only
  "sender_public_key": "<PEM text>",   // levels 1 and 2 only
  "encrypted_payload": "<base64>"
}
```

Exactly one of `kem_ciphertext` / `sender_public_key` is present, matching
the level. Absent fields are omitted rather than written as `null`.
*/

use std::convert::TryFrom;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::core::constants::VERSION;
use crate::core::crypto::capability::CapabilityLevel;
use crate::core::crypto::kex::PublicKey;
use crate::core::error::{Error, Result};

/// The JSON object as it appears on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub version: u32,
    pub level: u8,
    pub crypto: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kem_ciphertext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_public_key: Option<String>,
    pub encrypted_payload: String,
}

/// How the receiver re-establishes the shared secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// ML-KEM ciphertext to decapsulate
    KemCiphertext(Vec<u8>),
    /// Sender's ephemeral X25519 public key to derive against
    SenderPublicKey(PublicKey),
}

/// A validated, decoded envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedEnvelope {
    pub level: CapabilityLevel,
    pub crypto: String,
    pub exchange: KeyMaterial,
    /// Authenticated ciphertext (`cipher` framing plus tag)
    pub payload: Vec<u8>,
}

impl SealedEnvelope {
    /// Serialize to the transport text form
    pub fn encode(&self) -> Result<String> {
        let (kem_ciphertext, sender_public_key) = match &self.exchange {
            KeyMaterial::KemCiphertext(ct) => (Some(STANDARD.encode(ct)), None),
            KeyMaterial::SenderPublicKey(key) => (None, Some(key.as_str().to_string())),
        };

        let wire = WireEnvelope {
            version: VERSION,
            level: self.level.as_u8(),
            crypto: self.crypto.clone(),
            kem_ciphertext,
            sender_public_key,
            encrypted_payload: STANDARD.encode(&self.payload),
        };

        let json = serde_json::to_vec(&wire)
            .map_err(|e| Error::MalformedEnvelope(format!("serialization failed: {}", e)))?;
        Ok(STANDARD.encode(json))
    }

    /// Parse and validate the transport text form
    pub fn decode(text: &str) -> Result<Self> {
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        if compact.is_empty() {
            return crate::envelope_err!("empty envelope");
        }

        let json = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| Error::MalformedEnvelope(format!("outer encoding: {}", e)))?;
        let wire: WireEnvelope = serde_json::from_slice(&json)
            .map_err(|e| Error::MalformedEnvelope(format!("invalid JSON: {}", e)))?;

        Self::try_from(wire)
    }
}

impl TryFrom<WireEnvelope> for SealedEnvelope {
    type Error = Error;

    fn try_from(wire: WireEnvelope) -> Result<Self> {
        if wire.version != VERSION {
            return crate::envelope_err!("unsupported version {}", wire.version);
        }

        let level = CapabilityLevel::try_from(wire.level)?;
        if level == CapabilityLevel::None {
            return crate::envelope_err!("envelope claims no capability");
        }

        let exchange = match (level.uses_kem(), wire.kem_ciphertext, wire.sender_public_key) {
            (true, Some(ct), None) => {
                let ct = decode_field("kem_ciphertext", &ct)?;
                if ct.is_empty() {
                    return crate::envelope_err!("empty kem_ciphertext");
                }
                KeyMaterial::KemCiphertext(ct)
            }
            (false, None, Some(key)) => KeyMaterial::SenderPublicKey(
                PublicKey::from_pem(&key)
                    .map_err(|_e| Error::MalformedEnvelope("invalid sender_public_key".into()))?,
            ),
            (_, Some(_), Some(_)) => {
                return crate::envelope_err!("both kem_ciphertext and sender_public_key present");
            }
            (true, _, _) => return crate::envelope_err!("level {} requires kem_ciphertext", level),
            (false, _, _) => {
                return crate::envelope_err!("level {} requires sender_public_key", level);
            }
        };

        Ok(Self {
            level,
            crypto: wire.crypto,
            exchange,
            payload: decode_field("encrypted_payload", &wire.encrypted_payload)?,
        })
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value.as_bytes())
        .map_err(|e| Error::MalformedEnvelope(format!("{}: {}", name, e)))
}
