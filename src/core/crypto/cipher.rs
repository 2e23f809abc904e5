/*!
Authenticated symmetric encryption of the payload.

AES-256-CBC in the OpenSSL `enc -pbkdf2` layout, followed by an
HMAC-SHA256 tag over the whole frame (Encrypt-then-MAC):

```text
"Salted__" || salt(8) || AES-256-CBC(PKCS#7) ciphertext || HMAC-SHA256(32)
```

The AES key and IV come from PBKDF2-HMAC-SHA256 over the hex form of the
shared secret, salted per message. The tag is checked in constant time
before any decryption happens.
*/

use aes::Aes256;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::core::constants::{
    defaults::PBKDF2_ITERATIONS,
    sizes::{
        MAC_TAG_BYTES,
        aes::{BLOCK_SIZE, HEADER_SIZE, KEY_SIZE, SALT_MAGIC, SALT_SIZE},
    },
};
use crate::core::error::{Error, Result};
use crate::core::memory::SharedSecret;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Cipher bound to one shared secret
pub struct Cipher<'a> {
    key: &'a SharedSecret,
    iterations: u32,
}

impl<'a> Cipher<'a> {
    /// Create a cipher with the default PBKDF2 work factor
    pub fn new(key: &'a SharedSecret) -> Self {
        Self::with_iterations(key, PBKDF2_ITERATIONS)
    }

    /// Create a cipher with an explicit PBKDF2 work factor
    pub fn with_iterations(key: &'a SharedSecret, iterations: u32) -> Self {
        Self { key, iterations }
    }

    /// Encrypt and authenticate `plaintext`
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut salt = [0u8; SALT_SIZE];
        rand::rng().fill_bytes(&mut salt);

        let (aes_key, iv) = self.derive_key_iv(&salt);
        let ciphertext = Aes256CbcEnc::new_from_slices(&aes_key[..], &iv[..])
            .map_err(|_e| Error::MalformedInput("invalid cipher key length".into()))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut out = Vec::with_capacity(HEADER_SIZE + ciphertext.len() + MAC_TAG_BYTES);
        out.extend_from_slice(SALT_MAGIC);
        out.extend_from_slice(&salt);
        out.extend_from_slice(&ciphertext);

        let tag = self.mac()?.chain_update(&out).finalize().into_bytes();
        out.extend_from_slice(&tag);
        Ok(out)
    }

    /// Verify and decrypt an authenticated ciphertext
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < MAC_TAG_BYTES {
            return crate::input_err!("ciphertext shorter than the authentication tag");
        }
        let (frame, tag) = data.split_at(data.len() - MAC_TAG_BYTES);

        self.mac()?
            .chain_update(frame)
            .verify_slice(tag)
            .map_err(|_e| Error::Integrity)?;

        let (salt, body) = parse_frame(frame)?;
        let (aes_key, iv) = self.derive_key_iv(salt);
        Aes256CbcDec::new_from_slices(&aes_key[..], &iv[..])
            .map_err(|_e| Error::MalformedInput("invalid cipher key length".into()))?
            .decrypt_padded_vec_mut::<Pkcs7>(body)
            .map_err(|_e| Error::Integrity)
    }

    /// AES key and IV for one salt; both are wiped on drop
    fn derive_key_iv(
        &self,
        salt: &[u8],
    ) -> (Zeroizing<[u8; KEY_SIZE]>, Zeroizing<[u8; BLOCK_SIZE]>) {
        let password = Zeroizing::new(hex::encode(self.key.as_bytes()));
        let mut okm = Zeroizing::new([0u8; KEY_SIZE + BLOCK_SIZE]);
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.iterations, &mut okm[..]);

        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        let mut iv = Zeroizing::new([0u8; BLOCK_SIZE]);
        key.copy_from_slice(&okm[..KEY_SIZE]);
        iv.copy_from_slice(&okm[KEY_SIZE..]);
        (key, iv)
    }

    fn mac(&self) -> Result<HmacSha256> {
        <HmacSha256 as Mac>::new_from_slice(self.key.as_bytes())
            .map_err(|_e| Error::MalformedInput("invalid MAC key length".into()))
    }
}

/// Encrypt `plaintext` under `key` with the default work factor
pub fn encrypt(plaintext: &[u8], key: &SharedSecret) -> Result<Vec<u8>> {
    Cipher::new(key).encrypt(plaintext)
}

/// Decrypt `data` under `key` with the default work factor
pub fn decrypt(data: &[u8], key: &SharedSecret) -> Result<Vec<u8>> {
    Cipher::new(key).decrypt(data)
}

/// Split an authenticated frame into salt and block-aligned body
fn parse_frame(frame: &[u8]) -> Result<(&[u8], &[u8])> {
    if frame.len() < HEADER_SIZE + BLOCK_SIZE {
        return crate::input_err!("ciphertext frame too short");
    }
    if !frame.starts_with(SALT_MAGIC) {
        return crate::input_err!("missing salt header");
    }
    let body = &frame[HEADER_SIZE..];
    if body.len() % BLOCK_SIZE != 0 {
        return crate::input_err!("ciphertext is not block aligned");
    }
    Ok((&frame[SALT_MAGIC.len()..HEADER_SIZE], body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::sizes::SHARED_SECRET_BYTES;

    fn key(byte: u8) -> SharedSecret {
        SharedSecret::from_bytes([byte; SHARED_SECRET_BYTES])
    }

    // Low work factor keeps the exhaustive tamper test fast
    fn fast(key: &SharedSecret) -> Cipher<'_> {
        Cipher::with_iterations(key, 10)
    }

    #[test]
    fn test_encrypt_decrypt() -> Result<()> {
        let key = key(0x42);
        let data = b"This is a test message";

        let encrypted = encrypt(data, &key)?;
        assert!(encrypted.starts_with(SALT_MAGIC));
        assert_eq!(decrypt(&encrypted, &key)?, data);

        // Fresh salt per call
        let encrypted2 = encrypt(data, &key)?;
        assert_ne!(encrypted, encrypted2);
        Ok(())
    }

    #[test]
    fn test_payload_shapes() -> Result<()> {
        let key = key(7);
        let cipher = fast(&key);
        let long = vec![0xA5u8; 1 << 16];
        let payloads: [&[u8]; 5] = [b"", b"a\0b", &[0xff, 0x00, 0x80], b"0123456789abcdef", long.as_slice()];

        for payload in payloads {
            let encrypted = cipher.encrypt(payload)?;
            // Padding always adds at least one byte
            let body = encrypted.len() - HEADER_SIZE - MAC_TAG_BYTES;
            assert_eq!(body, (payload.len() / BLOCK_SIZE + 1) * BLOCK_SIZE);
            assert_eq!(cipher.decrypt(&encrypted)?, payload);
        }
        Ok(())
    }

    #[test]
    fn test_every_bit_flip_detected() -> Result<()> {
        let key = key(0x42);
        let cipher = fast(&key);
        let encrypted = cipher.encrypt(b"tamper target")?;

        for byte in 0..encrypted.len() {
            for bit in 0..8 {
                let mut tampered = encrypted.clone();
                tampered[byte] ^= 1 << bit;
                assert!(
                    matches!(cipher.decrypt(&tampered), Err(Error::Integrity)),
                    "flip of bit {} in byte {} went undetected",
                    bit,
                    byte
                );
            }
        }
        Ok(())
    }

    #[test]
    fn test_wrong_key() -> Result<()> {
        let encrypted = encrypt(b"secret", &key(1))?;
        assert!(matches!(decrypt(&encrypted, &key(2)), Err(Error::Integrity)));
        Ok(())
    }

    #[test]
    fn test_short_input() {
        let key = key(3);
        for len in [0, 1, MAC_TAG_BYTES - 1] {
            assert!(matches!(
                decrypt(&vec![0u8; len], &key),
                Err(Error::MalformedInput(_))
            ));
        }
    }

    #[test]
    fn test_truncation_detected() -> Result<()> {
        let key = key(4);
        let cipher = fast(&key);
        let encrypted = cipher.encrypt(b"truncate me")?;

        for cut in 1..encrypted.len() {
            let result = cipher.decrypt(&encrypted[..encrypted.len() - cut]);
            assert!(matches!(
                result,
                Err(Error::Integrity) | Err(Error::MalformedInput(_))
            ));
        }
        Ok(())
    }

    #[test]
    fn test_valid_mac_over_bad_frame() -> Result<()> {
        // A correctly tagged frame without the salt header
        let key = key(5);
        let cipher = fast(&key);
        let frame = vec![0u8; HEADER_SIZE + BLOCK_SIZE];
        let mut data = frame.clone();
        data.extend_from_slice(&cipher.mac()?.chain_update(&frame).finalize().into_bytes());

        assert!(matches!(cipher.decrypt(&data), Err(Error::MalformedInput(_))));
        Ok(())
    }
}
