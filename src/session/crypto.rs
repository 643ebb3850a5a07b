//! Sealing codec for backend identity tokens.
//!
//! Sessions never hold the backend JWT in plaintext; the store keeps the
//! output of [`JwtCodec::encrypt`] and the middleware calls
//! [`JwtCodec::decrypt`] once per authenticated request. Decryption
//! failure is a distinguished error kind: an undecryptable session means
//! server-side key or data corruption, never a client mistake.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, KeyInit, Mac};
use rand::RngExt;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;

/// Codec failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// No encryption key configured
    #[error("session encryption key is not configured")]
    MissingKey,

    /// Ciphertext failed authentication or structural checks
    #[error("failed to decrypt stored token: invalid ciphertext or wrong key")]
    InvalidCiphertext,
}

/// Encrypts/decrypts the JWT held inside a session record.
///
/// Object-safe so tests can substitute a fake; the store's update path
/// uses `encrypt`, the middleware uses `decrypt`.
pub trait JwtCodec: Send + Sync {
    /// Seal a plaintext token for storage.
    fn encrypt(&self, jwt: &str) -> Result<String, CodecError>;

    /// Open a sealed token. Fails with [`CodecError::InvalidCiphertext`]
    /// on tampering or key mismatch.
    fn decrypt(&self, ciphertext: &str) -> Result<String, CodecError>;
}

/// Keyed sealing codec: HMAC-SHA256 keystream cipher with an
/// authentication tag, wire format `base64url(nonce || body || tag)`.
pub struct SealingCodec {
    key: [u8; 32],
}

impl SealingCodec {
    /// Build a codec from arbitrary key material.
    #[must_use]
    pub fn new(key_material: &str) -> Self {
        let digest = Sha256::digest(key_material.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    fn mac(&self, parts: &[&[u8]]) -> [u8; 32] {
        #[allow(clippy::expect_used)]
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        for part in parts {
            mac.update(part);
        }
        mac.finalize().into_bytes().into()
    }

    /// Derive a keystream of `len` bytes from the nonce, counter-mode.
    fn keystream(&self, nonce: &[u8], len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        let mut counter: u64 = 0;
        while out.len() < len {
            let block = self.mac(&[b"keystream", nonce, &counter.to_be_bytes()]);
            out.extend_from_slice(&block);
            counter += 1;
        }
        out.truncate(len);
        out
    }
}

impl JwtCodec for SealingCodec {
    fn encrypt(&self, jwt: &str) -> Result<String, CodecError> {
        let nonce: [u8; NONCE_LEN] = rand::rng().random();

        let mut body = jwt.as_bytes().to_vec();
        for (byte, key) in body.iter_mut().zip(self.keystream(&nonce, jwt.len())) {
            *byte ^= key;
        }

        let tag = self.mac(&[b"tag", &nonce, &body]);

        let mut sealed = Vec::with_capacity(NONCE_LEN + body.len() + TAG_LEN);
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&body);
        sealed.extend_from_slice(&tag[..TAG_LEN]);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CodecError> {
        let sealed = URL_SAFE_NO_PAD
            .decode(ciphertext)
            .map_err(|_| CodecError::InvalidCiphertext)?;
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(CodecError::InvalidCiphertext);
        }

        let (nonce, rest) = sealed.split_at(NONCE_LEN);
        let (body, tag) = rest.split_at(rest.len() - TAG_LEN);

        let expected = self.mac(&[b"tag", nonce, body]);
        if expected[..TAG_LEN].ct_eq(tag).unwrap_u8() != 1 {
            return Err(CodecError::InvalidCiphertext);
        }

        let mut plain = body.to_vec();
        for (byte, key) in plain.iter_mut().zip(self.keystream(nonce, body.len())) {
            *byte ^= key;
        }
        String::from_utf8(plain).map_err(|_| CodecError::InvalidCiphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn roundtrip_recovers_plaintext() {
        let codec = SealingCodec::new("test-key");
        let sealed = codec.encrypt("header.payload.signature").unwrap();
        assert_ne!(sealed, "header.payload.signature");
        assert_eq!(codec.decrypt(&sealed).unwrap(), "header.payload.signature");
    }

    #[test]
    fn ciphertext_is_randomized_per_call() {
        let codec = SealingCodec::new("test-key");
        let a = codec.encrypt("same-token").unwrap();
        let b = codec.encrypt("same-token").unwrap();
        assert_ne!(a, b, "nonce must randomize the sealed output");
    }

    #[test]
    fn wrong_key_is_a_distinguished_error() {
        let sealed = SealingCodec::new("key-one").encrypt("jwt-abc").unwrap();
        let err = SealingCodec::new("key-two").decrypt(&sealed).unwrap_err();
        assert_eq!(err, CodecError::InvalidCiphertext);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let codec = SealingCodec::new("test-key");
        let sealed = codec.encrypt("jwt-abc").unwrap();
        let mut bytes = URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        bytes[NONCE_LEN] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(bytes);
        assert_eq!(codec.decrypt(&tampered).unwrap_err(), CodecError::InvalidCiphertext);
    }

    #[test]
    fn garbage_input_is_rejected() {
        let codec = SealingCodec::new("test-key");
        assert_eq!(codec.decrypt("not base64!!").unwrap_err(), CodecError::InvalidCiphertext);
        assert_eq!(codec.decrypt("").unwrap_err(), CodecError::InvalidCiphertext);
        // Valid base64 but too short to carry nonce + tag
        assert_eq!(codec.decrypt("AAAA").unwrap_err(), CodecError::InvalidCiphertext);
    }

    #[test]
    fn empty_token_roundtrips() {
        let codec = SealingCodec::new("test-key");
        let sealed = codec.encrypt("").unwrap();
        assert_eq!(codec.decrypt(&sealed).unwrap(), "");
    }
}
