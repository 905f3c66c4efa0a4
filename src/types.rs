//! Envelope and recipient types, plus CBOR helpers for the wire body.

use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};

use crate::errors::{MatadorError, Result};
use crate::identity::fingerprint_of;

/// Length in bytes of the per-message session key.
pub const SESSION_KEY_LEN: usize = 32;

/// Length in bytes of the payload nonce.
pub const NONCE_LEN: usize = 12;

/// Length in bytes of the Poly1305 tag appended to the ciphertext.
pub const TAG_LEN: usize = 16;

/// Length of a hex-encoded SHA-256 fingerprint.
pub const FINGERPRINT_LEN: usize = 64;

/// A public key the user has chosen to encrypt for.
///
/// The fingerprint is always derived from the key, so two recipients built
/// from the same key compare equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    name: String,
    public_key: RsaPublicKey,
    fingerprint: String,
}

impl Recipient {
    /// Build a recipient, computing its fingerprint.
    pub fn new(name: impl Into<String>, public_key: RsaPublicKey) -> Result<Self> {
        let fingerprint = fingerprint_of(&public_key)?;
        Ok(Self {
            name: name.into(),
            public_key,
            fingerprint,
        })
    }

    /// Caller guarantees `fingerprint == fingerprint_of(&public_key)`.
    pub(crate) fn from_parts(name: String, public_key: RsaPublicKey, fingerprint: String) -> Self {
        Self {
            name,
            public_key,
            fingerprint,
        }
    }

    /// Display name chosen when the recipient was added.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key the session key is wrapped under.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Lowercase hex SHA-256 of the PKCS#1 DER public key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Session key wrapped for a single recipient.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WrappedKey {
    /// Fingerprint of the recipient public key that can unwrap `ciphertext`.
    pub fingerprint: String,
    /// RSA-OAEP(SHA-256) encryption of the raw session key.
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
}

/// One encrypted message addressed to one or more recipients.
///
/// Field order here is the field order on the wire.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    /// 12-byte nonce used to seal the payload.
    #[serde(with = "serde_bytes")]
    pub nonce: Vec<u8>,
    /// ChaCha20-Poly1305 ciphertext with the 16-byte tag appended.
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
    /// One entry per recipient, unique by fingerprint.
    pub wrapped_keys: Vec<WrappedKey>,
}

impl Envelope {
    /// Linear scan for the wrapped key addressed to `fingerprint`.
    pub fn wrapped_key_for(&self, fingerprint: &str) -> Option<&WrappedKey> {
        self.wrapped_keys.iter().find(|w| w.fingerprint == fingerprint)
    }

    /// Fingerprints this envelope is addressed to, in wire order.
    pub fn recipient_fingerprints(&self) -> impl Iterator<Item = &str> {
        self.wrapped_keys.iter().map(|w| w.fingerprint.as_str())
    }
}

/// True if `s` looks like a fingerprint: 64 lowercase hex characters.
pub fn is_fingerprint(s: &str) -> bool {
    s.len() == FINGERPRINT_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Serialize a value to CBOR, prefixed with the self-describe tag.
///
/// Struct fields are written in declaration order, so the output is
/// deterministic for a given value.
pub fn to_cbor_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = serde_cbor::ser::Serializer::new(&mut buf);
    ser.self_describe()
        .map_err(|_| MatadorError::Corrupt("cbor encoding"))?;
    v.serialize(&mut ser)
        .map_err(|_| MatadorError::Corrupt("cbor encoding"))?;
    Ok(buf)
}

/// Deserialize a value from CBOR. Trailing bytes after the value are rejected.
pub fn from_cbor<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
    serde_cbor::from_slice::<T>(data).map_err(|_| MatadorError::Corrupt("cbor structure"))
}
