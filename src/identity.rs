//! Local RSA identity, fingerprints and the private key file.

use std::fmt;
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rsa::pkcs1::{
    DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding,
};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::errors::{MatadorError, Result};
use crate::persist;
use crate::types::Recipient;

/// RSA modulus size for generated identities, and the minimum accepted for
/// recipient keys.
pub const KEY_BITS: usize = 2048;

/// Lowercase hex SHA-256 digest of the PKCS#1 DER encoding of `public_key`.
pub fn fingerprint_of(public_key: &RsaPublicKey) -> Result<String> {
    let der = public_key
        .to_pkcs1_der()
        .map_err(|_| MatadorError::CorruptKey("public key encoding"))?;
    Ok(hex::encode(Sha256::digest(der.as_bytes())))
}

/// Parse an `RSA PUBLIC KEY` PEM block, as written by `matador init`.
pub fn parse_public_key_pem(text: &str) -> Result<RsaPublicKey> {
    let key = RsaPublicKey::from_pkcs1_pem(text.trim())
        .map_err(|_| MatadorError::CorruptKey("expected an RSA PUBLIC KEY block"))?;
    if key.size() * 8 < KEY_BITS {
        return Err(MatadorError::CorruptKey("rsa modulus below 2048 bits"));
    }
    Ok(key)
}

/// File name for a user's shareable public key: lowercase, with whitespace
/// and path separators removed so the file stays in its directory.
pub fn public_key_file_name(name: &str) -> String {
    let stem: String = name
        .chars()
        .filter(|&c| !c.is_whitespace() && c != '/' && c != '\\')
        .flat_map(char::to_lowercase)
        .collect();
    format!("{stem}.pub.pem")
}

/// The local user's keypair.
#[derive(Clone)]
pub struct Identity {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    fingerprint: String,
}

impl Identity {
    /// Generate a fresh 2048-bit RSA identity from the OS random source.
    pub fn generate() -> Result<Self> {
        let mut rng = OsRng;
        let private_key =
            RsaPrivateKey::new(&mut rng, KEY_BITS).map_err(|_| MatadorError::Generation)?;
        let identity = Self::from_private_key(private_key)?;
        debug!(fingerprint = %identity.fingerprint, "generated identity");
        Ok(identity)
    }

    /// Wrap an existing private key, deriving its public half and fingerprint.
    pub fn from_private_key(private_key: RsaPrivateKey) -> Result<Self> {
        let public_key = private_key.to_public_key();
        let fingerprint = fingerprint_of(&public_key)?;
        Ok(Self {
            private_key,
            public_key,
            fingerprint,
        })
    }

    /// Parse an `RSA PRIVATE KEY` PEM block.
    pub fn from_pem(text: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(text.trim())
            .map_err(|_| MatadorError::CorruptKey("expected an RSA PRIVATE KEY block"))?;
        private_key
            .validate()
            .map_err(|_| MatadorError::CorruptKey("inconsistent rsa private key"))?;
        Self::from_private_key(private_key)
    }

    /// Encode the private key as an `RSA PRIVATE KEY` PEM block.
    pub fn to_pem(&self) -> Result<zeroize::Zeroizing<String>> {
        self.private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|_| MatadorError::CorruptKey("private key encoding"))
    }

    /// Encode the public key as an `RSA PUBLIC KEY` PEM block for sharing.
    pub fn public_key_pem(&self) -> Result<String> {
        self.public_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|_| MatadorError::CorruptKey("public key encoding"))
    }

    /// The shareable half of the keypair.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// Lowercase hex SHA-256 of the PKCS#1 DER public key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// The public half of this identity as a directory entry.
    pub fn as_recipient(&self, name: impl Into<String>) -> Recipient {
        Recipient::from_parts(name.into(), self.public_key.clone(), self.fingerprint.clone())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// The private key file backing the local identity.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    /// Store backed by the PEM file at `path`. Nothing is read until
    /// [`IdentityStore::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the private key file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a key file is present.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Generate and persist a new identity.
    ///
    /// Fails with [`MatadorError::AlreadyExists`] if a key file is present and
    /// `overwrite` is false.
    pub fn create(&self, overwrite: bool) -> Result<Identity> {
        if self.exists() && !overwrite {
            return Err(MatadorError::AlreadyExists(self.path.clone()));
        }
        let identity = Identity::generate()?;
        if overwrite {
            self.save(&identity)?;
        } else {
            let pem = identity.to_pem()?;
            persist::write_new(&self.path, pem.as_bytes(), true)?;
        }
        info!(path = %self.path.display(), fingerprint = %identity.fingerprint(), "identity created");
        Ok(identity)
    }

    /// Write `identity` to the key file, replacing whatever is there.
    pub fn save(&self, identity: &Identity) -> Result<()> {
        let pem = identity.to_pem()?;
        persist::write_atomic(&self.path, pem.as_bytes(), true)
    }

    /// Read the identity back from the key file.
    pub fn load(&self) -> Result<Identity> {
        let bytes = zeroize::Zeroizing::new(persist::read(&self.path)?);
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| MatadorError::CorruptKey("key file is not text"))?;
        Identity::from_pem(text)
    }
}
