use std::collections::HashSet;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use rayon::prelude::*;
use rsa::Oaep;
use sha2::Sha256;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::directory::RecipientDirectory;
use crate::errors::{MatadorError, Result};
use crate::identity::Identity;
use crate::types::*;

/* ---------------- Symmetric helpers ---------------- */

fn aead_seal(
    key: &[u8; SESSION_KEY_LEN],
    nonce12: &[u8; NONCE_LEN],
    pt: &[u8],
) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .encrypt(Nonce::from_slice(nonce12), pt)
        // only fails for payloads beyond the cipher's length limit
        .map_err(|_| MatadorError::Generation)
}

fn aead_open(key: &[u8; SESSION_KEY_LEN], nonce: &[u8], ct: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(MatadorError::Authentication);
    }
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(Nonce::from_slice(nonce), ct)
        .map_err(|_| MatadorError::Authentication)
}

/* ---------------- Key wrapping ---------------- */

fn wrap_session_key(recipient: &Recipient, session_key: &[u8]) -> Result<WrappedKey> {
    let mut rng = OsRng;
    let ciphertext = recipient
        .public_key()
        .encrypt(&mut rng, Oaep::new::<Sha256>(), session_key)
        .map_err(|_| MatadorError::Wrap(recipient.fingerprint().to_string()))?;
    Ok(WrappedKey {
        fingerprint: recipient.fingerprint().to_string(),
        ciphertext,
    })
}

fn unwrap_session_key(
    identity: &Identity,
    wrapped: &WrappedKey,
) -> Result<Zeroizing<[u8; SESSION_KEY_LEN]>> {
    let recovered = Zeroizing::new(
        identity
            .private_key()
            .decrypt(Oaep::new::<Sha256>(), &wrapped.ciphertext)
            .map_err(|_| MatadorError::Unwrap)?,
    );
    if recovered.len() != SESSION_KEY_LEN {
        return Err(MatadorError::Unwrap);
    }
    let mut key = Zeroizing::new([0u8; SESSION_KEY_LEN]);
    key.copy_from_slice(&recovered);
    Ok(key)
}

/* ---------------- Encrypt ---------------- */

/// Encrypt `plaintext` once and wrap the session key for every recipient.
///
/// Recipients repeating an earlier fingerprint are skipped. Wrapping runs in
/// parallel; the envelope keeps the caller's recipient order. If any wrap
/// fails the whole call fails.
pub fn encrypt(plaintext: &[u8], recipients: &[Recipient]) -> Result<Envelope> {
    if recipients.is_empty() {
        return Err(MatadorError::NoRecipients);
    }

    let mut seen = HashSet::with_capacity(recipients.len());
    let unique: Vec<&Recipient> = recipients
        .iter()
        .filter(|r| {
            let fresh = seen.insert(r.fingerprint());
            if !fresh {
                warn!(fingerprint = %r.fingerprint(), "duplicate recipient skipped");
            }
            fresh
        })
        .collect();

    // Session key
    let mut rng = OsRng;
    let mut session_key = Zeroizing::new([0u8; SESSION_KEY_LEN]);
    rng.try_fill_bytes(&mut session_key[..])
        .map_err(|_| MatadorError::Generation)?;

    // Payload AEAD
    let mut nonce = [0u8; NONCE_LEN];
    rng.try_fill_bytes(&mut nonce)
        .map_err(|_| MatadorError::Generation)?;
    let ciphertext = aead_seal(&session_key, &nonce, plaintext)?;

    // One wrapped key per recipient
    let wrapped_keys = unique
        .par_iter()
        .map(|r| wrap_session_key(r, &session_key[..]))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        recipients = wrapped_keys.len(),
        bytes = plaintext.len(),
        "message encrypted"
    );

    Ok(Envelope {
        nonce: nonce.to_vec(),
        ciphertext,
        wrapped_keys,
    })
}

/// Encrypt for every entry currently in `directory`.
pub fn encrypt_for<D: RecipientDirectory + ?Sized>(
    plaintext: &[u8],
    directory: &D,
) -> Result<Envelope> {
    encrypt(plaintext, &directory.all_entries())
}

/* ---------------- Decrypt ---------------- */

/// Recover the plaintext of `envelope` with the local `identity`.
pub fn decrypt(envelope: &Envelope, identity: &Identity) -> Result<Vec<u8>> {
    let fingerprint = identity.fingerprint();

    // Find my wrapped key
    let wrapped = envelope.wrapped_key_for(fingerprint).ok_or_else(|| {
        debug!(fingerprint = %fingerprint, "no wrapped key for local identity");
        MatadorError::NotAddressed
    })?;

    let session_key = unwrap_session_key(identity, wrapped)?;
    let pt = aead_open(&session_key, &envelope.nonce, &envelope.ciphertext)?;
    debug!(bytes = pt.len(), "message decrypted");
    Ok(pt)
}
