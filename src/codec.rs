//! Armored text encoding of envelopes.
//!
//! The body is the CBOR encoding of [`Envelope`] (fields `nonce`,
//! `ciphertext`, `wrapped_keys`), wrapped in RFC 7468 style armor:
//!
//! ```text
//! -----BEGIN MATADOR ENCRYPTED MESSAGE-----
//! 2dn3o2Vub25jZUw...
//! -----END MATADOR ENCRYPTED MESSAGE-----
//! ```

use std::collections::HashSet;

use pem_rfc7468::LineEnding;
use tracing::warn;

use crate::errors::{MatadorError, Result};
use crate::types::{from_cbor, is_fingerprint, to_cbor_canonical, Envelope, NONCE_LEN, TAG_LEN};

/// Armor label identifying a Matador message.
pub const ARMOR_LABEL: &str = "MATADOR ENCRYPTED MESSAGE";

const BEGIN: &str = "-----BEGIN MATADOR ENCRYPTED MESSAGE-----";
const END: &str = "-----END MATADOR ENCRYPTED MESSAGE-----";

/// Render `envelope` as armored text ending in a newline.
pub fn serialize(envelope: &Envelope) -> Result<String> {
    let body = to_cbor_canonical(envelope)?;
    pem_rfc7468::encode_string(ARMOR_LABEL, LineEnding::LF, &body)
        .map_err(|_| MatadorError::Corrupt("armor encoding"))
}

/// Parse armored text back into an [`Envelope`].
///
/// Text before the BEGIN line and after the END line is ignored, so a message
/// pasted together with surrounding chat still parses. Everything between the
/// two lines must be intact.
pub fn deserialize(text: &str) -> Result<Envelope> {
    let armored = extract_armor(text).map_err(reject)?;
    let (label, body) = pem_rfc7468::decode_vec(armored.as_bytes())
        .map_err(|_| reject(MatadorError::Corrupt("invalid armor")))?;
    if label != ARMOR_LABEL {
        return Err(reject(MatadorError::Corrupt("unexpected armor label")));
    }
    let envelope: Envelope = from_cbor(&body).map_err(reject)?;
    if to_cbor_canonical(&envelope)? != body {
        return Err(reject(MatadorError::Corrupt("non-canonical encoding")));
    }
    validate(&envelope).map_err(reject)?;
    Ok(envelope)
}

fn reject(e: MatadorError) -> MatadorError {
    warn!(error = %e, "rejected envelope");
    e
}

fn extract_armor(text: &str) -> Result<&str> {
    let start = text
        .find(BEGIN)
        .ok_or(MatadorError::Corrupt("missing armor header"))?;
    let rest = &text[start..];
    let end = rest
        .find(END)
        .ok_or(MatadorError::Corrupt("missing armor footer"))?;
    Ok(&rest[..end + END.len()])
}

fn validate(envelope: &Envelope) -> Result<()> {
    if envelope.nonce.len() != NONCE_LEN {
        return Err(MatadorError::Corrupt("nonce length"));
    }
    if envelope.ciphertext.len() < TAG_LEN {
        return Err(MatadorError::Corrupt("ciphertext shorter than tag"));
    }
    let mut seen = HashSet::with_capacity(envelope.wrapped_keys.len());
    for wrapped in &envelope.wrapped_keys {
        if !is_fingerprint(&wrapped.fingerprint) {
            return Err(MatadorError::Corrupt("fingerprint format"));
        }
        if !seen.insert(wrapped.fingerprint.as_str()) {
            return Err(MatadorError::Corrupt("duplicate recipient"));
        }
        if wrapped.ciphertext.is_empty() {
            return Err(MatadorError::Corrupt("empty wrapped key"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WrappedKey;

    fn sample() -> Envelope {
        Envelope {
            nonce: vec![9u8; NONCE_LEN],
            ciphertext: vec![1u8; 40],
            wrapped_keys: vec![WrappedKey {
                fingerprint: "ab".repeat(32),
                ciphertext: vec![2u8; 256],
            }],
        }
    }

    #[test]
    fn armor_has_label_lines() {
        let text = serialize(&sample()).unwrap();
        assert!(text.starts_with(BEGIN));
        assert!(text.trim_end().ends_with(END));
        assert!(text.lines().all(|l| l.len() <= 64));
    }

    #[test]
    fn surrounding_text_is_ignored() {
        let text = format!("hey, here it is:\n\n{}\nthanks!\n", serialize(&sample()).unwrap());
        assert_eq!(deserialize(&text).unwrap(), sample());
    }

    #[test]
    fn relabeled_armor_is_rejected() {
        let text = serialize(&sample())
            .unwrap()
            .replace("MATADOR ENCRYPTED MESSAGE", "PGP MESSAGE");
        assert_eq!(deserialize(&text), Err(MatadorError::Corrupt("missing armor header")));
    }

    #[test]
    fn trailing_cbor_bytes_are_rejected() {
        let mut body = to_cbor_canonical(&sample()).unwrap();
        body.push(0x00);
        let text = pem_rfc7468::encode_string(ARMOR_LABEL, LineEnding::LF, &body).unwrap();
        assert_eq!(deserialize(&text), Err(MatadorError::Corrupt("cbor structure")));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        #[derive(serde::Serialize)]
        struct Extended<'a> {
            #[serde(with = "serde_bytes")]
            nonce: &'a [u8],
            #[serde(with = "serde_bytes")]
            ciphertext: &'a [u8],
            wrapped_keys: &'a [WrappedKey],
            version: u8,
        }
        let env = sample();
        let body = to_cbor_canonical(&Extended {
            nonce: &env.nonce,
            ciphertext: &env.ciphertext,
            wrapped_keys: &env.wrapped_keys,
            version: 2,
        })
        .unwrap();
        let text = pem_rfc7468::encode_string(ARMOR_LABEL, LineEnding::LF, &body).unwrap();
        assert_eq!(deserialize(&text), Err(MatadorError::Corrupt("cbor structure")));
    }

    #[test]
    fn structural_limits_are_enforced() {
        let mut short_nonce = sample();
        short_nonce.nonce.pop();
        let mut bad_fp = sample();
        bad_fp.wrapped_keys[0].fingerprint = "AB".repeat(32);
        let mut short_ct = sample();
        short_ct.ciphertext.truncate(TAG_LEN - 1);

        for (env, reason) in [
            (short_nonce, "nonce length"),
            (bad_fp, "fingerprint format"),
            (short_ct, "ciphertext shorter than tag"),
        ] {
            let text = serialize(&env).unwrap();
            assert_eq!(deserialize(&text), Err(MatadorError::Corrupt(reason)));
        }
    }

    #[test]
    fn repeated_fingerprint_is_rejected() {
        let mut env = sample();
        let mut second = env.wrapped_keys[0].clone();
        second.ciphertext = vec![3u8; 256];
        env.wrapped_keys.push(second);
        let text = serialize(&env).unwrap();
        assert_eq!(deserialize(&text), Err(MatadorError::Corrupt("duplicate recipient")));
    }

    #[test]
    fn byte_strings_must_use_canonical_form() {
        #[derive(serde::Serialize)]
        struct ArrayNonce<'a> {
            nonce: &'a [u8],
            #[serde(with = "serde_bytes")]
            ciphertext: &'a [u8],
            wrapped_keys: &'a [WrappedKey],
        }
        let env = sample();
        let body = to_cbor_canonical(&ArrayNonce {
            nonce: &env.nonce,
            ciphertext: &env.ciphertext,
            wrapped_keys: &env.wrapped_keys,
        })
        .unwrap();
        let text = pem_rfc7468::encode_string(ARMOR_LABEL, LineEnding::LF, &body).unwrap();
        assert_eq!(deserialize(&text), Err(MatadorError::Corrupt("non-canonical encoding")));
    }

    #[test]
    fn non_cbor_body_is_rejected() {
        let text = pem_rfc7468::encode_string(ARMOR_LABEL, LineEnding::LF, b"hello").unwrap();
        assert!(matches!(deserialize(&text), Err(MatadorError::Corrupt(_))));
    }
}
