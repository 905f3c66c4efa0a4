#![allow(clippy::unwrap_used)] // unwrap() is idiomatic in property tests

mod common;

use common::*;
use matador::*;
use proptest::prelude::*;

// RSA operations are slow enough that the default 256 cases per property
// would dominate the suite.
fn config() -> ProptestConfig {
    ProptestConfig::with_cases(24)
}

// ============================================================================
// Property: Round-trip through the armored wire format
// ============================================================================

proptest! {
    #![proptest_config(config())]

    #[test]
    fn prop_roundtrip_every_recipient(
        message in prop::collection::vec(any::<u8>(), 0..4096),
        mask in 1u8..16,
    ) {
        let chosen: Vec<&Identity> = identities()
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, id)| id)
            .collect();

        let envelope = encrypt(&message, &recipients(&chosen))?;
        let armored = codec::serialize(&envelope)?;

        for (i, id) in identities().iter().enumerate() {
            let received = codec::deserialize(&armored)?;
            if mask & (1 << i) != 0 {
                prop_assert_eq!(decrypt(&received, id)?, message.clone());
            } else {
                prop_assert_eq!(decrypt(&received, id), Err(MatadorError::NotAddressed));
            }
        }
    }
}

// ============================================================================
// Property: Any single bit flip is detected
// ============================================================================

proptest! {
    #![proptest_config(config())]

    #[test]
    fn prop_bit_flip_detected(
        message in prop::collection::vec(any::<u8>(), 1..512),
        field in 0usize..3,
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut env = encrypt(&message, &recipients(&[alice(), bob()]))?;
        let target = match field {
            0 => &mut env.nonce,
            1 => &mut env.ciphertext,
            _ => &mut env.wrapped_keys[0].ciphertext,
        };
        let at = index.index(target.len());
        target[at] ^= 1 << bit;

        let result = decrypt(&env, alice());
        prop_assert!(
            matches!(result, Err(MatadorError::Authentication) | Err(MatadorError::Unwrap)),
            "flip in field {} accepted: {:?}", field, result
        );
    }
}

// ============================================================================
// Property: Arbitrary text never parses
// ============================================================================

proptest! {
    #[test]
    fn prop_arbitrary_text_is_corrupt(text in "\\PC*") {
        prop_assert!(matches!(codec::deserialize(&text), Err(MatadorError::Corrupt(_))));
    }
}

proptest! {
    #[test]
    fn prop_random_armored_body_is_corrupt(body in prop::collection::vec(any::<u8>(), 0..600)) {
        let text = pem_rfc7468::encode_string(
            codec::ARMOR_LABEL,
            pem_rfc7468::LineEnding::LF,
            &body,
        ).unwrap();
        prop_assert!(matches!(codec::deserialize(&text), Err(MatadorError::Corrupt(_))));
    }
}

// ============================================================================
// Property: Corrupted armor never yields altered plaintext
// ============================================================================

proptest! {
    #![proptest_config(config())]

    #[test]
    fn prop_corrupted_armor_never_alters_plaintext(
        message in prop::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
        replacement in prop::sample::select(
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/=-\n ".to_vec()
        ),
    ) {
        let armored = codec::serialize(&encrypt(&message, &recipients(&[alice()]))?)?;
        let mut bytes = armored.into_bytes();
        let at = index.index(bytes.len());
        prop_assume!(bytes[at] != replacement);
        bytes[at] = replacement;
        let corrupted = String::from_utf8(bytes).unwrap();

        match codec::deserialize(&corrupted) {
            Err(e) => prop_assert!(matches!(e, MatadorError::Corrupt(_))),
            Ok(env) => match decrypt(&env, alice()) {
                Ok(pt) => prop_assert_eq!(pt, message),
                Err(e) => prop_assert!(matches!(
                    e,
                    MatadorError::Authentication | MatadorError::Unwrap | MatadorError::NotAddressed
                )),
            },
        }
    }
}

// ============================================================================
// Property: Truncation is always a format error
// ============================================================================

proptest! {
    #![proptest_config(config())]

    #[test]
    fn prop_truncated_armor_is_corrupt(
        message in prop::collection::vec(any::<u8>(), 0..256),
        index in any::<prop::sample::Index>(),
    ) {
        let armored = codec::serialize(&encrypt(&message, &recipients(&[alice()]))?)?;
        let cut = index.index(armored.trim_end().len());
        prop_assert!(matches!(
            codec::deserialize(&armored[..cut]),
            Err(MatadorError::Corrupt(_))
        ));
    }
}
