//! # matador
//!
//! Multi-recipient message encryption for small groups. Encrypt a message
//! once and every recipient in your directory can read it with their own
//! private key, with no shared secret or server.
//!
//! ## Algorithm Suite
//!
//! - **Identities:** RSA-2048, stored as PKCS#1 PEM
//! - **Fingerprints:** SHA-256 of the PKCS#1 DER public key, lowercase hex
//! - **Payload Encryption:** ChaCha20-Poly1305 with a fresh 256-bit session key
//! - **Key Wrapping:** RSA-OAEP (SHA-256) of the session key, once per recipient
//! - **Wire Format:** CBOR body inside `MATADOR ENCRYPTED MESSAGE` armor
//!
//! ## Example
//!
//! ```rust,no_run
//! use matador::*;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let alice = Identity::generate()?;
//! let bob = Identity::generate()?;
//!
//! let mut friends = MemoryDirectory::new();
//! friends.add(alice.as_recipient("Alice"))?;
//! friends.add(bob.as_recipient("Bob"))?;
//!
//! let envelope = encrypt_for(b"meet at noon\n", &friends)?;
//! let armored = codec::serialize(&envelope)?;
//!
//! let received = codec::deserialize(&armored)?;
//! assert_eq!(decrypt(&received, &bob)?, b"meet at noon\n");
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Considerations
//!
//! - Fingerprints identify keys; verifying that a key belongs to a person is
//!   left to the users
//! - There is no forward secrecy: a leaked private key exposes every message
//!   addressed to it
//! - Decryption failures after the recipient lookup all report the same
//!   message text

pub mod codec;
pub mod config;
mod crypto;
pub mod directory;
mod errors;
pub mod identity;
mod persist;
mod types;

pub use config::Config;
pub use crypto::*;
pub use directory::{FileDirectory, MemoryDirectory, RecipientDirectory};
pub use errors::{ErrorKind, MatadorError, Result};
pub use identity::{fingerprint_of, parse_public_key_pem, Identity, IdentityStore};
pub use types::*;
