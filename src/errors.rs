//! Error types for matador operations.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MatadorError>;

/// Errors that can occur while managing identities and recipients, or while
/// encrypting, decrypting and (de)serializing envelopes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatadorError {
    /// Encryption was requested with an empty recipient set.
    #[error("no recipients to encrypt for")]
    NoRecipients,

    /// Armored envelope text failed validation.
    #[error("corrupt message: {0}")]
    Corrupt(&'static str),

    /// A private or public key file could not be parsed.
    #[error("invalid key material: {0}")]
    CorruptKey(&'static str),

    /// The recipient directory file could not be parsed.
    #[error("corrupt recipient directory: {0}")]
    CorruptDirectory(String),

    /// No directory entry matches the given fingerprint or prefix.
    #[error("no recipient matches {0}")]
    UnknownRecipient(String),

    /// A fingerprint prefix matches more than one directory entry.
    #[error("fingerprint prefix {0} matches more than one recipient")]
    AmbiguousPrefix(String),

    /// The random source or RSA key generation failed.
    #[error("key generation failed")]
    Generation,

    /// Wrapping the session key for the recipient with this fingerprint failed.
    #[error("failed to wrap session key for {0}")]
    Wrap(String),

    /// The wrapped session key could not be recovered with the local private key.
    #[error("unable to decrypt message")]
    Unwrap,

    /// The message ciphertext failed authentication.
    ///
    /// Renders identically to [`MatadorError::Unwrap`].
    #[error("unable to decrypt message")]
    Authentication,

    /// The envelope carries no wrapped key for the local identity.
    #[error("message is not addressed to this identity")]
    NotAddressed,

    /// A required file does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Refused to replace an existing file.
    #[error("already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// Any other filesystem failure.
    #[error("i/o error: {0}")]
    Io(String),
}

/// Coarse grouping of [`MatadorError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: key files, envelope text, recipient selection.
    Input,
    /// A cryptographic primitive rejected its input.
    Crypto,
    /// The local identity may not read the message.
    Access,
    /// Identity or directory storage failed.
    Persistence,
}

impl MatadorError {
    /// Which part of the taxonomy this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoRecipients
            | Self::Corrupt(_)
            | Self::CorruptKey(_)
            | Self::CorruptDirectory(_)
            | Self::UnknownRecipient(_)
            | Self::AmbiguousPrefix(_) => ErrorKind::Input,
            Self::Generation | Self::Wrap(_) | Self::Unwrap | Self::Authentication => {
                ErrorKind::Crypto
            }
            Self::NotAddressed => ErrorKind::Access,
            Self::NotFound(_) | Self::AlreadyExists(_) | Self::Io(_) => ErrorKind::Persistence,
        }
    }
}

impl From<std::io::Error> for MatadorError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
