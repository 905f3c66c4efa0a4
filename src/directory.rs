//! Recipient directories: the set of public keys messages are encrypted for.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{MatadorError, Result};
use crate::persist;
use crate::types::Recipient;

/// Read and write access to the recipient set.
///
/// Encryption only ever calls [`RecipientDirectory::all_entries`].
pub trait RecipientDirectory {
    /// Every entry, ordered by display name then fingerprint.
    fn all_entries(&self) -> Vec<Recipient>;

    /// Exact fingerprint lookup.
    fn find(&self, fingerprint: &str) -> Option<Recipient>;

    /// Insert or replace the entry with the same fingerprint.
    fn add(&mut self, recipient: Recipient) -> Result<()>;

    /// Remove by exact fingerprint, or by a prefix matching exactly one entry.
    fn remove(&mut self, fingerprint_or_prefix: &str) -> Result<Recipient>;
}

/// Directory held only in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    entries: BTreeMap<String, Recipient>,
}

impl MemoryDirectory {
    /// An empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there is no one to encrypt for.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn matching_key(&self, needle: &str) -> Result<String> {
        if self.entries.contains_key(needle) {
            return Ok(needle.to_string());
        }
        if needle.is_empty() {
            return Err(MatadorError::UnknownRecipient(String::new()));
        }
        let mut hits = self.entries.keys().filter(|k| k.starts_with(needle));
        match (hits.next(), hits.next()) {
            (Some(k), None) => Ok(k.clone()),
            (Some(_), Some(_)) => Err(MatadorError::AmbiguousPrefix(needle.to_string())),
            (None, _) => Err(MatadorError::UnknownRecipient(needle.to_string())),
        }
    }
}

impl FromIterator<Recipient> for MemoryDirectory {
    fn from_iter<I: IntoIterator<Item = Recipient>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|r| (r.fingerprint().to_string(), r))
                .collect(),
        }
    }
}

impl RecipientDirectory for MemoryDirectory {
    fn all_entries(&self) -> Vec<Recipient> {
        let mut all: Vec<Recipient> = self.entries.values().cloned().collect();
        all.sort_by(|a, b| {
            a.name()
                .cmp(b.name())
                .then_with(|| a.fingerprint().cmp(b.fingerprint()))
        });
        all
    }

    fn find(&self, fingerprint: &str) -> Option<Recipient> {
        self.entries.get(fingerprint).cloned()
    }

    fn add(&mut self, recipient: Recipient) -> Result<()> {
        self.entries
            .insert(recipient.fingerprint().to_string(), recipient);
        Ok(())
    }

    fn remove(&mut self, fingerprint_or_prefix: &str) -> Result<Recipient> {
        let key = self.matching_key(fingerprint_or_prefix)?;
        self.entries
            .remove(&key)
            .ok_or(MatadorError::UnknownRecipient(key))
    }
}

/// On-disk form of a directory entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct RecipientRecord {
    name: String,
    /// Base64 PKCS#1 DER.
    public_key: String,
    fingerprint: String,
}

impl RecipientRecord {
    fn from_recipient(r: &Recipient) -> Result<Self> {
        let der = r
            .public_key()
            .to_pkcs1_der()
            .map_err(|_| MatadorError::CorruptKey("public key encoding"))?;
        Ok(Self {
            name: r.name().to_string(),
            public_key: STANDARD.encode(der.as_bytes()),
            fingerprint: r.fingerprint().to_string(),
        })
    }

    fn into_recipient(self) -> Result<Recipient> {
        let der = STANDARD.decode(&self.public_key).map_err(|_| {
            MatadorError::CorruptDirectory(format!("bad base64 key for {}", self.fingerprint))
        })?;
        let key = RsaPublicKey::from_pkcs1_der(&der).map_err(|_| {
            MatadorError::CorruptDirectory(format!("bad public key for {}", self.fingerprint))
        })?;
        let recipient = Recipient::new(self.name, key)?;
        if recipient.fingerprint() != self.fingerprint {
            return Err(MatadorError::CorruptDirectory(format!(
                "fingerprint mismatch for {}",
                self.fingerprint
            )));
        }
        Ok(recipient)
    }
}

/// Directory persisted as a JSON object keyed by fingerprint.
///
/// The file is read once on [`FileDirectory::open`] and rewritten whole,
/// atomically, after every change.
#[derive(Debug)]
pub struct FileDirectory {
    path: PathBuf,
    inner: MemoryDirectory,
}

impl FileDirectory {
    /// Load the directory at `path`. A missing file is an empty directory.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = match persist::read(&path) {
            Ok(bytes) => Self::parse(&bytes)?,
            Err(MatadorError::NotFound(_)) => MemoryDirectory::new(),
            Err(e) => return Err(e),
        };
        debug!(path = %path.display(), entries = inner.len(), "directory loaded");
        Ok(Self { path, inner })
    }

    /// Location of the backing JSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when there is no one to encrypt for.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn parse(bytes: &[u8]) -> Result<MemoryDirectory> {
        let records: BTreeMap<String, RecipientRecord> = serde_json::from_slice(bytes)
            .map_err(|e| MatadorError::CorruptDirectory(e.to_string()))?;
        records
            .into_iter()
            .map(|(key, record)| {
                if key != record.fingerprint {
                    return Err(MatadorError::CorruptDirectory(format!(
                        "entry {key} keyed under the wrong fingerprint"
                    )));
                }
                record.into_recipient()
            })
            .collect()
    }

    fn save(&self) -> Result<()> {
        let records = self
            .inner
            .entries
            .values()
            .map(|r| -> Result<(String, RecipientRecord)> {
                Ok((r.fingerprint().to_string(), RecipientRecord::from_recipient(r)?))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        let json = serde_json::to_vec_pretty(&records)
            .map_err(|e| MatadorError::Io(e.to_string()))?;
        persist::write_atomic(&self.path, &json, false)
    }
}

impl RecipientDirectory for FileDirectory {
    fn all_entries(&self) -> Vec<Recipient> {
        self.inner.all_entries()
    }

    fn find(&self, fingerprint: &str) -> Option<Recipient> {
        self.inner.find(fingerprint)
    }

    fn add(&mut self, recipient: Recipient) -> Result<()> {
        let mut next = self.inner.clone();
        let fingerprint = recipient.fingerprint().to_string();
        next.add(recipient)?;
        let previous = std::mem::replace(&mut self.inner, next);
        if let Err(e) = self.save() {
            self.inner = previous;
            return Err(e);
        }
        info!(%fingerprint, "recipient added");
        Ok(())
    }

    fn remove(&mut self, fingerprint_or_prefix: &str) -> Result<Recipient> {
        let mut next = self.inner.clone();
        let removed = next.remove(fingerprint_or_prefix)?;
        let previous = std::mem::replace(&mut self.inner, next);
        if let Err(e) = self.save() {
            self.inner = previous;
            return Err(e);
        }
        info!(fingerprint = %removed.fingerprint(), "recipient removed");
        Ok(removed)
    }
}
