//! Where the identity and recipient files live.

use std::path::{Path, PathBuf};

use crate::directory::FileDirectory;
use crate::errors::Result;
use crate::identity::{public_key_file_name, IdentityStore};

/// Environment variable overriding the working directory.
pub const HOME_ENV: &str = "MATADOR_HOME";

/// File name of the local private key inside the home directory.
pub const PRIVATE_KEY_FILE: &str = "private_key.pem";
/// File name of the recipient directory inside the home directory.
pub const DIRECTORY_FILE: &str = "friends.json";

/// File layout rooted at one directory (the current directory by default).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    home: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Config {
    /// Layout rooted at `home`.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Use `home` when given, otherwise `MATADOR_HOME`, otherwise `.`.
    pub fn resolve(home: Option<PathBuf>) -> Self {
        home.or_else(|| std::env::var_os(HOME_ENV).map(PathBuf::from))
            .map(Self::new)
            .unwrap_or_default()
    }

    /// The directory every other path is relative to.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// `<home>/private_key.pem`.
    pub fn private_key_path(&self) -> PathBuf {
        self.home.join(PRIVATE_KEY_FILE)
    }

    /// `<home>/friends.json`.
    pub fn directory_path(&self) -> PathBuf {
        self.home.join(DIRECTORY_FILE)
    }

    /// Path of the shareable public key for a user called `name`.
    pub fn public_key_path(&self, name: &str) -> PathBuf {
        self.home.join(public_key_file_name(name))
    }

    /// Store for the local identity's private key.
    pub fn identity_store(&self) -> IdentityStore {
        IdentityStore::new(self.private_key_path())
    }

    /// Load the recipient directory, empty if the file does not exist yet.
    pub fn open_directory(&self) -> Result<FileDirectory> {
        FileDirectory::open(self.directory_path())
    }
}
