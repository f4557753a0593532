//! Directory-backed storage of platform authentication material.
//!
//! The session core treats the auth state as an opaque blob: it loads the
//! blob when opening a link and wipes the whole directory on logout or when
//! the platform revokes the session. The on-disk format is owned by this
//! crate and may change between versions.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// Current credential file format version.
const STORE_VERSION: u32 = 1;

/// File name of the credential blob inside the store directory.
const CREDENTIALS_FILE: &str = "credentials.json";

/// Opaque authentication material for one paired session.
///
/// Freshly generated state carries no completed pairing; the platform
/// issues pairing challenges until the link authenticates, after which the
/// wire implementation updates and persists the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    /// File format version.
    pub version: u32,
    /// Random registration identifier presented to the platform.
    pub registration_id: u32,
    /// Static key material, base64-encoded on disk.
    #[serde(with = "secret_serde")]
    pub secret: [u8; 32],
    /// Unix timestamp of generation.
    pub created_at: u64,
}

impl AuthState {
    /// Generate fresh, unpaired auth state.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut secret = [0u8; 32];
        rng.fill(&mut secret);

        Self {
            version: STORE_VERSION,
            registration_id: rng.gen(),
            secret,
            created_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        }
    }
}

/// Serde adapter storing the secret as base64.
mod secret_serde {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(secret: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64.encode(secret))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = BASE64
            .decode(&encoded)
            .map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("secret must be 32 bytes"))
    }
}

/// Directory-backed credential store.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    /// Create a store rooted at the given directory.
    ///
    /// Nothing is touched on disk until [`load_or_create`](Self::load_or_create)
    /// or [`save`](Self::save) runs.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The store's root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    /// Whether a persisted credential blob exists.
    pub fn exists(&self) -> bool {
        self.file_path().is_file()
    }

    /// Load the persisted auth state, generating and persisting fresh state
    /// when none exists yet.
    ///
    /// A present-but-unreadable file is an error rather than a silent
    /// regeneration: regenerating would discard a possibly valid pairing.
    pub fn load_or_create(&self) -> Result<AuthState> {
        let path = self.file_path();

        if !path.is_file() {
            tracing::debug!(dir = %self.dir.display(), "no credentials on disk, generating");
            let auth = AuthState::generate();
            self.save(&auth)?;
            return Ok(auth);
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| TransportError::Store(format!("read {}: {}", path.display(), e)))?;
        let auth: AuthState = serde_json::from_str(&contents)
            .map_err(|e| TransportError::Store(format!("parse {}: {}", path.display(), e)))?;
        Ok(auth)
    }

    /// Persist the auth state.
    ///
    /// Writes to a temporary file in the same directory and renames it over
    /// the final path, so a crash never leaves a partial blob behind.
    pub fn save(&self, auth: &AuthState) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| TransportError::Store(format!("create {}: {}", self.dir.display(), e)))?;

        let path = self.file_path();
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(auth)?;

        fs::write(&tmp, json)
            .map_err(|e| TransportError::Store(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| TransportError::Store(format!("rename {}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), "credentials saved");
        Ok(())
    }

    /// Remove the store directory and everything in it.
    ///
    /// A missing directory is not an error; the next
    /// [`load_or_create`](Self::load_or_create) starts from scratch either
    /// way.
    pub fn wipe(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                tracing::info!(dir = %self.dir.display(), "credential store wiped");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TransportError::Store(format!(
                "wipe {}: {}",
                self.dir.display(),
                e
            ))),
        }
    }
}
