//! Encrypted document store: the contract consumed by the application layer.
//!
//! Each named collection is one file in the document directory holding one
//! sealed blob. Saves are whole-collection overwrites committed with an
//! atomic replace: bytes land in a `.staging` sibling first and are renamed
//! over the document only after a successful sync, so a reader never sees a
//! half-written file. Concurrent access to the same name from multiple
//! threads is serialized by a per-name lock; cross-process callers must
//! bring their own coordination.

use crate::cipher;
use crate::codec;
use crate::error::{Result, StoreError};
use crate::keys::KeyManager;
use crate::paths;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

const STAGING_SUFFIX: &str = ".staging";

pub struct DocumentStore {
    documents_dir: PathBuf,
    keys: Arc<KeyManager>,
    name_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DocumentStore {
    pub fn new<P: AsRef<Path>>(documents_dir: P, keys: Arc<KeyManager>) -> Result<Self> {
        let documents_dir = documents_dir.as_ref().to_path_buf();
        fs::create_dir_all(&documents_dir)?;
        cleanup_staging_files(&documents_dir);
        Ok(Self {
            documents_dir,
            keys,
            name_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Store rooted at the platform document directory.
    pub fn open_default(keys: Arc<KeyManager>) -> Result<Self> {
        Self::new(paths::documents_dir()?, keys)
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    /// Encode, seal and atomically replace the document named `name`.
    pub fn save<T: Serialize>(&self, collection: &T, name: &str) -> Result<()> {
        validate_name(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.lock();

        let key = self.keys.key()?;
        let encoded = codec::encode(collection)?;
        let blob = cipher::seal(&key, &encoded)?;
        self.write_atomic(name, &blob)
    }

    /// Read, open and decode the document named `name`.
    ///
    /// A missing document is `NotFound`; falling back to an empty
    /// collection is the caller's policy, never the store's.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        validate_name(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.lock();

        let path = self.documents_dir.join(name);
        let blob = match fs::read(&path) {
            Ok(blob) => blob,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()));
            }
            Err(err) => return Err(StoreError::Io(err)),
        };
        let key = self.keys.key()?;
        let plaintext = cipher::open(&key, &blob)?;
        codec::decode(&plaintext)
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.documents_dir.join(name).exists()
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.name_locks.lock();
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let staging_path = self
            .documents_dir
            .join(format!("{}.{}{}", name, Uuid::new_v4(), STAGING_SUFFIX));
        {
            let mut file = File::create(&staging_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        let dest = self.documents_dir.join(name);
        if let Err(err) = fs::rename(&staging_path, &dest) {
            let _ = fs::remove_file(&staging_path);
            return Err(StoreError::Io(err));
        }
        fsync_dir(&self.documents_dir)?;
        Ok(())
    }
}

/// Document names address files directly inside the document directory.
fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.ends_with(STAGING_SUFFIX)
        || name == paths::BACKUPS_DIR_NAME;
    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Remove any leftover `.staging` files from a previous crash.
fn cleanup_staging_files(documents_dir: &Path) {
    if let Ok(entries) = fs::read_dir(documents_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(STAGING_SUFFIX) {
                warn!(path = %entry.path().display(), "removing orphaned staging file");
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}

fn fsync_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = OpenOptions::new().read(true).open(path)?;
        dir.sync_all()?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
