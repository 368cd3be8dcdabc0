//! Lifecycle of the single symmetric encryption key.
//!
//! The key is created on first access and persisted outside the encrypted
//! document directory. It is never rotated and never derived from user
//! input; deleting the key file is the only way to destroy it.

use crate::error::{Result, StoreError};
use chacha20poly1305::aead::OsRng;
use parking_lot::Mutex;
use rand::RngCore;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use zeroize::Zeroizing;

pub const KEY_LEN: usize = 32;

/// 256-bit secret. Byte access stays inside the crate so nothing outside
/// the cipher module ever sees raw key material.
#[derive(Clone)]
pub struct EncryptionKey(Zeroizing<[u8; KEY_LEN]>);

impl EncryptionKey {
    fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut *bytes);
        Self(bytes)
    }

    fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Loads or creates the key file and caches the key for the process
/// lifetime. `key()` is idempotent and side-effect-free after the first
/// successful call.
pub struct KeyManager {
    path: Option<PathBuf>,
    cached: Mutex<Option<EncryptionKey>>,
}

impl KeyManager {
    pub fn new<P: AsRef<Path>>(key_path: P) -> Self {
        Self {
            path: Some(key_path.as_ref().to_path_buf()),
            cached: Mutex::new(None),
        }
    }

    /// Key manager backed by nothing: a fresh random key held only in
    /// memory. Documents sealed under it are unreadable after the process
    /// exits. This is the explicit opt-in for running without a writable
    /// key file; `key()` itself never falls back to it.
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            cached: Mutex::new(Some(EncryptionKey::generate())),
        }
    }

    pub fn key(&self) -> Result<EncryptionKey> {
        let mut cached = self.cached.lock();
        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| StoreError::KeyIo("ephemeral key manager lost its key".to_string()))?;
        let key = load_or_generate(path)?;
        *cached = Some(key.clone());
        Ok(key)
    }
}

fn load_or_generate(path: &Path) -> Result<EncryptionKey> {
    match fs::read(path) {
        Ok(bytes) => key_from_file(path, bytes),
        // NotADirectory: the key's parent does not exist yet either; the
        // persist path below reports what is actually wrong with it.
        Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            let key = EncryptionKey::generate();
            match persist_new_key(path, &key)? {
                Persisted::Written => {
                    info!(path = %path.display(), "generated new encryption key");
                    Ok(key)
                }
                // Lost the create race: another instance wrote the key
                // first. Never overwrite it; read back what won.
                Persisted::AlreadyExists => {
                    let bytes = fs::read(path)
                        .map_err(|e| StoreError::KeyIo(format!("read key file: {e}")))?;
                    key_from_file(path, bytes)
                }
            }
        }
        Err(err) => Err(StoreError::KeyIo(format!("read key file: {err}"))),
    }
}

fn key_from_file(path: &Path, bytes: Vec<u8>) -> Result<EncryptionKey> {
    let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
        StoreError::KeyIo(format!(
            "key file {} holds {} bytes, expected {KEY_LEN}",
            path.display(),
            b.len()
        ))
    })?;
    Ok(EncryptionKey::from_bytes(bytes))
}

enum Persisted {
    Written,
    AlreadyExists,
}

fn persist_new_key(path: &Path, key: &EncryptionKey) -> Result<Persisted> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StoreError::KeyPersist(format!("create key directory: {e}")))?;
    }
    // create_new so an existing key file is never clobbered
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(Persisted::AlreadyExists),
        Err(err) => return Err(StoreError::KeyPersist(format!("create key file: {err}"))),
    };
    if let Err(err) = file
        .write_all(key.as_bytes())
        .and_then(|()| file.sync_all())
    {
        // leave no partial key behind
        drop(file);
        let _ = fs::remove_file(path);
        return Err(StoreError::KeyPersist(format!("write key file: {err}")));
    }
    restrict_file_permissions(path);
    Ok(Persisted::Written)
}

fn restrict_file_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
            tracing::warn!("cannot restrict permissions on {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generates_and_reloads_same_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("encryption_key.bin");
        let first = KeyManager::new(&path).key().unwrap();
        assert!(path.exists());
        let second = KeyManager::new(&path).key().unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn key_is_cached_after_first_call() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("encryption_key.bin");
        let manager = KeyManager::new(&path);
        let first = manager.key().unwrap();
        fs::remove_file(&path).unwrap();
        // still served from the cache
        let second = manager.key().unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn wrong_length_key_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("encryption_key.bin");
        fs::write(&path, b"short").unwrap();
        let err = KeyManager::new(&path).key().unwrap_err();
        assert!(matches!(err, StoreError::KeyIo(_)));
        // the bad file is left untouched for the user to inspect
        assert_eq!(fs::read(&path).unwrap(), b"short");
    }

    #[test]
    fn unwritable_key_location_is_key_persist() {
        let dir = tempdir().unwrap();
        // a file where the parent directory should be
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, b"").unwrap();
        let path = blocker.join("encryption_key.bin");
        let err = KeyManager::new(&path).key().unwrap_err();
        assert!(matches!(err, StoreError::KeyPersist(_)));
    }

    #[test]
    fn ephemeral_manager_needs_no_file() {
        let manager = KeyManager::ephemeral();
        let a = manager.key().unwrap();
        let b = manager.key().unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }
}
