//! Authenticated encryption of document bytes.
//!
//! A sealed blob is self-describing: the 24-byte XChaCha20-Poly1305 nonce
//! followed by ciphertext and Poly1305 tag. Any bit flip anywhere in the
//! blob makes `open` fail closed with an authentication error.

use crate::error::{Result, StoreError};
use crate::keys::EncryptionKey;
use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;

pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;

pub fn seal(key: &EncryptionKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = generate_nonce();
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "seal failed",
            ))
        })?;
    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

pub fn open(key: &EncryptionKey, blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(StoreError::MalformedBlob {
            len: blob.len(),
            min: NONCE_LEN + TAG_LEN,
        });
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| StoreError::Authentication)
}

fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyManager;

    fn test_key() -> EncryptionKey {
        KeyManager::ephemeral().key().unwrap()
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = test_key();
        let blob = seal(&key, b"the quick brown fox").unwrap();
        assert_eq!(open(&key, &blob).unwrap(), b"the quick brown fox");
    }

    #[test]
    fn fresh_nonce_per_seal() {
        let key = test_key();
        let a = seal(&key, b"same plaintext").unwrap();
        let b = seal(&key, b"same plaintext").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn every_byte_flip_fails_closed() {
        let key = test_key();
        let blob = seal(&key, b"tamper me").unwrap();
        for i in 0..blob.len() {
            let mut corrupted = blob.clone();
            corrupted[i] ^= 0x01;
            assert!(
                matches!(open(&key, &corrupted), Err(StoreError::Authentication)),
                "flip at byte {i} was not detected"
            );
        }
    }

    #[test]
    fn wrong_key_fails_closed() {
        let blob = seal(&test_key(), b"secret").unwrap();
        assert!(matches!(
            open(&test_key(), &blob),
            Err(StoreError::Authentication)
        ));
    }

    #[test]
    fn short_blob_is_malformed() {
        let key = test_key();
        let err = open(&key, &[0u8; NONCE_LEN + TAG_LEN - 1]).unwrap_err();
        assert!(matches!(err, StoreError::MalformedBlob { .. }));
        let err = open(&key, b"").unwrap_err();
        assert!(matches!(err, StoreError::MalformedBlob { len: 0, .. }));
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let key = test_key();
        let blob = seal(&key, b"").unwrap();
        assert_eq!(blob.len(), NONCE_LEN + TAG_LEN);
        assert_eq!(open(&key, &blob).unwrap(), b"");
    }
}
