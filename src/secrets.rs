//! Secret store access.
//!
//! An offline provisioning pipeline places one secret blob per device plus the
//! two deployment-wide keys in a directory before the service starts. The
//! [`SecretStore`] trait abstracts that layout as a read-only capability, so
//! the transaction handler is decoupled from any particular backend.
//!
//! Reads are synchronous: the blobs are tiny local files and the event loop is
//! single-threaded by design.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::wire::{DeviceId, AUTH_KEY_LEN, ENC_KEY_LEN};
use crate::error::{EnrollError, Result};

/// Read-only provider of per-device secrets and deployment key material.
pub trait SecretStore {
    /// The secret blob provisioned for `id`, or `None` for a device id that
    /// is not part of this deployment.
    fn device_secret(&self, id: DeviceId) -> Result<Option<Vec<u8>>>;

    /// Deployment-wide encryption key.
    fn encryption_key(&self) -> Result<[u8; ENC_KEY_LEN]>;

    /// Deployment-wide authentication key.
    fn auth_key(&self) -> Result<[u8; AUTH_KEY_LEN]>;
}

/// Directory-backed store.
///
/// Layout: `<id>_secret` per device, `enc_key` (16 bytes), `auth_key`
/// (64 bytes), all directly under the store root.
pub struct FsSecretStore {
    root: PathBuf,
}

impl FsSecretStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Read a deployment key blob, using its leading `N` bytes.
    fn read_key<const N: usize>(&self, name: &'static str) -> Result<[u8; N]> {
        let blob = fs::read(self.root.join(name))?;
        if blob.len() < N {
            return Err(EnrollError::BadKeyMaterial {
                name,
                expected: N,
                found: blob.len(),
            });
        }
        let mut key = [0u8; N];
        key.copy_from_slice(&blob[..N]);
        Ok(key)
    }
}

impl SecretStore for FsSecretStore {
    fn device_secret(&self, id: DeviceId) -> Result<Option<Vec<u8>>> {
        match fs::read(self.root.join(format!("{id}_secret"))) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn encryption_key(&self) -> Result<[u8; ENC_KEY_LEN]> {
        self.read_key("enc_key")
    }

    fn auth_key(&self) -> Result<[u8; AUTH_KEY_LEN]> {
        self.read_key("auth_key")
    }
}

/// In-memory store for unit tests and embedded use.
pub struct MemorySecretStore {
    secrets: HashMap<DeviceId, Vec<u8>>,
    enc_key: [u8; ENC_KEY_LEN],
    auth_key: [u8; AUTH_KEY_LEN],
}

impl MemorySecretStore {
    pub fn new(enc_key: [u8; ENC_KEY_LEN], auth_key: [u8; AUTH_KEY_LEN]) -> Self {
        Self {
            secrets: HashMap::new(),
            enc_key,
            auth_key,
        }
    }

    /// Provision a device secret, replacing any existing blob for `id`.
    pub fn provision(&mut self, id: DeviceId, secret: impl Into<Vec<u8>>) {
        self.secrets.insert(id, secret.into());
    }
}

impl SecretStore for MemorySecretStore {
    fn device_secret(&self, id: DeviceId) -> Result<Option<Vec<u8>>> {
        Ok(self.secrets.get(&id).cloned())
    }

    fn encryption_key(&self) -> Result<[u8; ENC_KEY_LEN]> {
        Ok(self.enc_key)
    }

    fn auth_key(&self) -> Result<[u8; AUTH_KEY_LEN]> {
        Ok(self.auth_key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn fs_store_reads_provisioned_blobs() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("7_secret"), [0xAA; 64]).unwrap();
        fs::write(dir.path().join("enc_key"), [0x01; ENC_KEY_LEN]).unwrap();
        fs::write(dir.path().join("auth_key"), [0x02; AUTH_KEY_LEN]).unwrap();

        let store = FsSecretStore::new(dir.path());
        assert_eq!(store.device_secret(7).unwrap(), Some(vec![0xAA; 64]));
        assert_eq!(store.encryption_key().unwrap(), [0x01; ENC_KEY_LEN]);
        assert_eq!(store.auth_key().unwrap(), [0x02; AUTH_KEY_LEN]);
    }

    #[test]
    fn fs_store_missing_device_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsSecretStore::new(dir.path());
        assert!(store.device_secret(42).unwrap().is_none());
    }

    #[test]
    fn fs_store_short_key_blob_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("enc_key"), [0x01; 4]).unwrap();

        let store = FsSecretStore::new(dir.path());
        assert!(matches!(
            store.encryption_key(),
            Err(EnrollError::BadKeyMaterial {
                name: "enc_key",
                found: 4,
                ..
            })
        ));
    }

    #[test]
    fn fs_store_oversized_key_blob_uses_leading_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut blob = vec![0x07; ENC_KEY_LEN];
        blob.extend_from_slice(b"trailing noise");
        fs::write(dir.path().join("enc_key"), &blob).unwrap();

        let store = FsSecretStore::new(dir.path());
        assert_eq!(store.encryption_key().unwrap(), [0x07; ENC_KEY_LEN]);
    }
}
