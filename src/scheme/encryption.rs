//! Encryption strategies
//!
//! A cipher instance carries its own key material, so registering a keyed
//! cipher under a scheme name is what binds a key to volumes using that name.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{ArchiveError, Result};

/// AES-GCM nonce length
const NONCE_LEN: usize = 12;

/// Encryption capability resolved by scheme name
pub trait Cipher: Send + Sync {
    /// Scheme token this strategy is registered under
    fn name(&self) -> &str;

    /// Encrypt compressed page bytes
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Reverse `encrypt`; authentication failures are errors
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>>;
}

// =============================================================================
// Identity
// =============================================================================

/// Pass-through cipher registered as `"none"`
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEncryption;

impl Cipher for NoEncryption {
    fn name(&self) -> &str {
        "none"
    }

    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

// =============================================================================
// AES-256-GCM
// =============================================================================

/// AES-256-GCM with a random nonce per page.
///
/// Output layout: `nonce (12) | ciphertext | tag (16)`.
pub struct Aes256GcmCipher {
    name: String,
    cipher: Aes256Gcm,
}

impl Aes256GcmCipher {
    /// Cipher with a raw 256-bit key
    pub fn new(name: impl Into<String>, key: &[u8; 32]) -> Self {
        Self {
            name: name.into(),
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Cipher whose key is the SHA-256 digest of `passphrase`
    pub fn from_passphrase(name: impl Into<String>, passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self::new(name, &key)
    }
}

impl std::fmt::Debug for Aes256GcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aes256GcmCipher")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Cipher for Aes256GcmCipher {
    fn name(&self) -> &str {
        &self.name
    }

    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), data)
            .map_err(|_| ArchiveError::Codec(format!("{}: encryption failed", self.name)))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_LEN {
            return Err(ArchiveError::Codec(format!(
                "{}: ciphertext shorter than nonce ({} bytes)",
                self.name,
                data.len()
            )));
        }
        let (nonce, sealed) = data.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| ArchiveError::Codec(format!("{}: authentication failed", self.name)))
    }
}
