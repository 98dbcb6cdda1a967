//! Symmetric encryption for persisted credentials.
//!
//! Both directions are total: any failure degrades to identity and is logged, so the vault
//! keeps working without a usable key. The result types record which path was taken.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::core::storage::KeyValueStore;

/// Storage key holding the generated key material (base64, 32 bytes).
pub const KEY_MATERIAL_KEY: &str = "tokendeck_ek";

/// Deploy-time secret. Read from the runtime environment first, then from the build environment.
pub const ENCRYPTION_KEY_ENV: &str = "TOKENDECK_ENCRYPTION_KEY";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sealed {
    Encrypted(String),
    /// Encryption failed or is unavailable; the value is stored as given.
    Plaintext(String),
}

impl Sealed {
    pub fn as_str(&self) -> &str {
        match self {
            Sealed::Encrypted(s) | Sealed::Plaintext(s) => s,
        }
    }

    pub fn into_inner(self) -> String {
        match self {
            Sealed::Encrypted(s) | Sealed::Plaintext(s) => s,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Sealed::Encrypted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opened {
    Decrypted(String),
    /// Input was not ciphertext under the current key; returned unchanged.
    Passthrough(String),
}

impl Opened {
    pub fn into_inner(self) -> String {
        match self {
            Opened::Decrypted(s) | Opened::Passthrough(s) => s,
        }
    }

    pub fn was_decrypted(&self) -> bool {
        matches!(self, Opened::Decrypted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Deploy,
    Stored,
    Generated,
}

pub struct Cipher {
    aead: Option<Aes256Gcm>,
    source: Option<KeySource>,
}

impl Cipher {
    /// Resolve the process key: deploy secret, then stored key material, then a fresh random key.
    pub fn resolve(store: &dyn KeyValueStore) -> Self {
        Self::resolve_with(deploy_secret(), store)
    }

    pub fn resolve_with(deploy_secret: Option<String>, store: &dyn KeyValueStore) -> Self {
        if let Some(secret) = deploy_secret.filter(|s| !s.trim().is_empty()) {
            debug!("Using deploy-time encryption key");
            return Self::from_key(&key_from_secret(secret.trim()), KeySource::Deploy);
        }

        match store.get(KEY_MATERIAL_KEY) {
            Ok(Some(stored)) if !stored.trim().is_empty() => {
                debug!("Using stored encryption key");
                return Self::from_key(&key_from_secret(stored.trim()), KeySource::Stored);
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to read stored encryption key: {}", e),
        }

        let key: [u8; 32] = rand::random();
        let encoded = base64::engine::general_purpose::STANDARD.encode(key);
        if let Err(e) = store.set(KEY_MATERIAL_KEY, &encoded) {
            warn!("Failed to persist generated encryption key: {}", e);
        }
        debug!("Generated new encryption key");
        Self::from_key(&key, KeySource::Generated)
    }

    pub fn from_key(key: &[u8; 32], source: KeySource) -> Self {
        match Aes256Gcm::new_from_slice(key) {
            Ok(aead) => Self {
                aead: Some(aead),
                source: Some(source),
            },
            Err(e) => {
                warn!("Cipher unavailable, credentials will be stored unencrypted: {}", e);
                Self::unavailable()
            }
        }
    }

    /// A cipher whose backend is missing. Both directions are identity.
    pub fn unavailable() -> Self {
        Self {
            aead: None,
            source: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.aead.is_some()
    }

    pub fn key_source(&self) -> Option<KeySource> {
        self.source
    }

    /// Encrypt to base64(nonce || ciphertext).
    pub fn seal(&self, plaintext: &str) -> Sealed {
        let Some(aead) = &self.aead else {
            warn!("Cipher is not available, storing value unencrypted");
            return Sealed::Plaintext(plaintext.to_string());
        };

        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);
        match aead.encrypt(nonce, plaintext.as_bytes()) {
            Ok(ciphertext) => {
                let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
                combined.extend_from_slice(&nonce_bytes);
                combined.extend_from_slice(&ciphertext);
                Sealed::Encrypted(base64::engine::general_purpose::STANDARD.encode(&combined))
            }
            Err(e) => {
                warn!("Encryption failed, storing value unencrypted: {}", e);
                Sealed::Plaintext(plaintext.to_string())
            }
        }
    }

    pub fn open(&self, encoded: &str) -> Opened {
        let Some(aead) = &self.aead else {
            return Opened::Passthrough(encoded.to_string());
        };

        let Ok(combined) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
            return Opened::Passthrough(encoded.to_string());
        };
        if combined.len() < NONCE_LEN + TAG_LEN {
            return Opened::Passthrough(encoded.to_string());
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        match aead.decrypt(nonce, ciphertext) {
            Ok(plaintext) => match String::from_utf8(plaintext) {
                Ok(s) => Opened::Decrypted(s),
                Err(_) => {
                    warn!("Decrypted value is not valid UTF-8, treating as plaintext");
                    Opened::Passthrough(encoded.to_string())
                }
            },
            Err(_) => {
                debug!("Value did not decrypt under the current key, treating as plaintext");
                Opened::Passthrough(encoded.to_string())
            }
        }
    }

    pub fn encrypt_str(&self, plaintext: &str) -> String {
        self.seal(plaintext).into_inner()
    }

    pub fn decrypt_str(&self, encoded: &str) -> String {
        self.open(encoded).into_inner()
    }
}

fn deploy_secret() -> Option<String> {
    std::env::var(ENCRYPTION_KEY_ENV)
        .ok()
        .or_else(|| option_env!("TOKENDECK_ENCRYPTION_KEY").map(str::to_string))
}

/// 32-byte base64 key material is used directly; anything else is stretched with SHA-256.
fn key_from_secret(secret: &str) -> [u8; 32] {
    if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(secret)
        && let Ok(key) = <[u8; 32]>::try_from(bytes.as_slice())
    {
        return key;
    }
    let digest = Sha256::digest(secret.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}
