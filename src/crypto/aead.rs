//! ALFA Media Vault - AEAD Encryption
//!
//! AES-256-GCM envelope encryption. Every ciphertext travels with the IV it
//! was produced under; IVs are generated here, never supplied by callers.

use std::sync::Arc;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::keys::{generate_iv, KeyManager, MasterKey, IV_LEN};
use crate::error::{VaultError, VaultResult};

/// GCM authentication tag size
pub const TAG_LEN: usize = 16;

// ═══════════════════════════════════════════════════════════════════════════
// ENVELOPES
// ═══════════════════════════════════════════════════════════════════════════

/// Ciphertext (with tag) and the IV it was sealed under
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    ciphertext: Vec<u8>,
    iv: [u8; IV_LEN],
}

impl EncryptedBlob {
    /// Rebuild a blob from persisted parts
    pub fn from_parts(ciphertext: Vec<u8>, iv: &[u8]) -> VaultResult<Self> {
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| {
            VaultError::DeserializationError(format!(
                "IV must be {} bytes, got {}",
                IV_LEN,
                iv.len()
            ))
        })?;
        Ok(Self { ciphertext, iv })
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    /// Size of the sealed payload including the tag
    pub fn len(&self) -> usize {
        self.ciphertext.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }
}

impl std::fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedBlob")
            .field("len", &self.ciphertext.len())
            .finish()
    }
}

/// Base64 form of an [`EncryptedBlob`], for secrets kept in JSON-like records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedText {
    pub ciphertext: String,
    pub iv: String,
}

impl EncryptedText {
    pub fn from_blob(blob: &EncryptedBlob) -> Self {
        Self {
            ciphertext: B64.encode(&blob.ciphertext),
            iv: B64.encode(blob.iv),
        }
    }

    pub fn to_blob(&self) -> VaultResult<EncryptedBlob> {
        EncryptedBlob::from_parts(B64.decode(&self.ciphertext)?, &B64.decode(&self.iv)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// AES-256-GCM
// ═══════════════════════════════════════════════════════════════════════════

/// Encrypt under `key` with a fresh random IV
pub fn encrypt_with(key: &MasterKey, plaintext: &[u8]) -> VaultResult<EncryptedBlob> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    let iv = generate_iv();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedBlob { ciphertext, iv })
}

/// Decrypt a blob under `key`. Any authentication failure is `Decryption`.
pub fn decrypt_with(key: &MasterKey, blob: &EncryptedBlob) -> VaultResult<Vec<u8>> {
    if blob.ciphertext.len() < TAG_LEN {
        return Err(VaultError::Decryption);
    }

    let cipher = Aes256Gcm::new_from_slice(key.expose()).map_err(|_| VaultError::Decryption)?;

    cipher
        .decrypt(Nonce::from_slice(&blob.iv), blob.ciphertext.as_slice())
        .map_err(|_| VaultError::Decryption)
}

// ═══════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════

/// Encryption Engine
///
/// Encrypts with the session key held by the [`KeyManager`]; fails with
/// `Locked` while the vault is locked. Holds no key material itself.
#[derive(Clone)]
pub struct EncryptionEngine {
    keys: Arc<KeyManager>,
}

impl EncryptionEngine {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// Whether a session key is available right now
    pub fn is_ready(&self) -> bool {
        self.keys.is_unlocked()
    }

    pub fn encrypt_buffer(&self, plaintext: &[u8]) -> VaultResult<EncryptedBlob> {
        self.keys.with_master_key(|key| encrypt_with(key, plaintext))?
    }

    pub fn decrypt_buffer(&self, blob: &EncryptedBlob) -> VaultResult<Vec<u8>> {
        self.keys.with_master_key(|key| decrypt_with(key, blob))?
    }

    pub fn encrypt_text(&self, text: &str) -> VaultResult<EncryptedText> {
        Ok(EncryptedText::from_blob(&self.encrypt_buffer(text.as_bytes())?))
    }

    pub fn decrypt_text(&self, text: &EncryptedText) -> VaultResult<SecretString> {
        let plaintext = self.decrypt_buffer(&text.to_blob()?)?;
        let text = String::from_utf8(plaintext)
            .map_err(|e| VaultError::DeserializationError(e.to_string()))?;
        Ok(SecretString::new(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordStore;
    use secrecy::ExposeSecret;

    fn unlocked_engine() -> (EncryptionEngine, Arc<KeyManager>) {
        let keys = Arc::new(KeyManager::new(Arc::new(RecordStore::open_in_memory().unwrap())));
        keys.setup_password("engine-test").unwrap();
        (EncryptionEngine::new(keys.clone()), keys)
    }

    #[test]
    fn test_aes_gcm_roundtrip() {
        let key = MasterKey::generate();
        let plaintext = b"ALFA Media Vault - Top Secret Photo Data";

        let blob = encrypt_with(&key, plaintext).unwrap();
        assert_eq!(blob.len(), plaintext.len() + TAG_LEN);
        assert_eq!(decrypt_with(&key, &blob).unwrap(), plaintext);
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let key = MasterKey::generate();

        let a = encrypt_with(&key, b"same message").unwrap();
        let b = encrypt_with(&key, b"same message").unwrap();

        assert_ne!(a.iv(), b.iv());
        assert_ne!(a.ciphertext(), b.ciphertext());
        assert_eq!(decrypt_with(&key, &a).unwrap(), b"same message");
        assert_eq!(decrypt_with(&key, &b).unwrap(), b"same message");
    }

    #[test]
    fn test_wrong_key_fails() {
        let blob = encrypt_with(&MasterKey::generate(), b"Secret data").unwrap();
        let result = decrypt_with(&MasterKey::generate(), &blob);

        assert!(matches!(result, Err(VaultError::Decryption)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = MasterKey::generate();
        let blob = encrypt_with(&key, b"Secret photo").unwrap();

        for i in 0..blob.len() {
            let mut tampered = blob.clone();
            tampered.ciphertext[i] ^= 0x01;
            assert!(matches!(decrypt_with(&key, &tampered), Err(VaultError::Decryption)));
        }

        let mut wrong_iv = blob.clone();
        wrong_iv.iv[0] ^= 0x80;
        assert!(matches!(decrypt_with(&key, &wrong_iv), Err(VaultError::Decryption)));

        let truncated = EncryptedBlob::from_parts(vec![0u8; 4], blob.iv()).unwrap();
        assert!(matches!(decrypt_with(&key, &truncated), Err(VaultError::Decryption)));
    }

    #[test]
    fn test_from_parts_checks_iv_length() {
        assert!(EncryptedBlob::from_parts(vec![1, 2, 3], &[0u8; 11]).is_err());
        assert!(EncryptedBlob::from_parts(vec![1, 2, 3], &[0u8; 12]).is_ok());
    }

    #[test]
    fn test_engine_text_roundtrip() {
        let (engine, _) = unlocked_engine();

        let sealed = engine.encrypt_text("sk-live-123").unwrap();
        assert!(!sealed.ciphertext.contains("sk-live"));

        let restored = engine.decrypt_text(&sealed).unwrap();
        assert_eq!(restored.expose_secret(), "sk-live-123");
    }

    #[test]
    fn test_engine_requires_unlock() {
        let (engine, keys) = unlocked_engine();
        let blob = engine.encrypt_buffer(b"payload").unwrap();

        keys.lock();
        assert!(matches!(engine.encrypt_buffer(b"x"), Err(VaultError::Locked)));
        assert!(matches!(engine.decrypt_buffer(&blob), Err(VaultError::Locked)));

        keys.unlock("engine-test").unwrap();
        assert_eq!(engine.decrypt_buffer(&blob).unwrap(), b"payload");
    }
}
