//! ALFA Media Vault - Key Management
//!
//! Derives the master key from the user's password and owns the
//! locked/unlocked session lifecycle.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use parking_lot::RwLock;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::aead::{decrypt_with, encrypt_with};
use crate::error::{VaultError, VaultResult};
use crate::model::PasswordVerifier;
use crate::store::RecordStore;

/// Key length for AES-256
pub const KEY_LEN: usize = 32;

/// IV length for AES-GCM
pub const IV_LEN: usize = 12;

/// Salt length for PBKDF2
pub const SALT_LEN: usize = 16;

/// PBKDF2-HMAC-SHA256 rounds. Changing this breaks every existing vault.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Known plaintext sealed into the password verifier
pub const VERIFIER_PLAINTEXT: &[u8] = b"PASSWORD_CORRECT";

/// Setting keys used by the key manager
pub mod settings {
    pub const SALT: &str = "salt";
    pub const VERIFIER: &str = "verifier";
}

/// 256-bit master key, zeroized on drop
pub struct MasterKey {
    inner: Secret<[u8; KEY_LEN]>,
}

impl MasterKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: Secret::new(bytes),
        }
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }

    /// Generate a random key
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        rand::thread_rng().fill_bytes(&mut bytes[..]);
        Self::new(*bytes)
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

impl Clone for MasterKey {
    fn clone(&self) -> Self {
        Self::new(*self.expose())
    }
}

/// Session state. The key only exists while unlocked.
#[derive(Debug)]
pub enum SessionState {
    Locked,
    Unlocked(MasterKey),
}

/// Derive a key with PBKDF2-HMAC-SHA256, 100k rounds, 256-bit output
pub fn derive_key(password: &str, salt: &[u8]) -> MasterKey {
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut okm[..]);
    MasterKey::new(*okm)
}

/// Generate a random salt
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Generate a random IV for AES-GCM
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

/// Key Manager
///
/// Persists the salt and password verifier in the store's settings and holds
/// the derived master key for the duration of an unlocked session.
pub struct KeyManager {
    store: Arc<RecordStore>,
    state: RwLock<SessionState>,
}

impl KeyManager {
    /// Create a key manager over `store`. Starts locked.
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self {
            store,
            state: RwLock::new(SessionState::Locked),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SETUP / VERIFY
    // ═══════════════════════════════════════════════════════════════════════

    /// True iff a salt has been persisted
    pub fn is_password_set(&self) -> bool {
        match self.load_salt() {
            Ok(salt) => salt.is_some(),
            Err(e) => {
                log::warn!("Could not read vault salt: {}", e);
                false
            }
        }
    }

    /// First-time setup. Leaves the session unlocked.
    pub fn setup_password(&self, password: &str) -> VaultResult<()> {
        if self.load_salt()?.is_some() {
            return Err(VaultError::AlreadyInitialized);
        }

        let salt = generate_salt();
        let key = derive_key(password, &salt);
        let verifier = PasswordVerifier::from_blob(&encrypt_with(&key, VERIFIER_PLAINTEXT)?);

        self.store
            .insert_settings(&[
                (settings::SALT, B64.encode(salt)),
                (settings::VERIFIER, serde_json::to_string(&verifier)?),
            ])
            .map_err(|e| match e {
                VaultError::DuplicateKey { .. } => VaultError::AlreadyInitialized,
                other => other,
            })?;

        *self.state.write() = SessionState::Unlocked(key);
        log::info!("Vault password set up, session unlocked");
        Ok(())
    }

    /// Derive a key from `password` and the persisted salt
    pub fn derive_key(&self, password: &str) -> VaultResult<MasterKey> {
        let salt = self.load_salt()?.ok_or(VaultError::NotInitialized)?;
        Ok(derive_key(password, &salt))
    }

    /// Check a password against the stored verifier. Never errors: any
    /// failure counts as a wrong password. No verifier at all counts as a
    /// first run and passes.
    pub fn verify_password(&self, password: &str) -> bool {
        match self.load_verifier() {
            Ok(None) => true,
            Ok(Some(verifier)) => match self.derive_key(password) {
                Ok(candidate) => Self::opens_verifier(&candidate, &verifier),
                Err(_) => false,
            },
            Err(e) => {
                log::warn!("Could not read password verifier: {}", e);
                false
            }
        }
    }

    /// Verify `password` and hold the derived key
    pub fn unlock(&self, password: &str) -> VaultResult<()> {
        let candidate = self.derive_key(password)?;

        if let Some(verifier) = self.load_verifier()? {
            if !Self::opens_verifier(&candidate, &verifier) {
                log::warn!("Unlock attempt with wrong password");
                return Err(VaultError::InvalidPassword);
            }
        }

        *self.state.write() = SessionState::Unlocked(candidate);
        log::info!("Vault unlocked");
        Ok(())
    }

    fn opens_verifier(candidate: &MasterKey, verifier: &PasswordVerifier) -> bool {
        let Ok(blob) = verifier.to_blob() else {
            return false;
        };
        match decrypt_with(candidate, &blob) {
            Ok(plaintext) => plaintext.as_slice() == VERIFIER_PLAINTEXT,
            Err(_) => false,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SESSION
    // ═══════════════════════════════════════════════════════════════════════

    /// Drop the held key (zeroized on drop). Idempotent.
    pub fn lock(&self) {
        let previous = std::mem::replace(&mut *self.state.write(), SessionState::Locked);
        if let SessionState::Unlocked(key) = previous {
            drop(key);
            log::info!("Vault locked");
        }
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(*self.state.read(), SessionState::Unlocked(_))
    }

    /// A copy of the master key
    pub fn master_key(&self) -> VaultResult<MasterKey> {
        self.with_master_key(MasterKey::clone)
    }

    /// Lend the master key to `f` without copying it. Blocks `lock` until
    /// `f` returns.
    pub fn with_master_key<R>(&self, f: impl FnOnce(&MasterKey) -> R) -> VaultResult<R> {
        match &*self.state.read() {
            SessionState::Unlocked(key) => Ok(f(key)),
            SessionState::Locked => Err(VaultError::Locked),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PERSISTENCE
    // ═══════════════════════════════════════════════════════════════════════

    fn load_salt(&self) -> VaultResult<Option<Vec<u8>>> {
        self.store
            .get_setting(settings::SALT)?
            .map(|b64| B64.decode(b64).map_err(VaultError::from))
            .transpose()
    }

    fn load_verifier(&self) -> VaultResult<Option<PasswordVerifier>> {
        self.store
            .get_setting(settings::VERIFIER)?
            .map(|json| serde_json::from_str(&json).map_err(|e| VaultError::DeserializationError(e.to_string())))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manager() -> KeyManager {
        KeyManager::new(Arc::new(RecordStore::open_in_memory().unwrap()))
    }

    #[test]
    fn test_key_derivation_is_deterministic() {
        let salt = [0x42u8; SALT_LEN];

        let k1 = derive_key("correct horse", &salt);
        let k2 = derive_key("correct horse", &salt);
        assert_eq!(k1.expose(), k2.expose());

        let other_password = derive_key("correct horsf", &salt);
        assert_ne!(k1.expose(), other_password.expose());

        let other_salt = derive_key("correct horse", &[0x43u8; SALT_LEN]);
        assert_ne!(k1.expose(), other_salt.expose());
    }

    #[test]
    fn test_setup_unlocks_and_persists_salt() {
        let km = manager();
        assert!(!km.is_password_set());
        assert!(!km.is_unlocked());

        km.setup_password("hunter22").unwrap();

        assert!(km.is_password_set());
        assert!(km.is_unlocked());
        assert_eq!(
            km.master_key().unwrap().expose(),
            km.derive_key("hunter22").unwrap().expose()
        );
    }

    #[test]
    fn test_setup_twice_fails() {
        let km = manager();
        km.setup_password("first").unwrap();

        let err = km.setup_password("second").unwrap_err();
        assert!(matches!(err, VaultError::AlreadyInitialized));
        assert!(km.verify_password("first"));
        assert!(!km.verify_password("second"));
    }

    #[test]
    fn test_verify_password() {
        let km = manager();
        // First run: nothing to verify against
        assert!(km.verify_password("anything"));

        km.setup_password("s3cret!").unwrap();

        assert!(km.verify_password("s3cret!"));
        assert!(!km.verify_password(""));
        assert!(!km.verify_password("s3cret?"));
        assert!(!km.verify_password("S3cret!"));
        assert!(!km.verify_password("s3cret!!"));
    }

    #[test]
    fn test_lock_is_idempotent() {
        let km = manager();
        km.setup_password("pw").unwrap();

        km.lock();
        km.lock();

        assert!(!km.is_unlocked());
        assert!(matches!(km.master_key(), Err(VaultError::Locked)));
        assert!(matches!(km.with_master_key(|_| ()), Err(VaultError::Locked)));
    }

    #[test]
    fn test_unlock() {
        let km = manager();
        assert!(matches!(km.unlock("pw"), Err(VaultError::NotInitialized)));

        km.setup_password("pw").unwrap();
        let original = km.master_key().unwrap();
        km.lock();

        assert!(matches!(km.unlock("wrong"), Err(VaultError::InvalidPassword)));
        assert!(!km.is_unlocked());

        km.unlock("pw").unwrap();
        assert_eq!(km.master_key().unwrap().expose(), original.expose());
    }

    #[test]
    fn test_password_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.db");

        {
            let km = KeyManager::new(Arc::new(RecordStore::open(&path).unwrap()));
            km.setup_password("persisted").unwrap();
        }

        let km = KeyManager::new(Arc::new(RecordStore::open(&path).unwrap()));
        assert!(km.is_password_set());
        assert!(!km.is_unlocked());
        assert!(km.verify_password("persisted"));
        assert!(!km.verify_password("persisted "));
        km.unlock("persisted").unwrap();
    }
}
