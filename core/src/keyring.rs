//! The approver keyring: a flat JSON file of ed25519 keypairs stored in
//! the clear (spec.md §4.3 — explicitly a demo convenience, not a
//! production posture). Grounded on the original `pat/keys.py`
//! (`ensure_keyring_exists` / `load_keyring` / `save_keyring` /
//! `new_approver_keypair` / `sign_with_approver` / `verify_signature`)
//! and the teacher's `provenance.rs` (`generate_keypair`'s
//! `ed25519_dalek::SigningKey` + `OsRng` + base64 idiom). Keypair bytes
//! are unpadded standard base64 (spec.md §6); the detached signature
//! format keeps the padded alphabet, matching `"ed25519:" + base64(sig)`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::engine::general_purpose::{STANDARD as BASE64, STANDARD_NO_PAD as KEY_BASE64};
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::KeyringEntry;

/// On-disk shape of the keyring file. A `BTreeMap` keeps keys sorted the
/// same way `json.dumps(..., sort_keys=True)` would, so the file the
/// pure Rust writer produces still canonicalizes identically to what the
/// original Python wrote.
#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyringFile {
    #[serde(default)]
    keys: BTreeMap<String, KeyringEntry>,
}

/// A persistent keyring bound to one file path, guarded by a mutex so
/// concurrent `submit`/`approve`/`keys new` calls serialize (spec.md §5).
pub struct Keyring {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Keyring {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Keyring {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn ensure_exists(&self) -> Result<()> {
        if !self.path.exists() {
            let empty = KeyringFile::default();
            let bytes = crate::canon::to_canonical_bytes(&empty)?;
            fs::write(&self.path, bytes).map_err(|e| Error::io(&self.path, e))?;
        }
        Ok(())
    }

    fn load(&self) -> Result<KeyringFile> {
        self.ensure_exists()?;
        let text = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        if text.trim().is_empty() {
            return Ok(KeyringFile::default());
        }
        serde_json::from_str(&text).map_err(|e| Error::LedgerCorruption {
            path: self.path.clone(),
            detail: e.to_string(),
        })
    }

    fn save(&self, data: &KeyringFile) -> Result<()> {
        let bytes = crate::canon::to_canonical_bytes(data)?;
        fs::write(&self.path, bytes).map_err(|e| Error::io(&self.path, e))
    }

    /// List approver ids, sorted.
    pub fn list_approvers(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().unwrap();
        Ok(self.load()?.keys.into_keys().collect())
    }

    /// Generate and persist a new ed25519 keypair for `approver_id`.
    /// Errors with [`Error::KeyExists`] if the id is already present, and
    /// [`Error::InvalidInput`] if it is blank.
    pub fn new_approver(&self, approver_id: &str, clock: &dyn Clock) -> Result<()> {
        let approver_id = approver_id.trim();
        if approver_id.is_empty() {
            return Err(Error::InvalidInput("approver_id required".into()));
        }
        let _guard = self.lock.lock().unwrap();
        let mut kr = self.load()?;
        if kr.keys.contains_key(approver_id) {
            return Err(Error::KeyExists(approver_id.to_string()));
        }

        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key: VerifyingKey = (&signing_key).into();

        kr.keys.insert(
            approver_id.to_string(),
            KeyringEntry {
                alg: "ed25519".into(),
                private_key_b64: KEY_BASE64.encode(signing_key.to_bytes()),
                public_key_b64: KEY_BASE64.encode(verifying_key.to_bytes()),
                created_utc: clock.now_rfc3339(),
            },
        );
        self.save(&kr)
    }

    /// Ensure at least one approver exists, creating the demo approver
    /// `j.wells` if the keyring is empty, and return the lexicographically
    /// first approver id. Mirrors `ensure_demo_approver` in the original
    /// source.
    pub fn ensure_demo_approver(&self, clock: &dyn Clock) -> Result<String> {
        {
            let _guard = self.lock.lock().unwrap();
            let kr = self.load()?;
            if let Some(first) = kr.keys.keys().next() {
                return Ok(first.clone());
            }
        }
        self.new_approver("j.wells", clock)?;
        Ok("j.wells".to_string())
    }

    pub fn public_key_b64(&self, approver_id: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap();
        Ok(self.load()?.keys.get(approver_id).map(|e| e.public_key_b64.clone()))
    }

    /// Sign `message` with `approver_id`'s private key. Returns
    /// `"ed25519:" + base64(signature)`.
    pub fn sign(&self, approver_id: &str, message: &str) -> Result<String> {
        let _guard = self.lock.lock().unwrap();
        let kr = self.load()?;
        let entry = kr
            .keys
            .get(approver_id)
            .ok_or_else(|| Error::UnknownApprover(approver_id.to_string()))?;
        let raw = KEY_BASE64
            .decode(&entry.private_key_b64)
            .map_err(|e| Error::LedgerCorruption { path: self.path.clone(), detail: e.to_string() })?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| Error::LedgerCorruption { path: self.path.clone(), detail: "private key is not 32 bytes".into() })?;
        let signing_key = SigningKey::from_bytes(&bytes);
        let sig = signing_key.sign(message.as_bytes());
        Ok(format!("ed25519:{}", BASE64.encode(sig.to_bytes())))
    }

    /// Verify a `"ed25519:" + base64(sig)` signature over `message`
    /// against `approver_id`'s public key. Never raises; any malformed
    /// input or unknown approver verifies as `false`.
    pub fn verify(&self, approver_id: &str, message: &str, signature: &str) -> bool {
        let Some(sig_b64) = signature.strip_prefix("ed25519:") else { return false };
        let Ok(sig_bytes) = BASE64.decode(sig_b64) else { return false };
        let Ok(sig_arr): std::result::Result<[u8; 64], _> = sig_bytes.try_into() else { return false };
        let signature = ed25519_dalek::Signature::from_bytes(&sig_arr);

        let Ok(Some(pub_b64)) = self.public_key_b64(approver_id) else { return false };
        let Ok(pub_bytes) = KEY_BASE64.decode(&pub_b64) else { return false };
        let Ok(pub_arr): std::result::Result<[u8; 32], _> = pub_bytes.try_into() else { return false };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&pub_arr) else { return false };

        verifying_key.verify(message.as_bytes(), &signature).is_ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[test]
    fn new_approver_then_sign_and_verify_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let kr = Keyring::new(dir.path().join("keys.json"));
        kr.new_approver("alice", &SystemClock).unwrap();

        let sig = kr.sign("alice", "hello").unwrap();
        assert!(sig.starts_with("ed25519:"));
        assert!(kr.verify("alice", "hello", &sig));
        assert!(!kr.verify("alice", "tampered", &sig));
    }

    #[test]
    fn duplicate_approver_id_errors() {
        let dir = tempfile::tempdir().unwrap();
        let kr = Keyring::new(dir.path().join("keys.json"));
        kr.new_approver("alice", &SystemClock).unwrap();
        assert!(matches!(kr.new_approver("alice", &SystemClock), Err(Error::KeyExists(_))));
    }

    #[test]
    fn ensure_demo_approver_creates_j_wells_once() {
        let dir = tempfile::tempdir().unwrap();
        let kr = Keyring::new(dir.path().join("keys.json"));
        let first = kr.ensure_demo_approver(&SystemClock).unwrap();
        assert_eq!(first, "j.wells");
        let second = kr.ensure_demo_approver(&SystemClock).unwrap();
        assert_eq!(second, "j.wells");
        assert_eq!(kr.list_approvers().unwrap(), vec!["j.wells".to_string()]);
    }

    #[test]
    fn unknown_approver_fails_verification_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let kr = Keyring::new(dir.path().join("keys.json"));
        assert!(!kr.verify("nobody", "msg", "ed25519:not-base64!!"));
    }
}
