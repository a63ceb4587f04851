//! Symmetric encryption for secret config values.
//!
//! The key is derived deterministically from the process passphrase so that
//! ciphertext written in one run stays readable in the next. A passphrase
//! change makes existing ciphertext undecryptable; the read path degrades to
//! an empty string in that case instead of surfacing an error.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

const KEY_DERIVATION_SALT: &[u8] = b"artifex-secret-v1";
const PBKDF2_ITERATIONS: u32 = 100_000;
const NONCE_SIZE: usize = 12;

/// AES-256-GCM cipher keyed from a process-wide passphrase.
#[derive(Clone)]
pub struct SecretCipher {
    key: [u8; 32],
}

impl SecretCipher {
    pub fn from_passphrase(passphrase: &str) -> Self {
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(
            passphrase.as_bytes(),
            KEY_DERIVATION_SALT,
            PBKDF2_ITERATIONS,
            &mut key,
        );
        Self { key }
    }

    /// Encrypt a value for storage. The nonce is prepended to the
    /// ciphertext and the whole blob is base64 encoded.
    pub fn encrypt(&self, value: &str) -> String {
        if value.is_empty() {
            return String::new();
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = match cipher.encrypt(&nonce, value.as_bytes()) {
            Ok(ciphertext) => ciphertext,
            Err(_) => return String::new(),
        };

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        BASE64.encode(blob)
    }

    /// Decrypt a stored value. Any failure (bad base64, truncated blob,
    /// MAC mismatch after a passphrase change) yields an empty string.
    pub fn decrypt(&self, stored: &str) -> String {
        if stored.is_empty() {
            return String::new();
        }

        let Ok(blob) = BASE64.decode(stored) else {
            return String::new();
        };
        if blob.len() <= NONCE_SIZE {
            return String::new();
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        match cipher.decrypt(Nonce::from_slice(nonce), ciphertext) {
            Ok(plaintext) => String::from_utf8(plaintext).unwrap_or_default(),
            Err(_) => String::new(),
        }
    }
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretCipher(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let cipher = SecretCipher::from_passphrase("correct horse battery staple");
        for value in ["token-123", "x", "a much longer secret with spaces"] {
            let stored = cipher.encrypt(value);
            assert_ne!(stored, value);
            assert_eq!(cipher.decrypt(&stored), value);
        }
    }

    #[test]
    fn empty_value_stays_empty() {
        let cipher = SecretCipher::from_passphrase("pass");
        assert_eq!(cipher.encrypt(""), "");
        assert_eq!(cipher.decrypt(""), "");
    }

    #[test]
    fn nonce_makes_ciphertext_unique() {
        let cipher = SecretCipher::from_passphrase("pass");
        assert_ne!(cipher.encrypt("value"), cipher.encrypt("value"));
    }

    #[test]
    fn wrong_passphrase_reads_empty() {
        let cipher = SecretCipher::from_passphrase("first");
        let stored = cipher.encrypt("secret");
        let other = SecretCipher::from_passphrase("second");
        assert_eq!(other.decrypt(&stored), "");
    }

    #[test]
    fn garbage_input_reads_empty() {
        let cipher = SecretCipher::from_passphrase("pass");
        assert_eq!(cipher.decrypt("not base64 at all!!"), "");
        assert_eq!(cipher.decrypt("YWJj"), "");
    }
}
