use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

const NONCE_LEN: usize = 12;

/// AES-256-GCM sealing for queue payloads. Queued tasks carry the caller's
/// provider credential and both images, so they never sit in Redis in the clear.
pub struct EnvelopeCipher {
    cipher: Aes256Gcm,
}

impl EnvelopeCipher {
    /// Create from a base64-encoded 32-byte key.
    pub fn new(key_base64: &str) -> Result<Self, EncryptionError> {
        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(key_base64)
            .map_err(|_| EncryptionError::InvalidKey)?;

        if key_bytes.len() != 32 {
            return Err(EncryptionError::InvalidKey);
        }

        let cipher =
            Aes256Gcm::new_from_slice(&key_bytes).map_err(|_| EncryptionError::InvalidKey)?;

        Ok(Self { cipher })
    }

    /// Serialize `value` to JSON, encrypt it, and return
    /// `base64(nonce || ciphertext)`.
    pub fn seal<T: Serialize>(&self, value: &T) -> Result<String, EncryptionError> {
        let plaintext = serde_json::to_vec(value)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| EncryptionError::EncryptFailed)?;

        let mut sealed = nonce.to_vec();
        sealed.extend(ciphertext);
        Ok(base64::engine::general_purpose::STANDARD.encode(sealed))
    }

    /// Reverse of [`EnvelopeCipher::seal`].
    pub fn open<T: DeserializeOwned>(&self, sealed: &str) -> Result<T, EncryptionError> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(sealed)
            .map_err(|_| EncryptionError::DecryptFailed)?;

        if data.len() < NONCE_LEN {
            return Err(EncryptionError::DecryptFailed);
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| EncryptionError::DecryptFailed)?;

        Ok(serde_json::from_slice(&plaintext)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("Invalid encryption key (must be 32 bytes, base64-encoded)")]
    InvalidKey,

    #[error("Encryption failed")]
    EncryptFailed,

    #[error("Decryption failed")]
    DecryptFailed,

    #[error("Envelope payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tryon::{TryOnSubmission, TryOnTask};
    use uuid::Uuid;

    fn key() -> String {
        base64::engine::general_purpose::STANDARD.encode([7u8; 32])
    }

    #[test]
    fn test_rejects_short_key() {
        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
        assert!(matches!(EnvelopeCipher::new(&short), Err(EncryptionError::InvalidKey)));
        assert!(EnvelopeCipher::new("not base64!").is_err());
    }

    #[test]
    fn test_sealed_task_hides_credential() {
        let cipher = EnvelopeCipher::new(&key()).unwrap();
        let task = TryOnTask::new(
            Uuid::new_v4(),
            TryOnSubmission {
                person_image: vec![1, 2],
                clothing_image: vec![3],
                api_key: "sg_secret_value".to_string(),
            },
        );

        let sealed = cipher.seal(&task).unwrap();
        assert!(!sealed.contains("sg_secret_value"));

        let opened: TryOnTask = cipher.open(&sealed).unwrap();
        assert_eq!(opened.job_id, task.job_id);
        assert_eq!(opened.api_key, "sg_secret_value");
    }

    #[test]
    fn test_other_key_cannot_open() {
        let sealed = EnvelopeCipher::new(&key()).unwrap().seal(&"hello").unwrap();
        let other = base64::engine::general_purpose::STANDARD.encode([9u8; 32]);
        let result: Result<String, _> = EnvelopeCipher::new(&other).unwrap().open(&sealed);
        assert!(matches!(result, Err(EncryptionError::DecryptFailed)));
    }
}
