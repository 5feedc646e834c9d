//! AES-256-GCM sealing of session records
//!
//! Sealed format: `nonce (12 bytes) || ciphertext+tag`. The associated data
//! names the slot a record was written to, so a record copied under another
//! key fails to open.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

use crate::error::SessionError;

const AES_GCM_NONCE_BYTES: usize = 12;

pub struct RecordSealer {
    cipher: Aes256Gcm,
}

impl RecordSealer {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.into()),
        }
    }

    pub fn seal(&self, slot: &str, plaintext: &[u8]) -> Result<Vec<u8>, SessionError> {
        let mut nonce = [0_u8; AES_GCM_NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: slot.as_bytes(),
                },
            )
            .map_err(|_| SessionError::Backend("session record encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(AES_GCM_NONCE_BYTES + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn open(&self, slot: &str, sealed: &[u8]) -> Result<Vec<u8>, SessionError> {
        if sealed.len() <= AES_GCM_NONCE_BYTES {
            return Err(SessionError::Corrupt);
        }

        let (nonce, ciphertext) = sealed.split_at(AES_GCM_NONCE_BYTES);
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: slot.as_bytes(),
                },
            )
            .map_err(|_| SessionError::Corrupt)
    }
}
