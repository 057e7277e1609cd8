//! AES-256-GCM encryption filter
//!
//! Output layout: `nonce (12 bytes) | ciphertext | tag (16 bytes)`. A fresh
//! random nonce is drawn for every segment.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::FilterError;
use crate::filter::BufferCodec;

/// Nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Encrypts segments with AES-256-GCM
#[derive(Clone)]
pub struct AesGcmFilter {
    key: [u8; 32],
}

impl std::fmt::Debug for AesGcmFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmFilter").finish_non_exhaustive()
    }
}

impl AesGcmFilter {
    /// Create a filter from a raw 256-bit key
    pub fn new(key: [u8; 32]) -> Self {
        AesGcmFilter { key }
    }

    /// Derive the key as the SHA-256 digest of `password`
    pub fn from_password(password: &str) -> Self {
        let digest = Sha256::digest(password.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        AesGcmFilter { key }
    }

    fn cipher(&self, data_len: usize) -> Result<Aes256Gcm, FilterError> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| FilterError::codec(self.codec_id(), "invalid key length", data_len))
    }
}

impl BufferCodec for AesGcmFilter {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, FilterError> {
        let cipher = self.cipher(data.len())?;
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), data)
            .map_err(|_| FilterError::codec(self.codec_id(), "encryption failed", data.len()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decode(&self, data: &[u8], _max_size: usize) -> Result<Vec<u8>, FilterError> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(FilterError::codec(
                self.codec_id(),
                "input shorter than nonce and tag",
                data.len(),
            ));
        }
        let cipher = self.cipher(data.len())?;
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| FilterError::codec(self.codec_id(), "authentication failed", data.len()))
    }

    fn codec_id(&self) -> &str {
        "aes-256-gcm"
    }
}
