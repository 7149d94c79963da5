//! Reversible encryption for secrets kept in the option store.
//!
//! Sealed values are XChaCha20-Poly1305 ciphertext with the nonce prepended,
//! base64 encoded so they fit in a JSON string.

use core::fmt;
use std::sync::Arc;

use base64::prelude::*;
use orion::aead;

/// Symmetric key used to protect stored secrets such as the SMTP password.
///
/// Cheap to clone. The key bytes never appear in `Debug` output.
#[derive(Clone)]
pub struct EncryptionKey(Arc<aead::SecretKey>);

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Base64 error {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Utf8 error {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Unknown crypto error")]
    Unknown,
}

impl From<orion::errors::UnknownCryptoError> for CryptoError {
    fn from(_err: orion::errors::UnknownCryptoError) -> Self {
        CryptoError::Unknown
    }
}

impl EncryptionKey {
    /// Parses a base64 encoded 32 byte key.
    pub fn try_from_base64(val: &str) -> Result<EncryptionKey, CryptoError> {
        let bytes = BASE64_STANDARD.decode(val.trim().as_bytes())?;
        EncryptionKey::try_from(bytes.as_slice())
    }

    /// Generates a fresh random key, base64 encoded for use in `MAILWRIGHT_ENCRYPTION_KEY`.
    pub fn generate_base64() -> String {
        let key = aead::SecretKey::default();
        BASE64_STANDARD.encode(key.unprotected_as_bytes())
    }

    /// Encrypts `plaintext` on a blocking thread. A fresh nonce is generated
    /// per call, so sealing the same text twice gives different output.
    pub async fn seal_bytes(&self, plaintext: Vec<u8>) -> Result<Vec<u8>, CryptoError> {
        let key = self.0.clone();
        tokio::task::spawn_blocking(move || aead::seal(&key, &plaintext))
            .await
            .map_err(|_| CryptoError::Unknown)?
            .map_err(CryptoError::from)
    }

    /// Inverse of [`seal_bytes`](Self::seal_bytes). Fails on a wrong key or
    /// tampered input.
    pub async fn open_bytes(&self, sealed: Vec<u8>) -> Result<Vec<u8>, CryptoError> {
        let key = self.0.clone();
        tokio::task::spawn_blocking(move || aead::open(&key, &sealed))
            .await
            .map_err(|_| CryptoError::Unknown)?
            .map_err(CryptoError::from)
    }

    /// Seals a string into its base64 storage form.
    pub async fn seal(&self, plaintext: &str) -> Result<String, CryptoError> {
        let sealed = self.seal_bytes(plaintext.as_bytes().to_vec()).await?;
        Ok(BASE64_STANDARD.encode(sealed))
    }

    /// Opens a value produced by [`seal`](Self::seal).
    pub async fn open(&self, stored: &str) -> Result<String, CryptoError> {
        let sealed = BASE64_STANDARD.decode(stored.trim().as_bytes())?;
        Ok(String::from_utf8(self.open_bytes(sealed).await?)?)
    }
}

impl TryFrom<&[u8]> for EncryptionKey {
    type Error = CryptoError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let key = aead::SecretKey::from_slice(bytes)?;
        Ok(EncryptionKey(Arc::new(key)))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}
