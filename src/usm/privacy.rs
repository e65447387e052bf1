//! AES-128-CFB privacy (RFC 3826).
//!
//! The 16-byte IV is the concatenation of the message's
//! authoritativeEngineBoots (4 bytes big-endian), authoritativeEngineTime
//! (4 bytes big-endian), and the 8-byte salt carried in privacyParameters.
//! Concatenation, not XOR; CFB needs no padding, so ciphertext and
//! plaintext lengths match.

use std::sync::atomic::{AtomicU64, Ordering};

use aes::Aes128;
use bytes::Bytes;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoErrorKind, Error, Result};
use crate::usm::auth::password_to_key;

type Aes128CfbEnc = cfb_mode::Encryptor<Aes128>;
type Aes128CfbDec = cfb_mode::Decryptor<Aes128>;

/// AES-128 key length; only the first 16 bytes of a localized key are used.
pub const KEY_LEN: usize = 16;

/// Length of the salt carried in privacyParameters.
pub const SALT_LEN: usize = 8;

/// Generate a random non-zero u64 for salt initialization.
fn random_nonzero_u64() -> u64 {
    let mut buf = [0u8; 8];
    loop {
        getrandom::fill(&mut buf).expect("getrandom failed");
        let val = u64::from_ne_bytes(buf);
        if val != 0 {
            return val;
        }
    }
}

/// Thread-safe salt counter for encryption-side salt generation.
///
/// Starts from cryptographic randomness and never yields zero, so IVs are
/// not reused across restarts or on wraparound.
pub struct SaltCounter(AtomicU64);

impl SaltCounter {
    /// Create a counter seeded from the OS random source.
    pub fn new() -> Self {
        Self(AtomicU64::new(random_nonzero_u64()))
    }

    /// Create a counter starting at a specific value (tests).
    pub fn from_value(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Next salt value; skips zero on wraparound.
    pub fn next(&self) -> u64 {
        let val = self.0.fetch_add(1, Ordering::SeqCst);
        if val == 0 {
            self.0.fetch_add(1, Ordering::SeqCst)
        } else {
            val
        }
    }
}

impl Default for SaltCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Localized AES-128 privacy key.
///
/// Key material is zeroed from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey {
    key: Vec<u8>,
}

impl PrivKey {
    /// Derive a privacy key from a password and engine ID.
    ///
    /// Uses the same RFC 3414 A.2 derivation as authentication keys; the
    /// localized SHA-1 output is 20 bytes, of which AES-128 uses the first
    /// 16.
    pub fn from_password(password: &[u8], engine_id: &[u8]) -> Self {
        Self {
            key: password_to_key(password, engine_id).to_vec(),
        }
    }

    /// Create from raw localized key bytes; at least 16 bytes required.
    pub fn from_bytes(key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        if key.len() < KEY_LEN {
            return Err(Error::decrypt(
                None,
                CryptoErrorKind::InvalidKeyLength {
                    expected: KEY_LEN,
                    actual: key.len(),
                },
            ));
        }
        Ok(Self { key })
    }

    fn iv(engine_boots: i32, engine_time: i32, salt: &[u8]) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
        iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
        iv[8..].copy_from_slice(salt);
        iv
    }

    /// Encrypt a plaintext ScopedPDU, returning
    /// `(ciphertext, privacyParameters)`.
    ///
    /// The salt becomes the privacyParameters value verbatim (8 bytes
    /// big-endian); draw it from a [`SaltCounter`].
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        engine_boots: i32,
        engine_time: i32,
        salt: u64,
    ) -> Result<(Bytes, Bytes)> {
        let salt_bytes = salt.to_be_bytes();
        let iv = Self::iv(engine_boots, engine_time, &salt_bytes);

        let cipher = Aes128CfbEnc::new_from_slices(&self.key[..KEY_LEN], &iv)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::CipherError))?;

        let mut buffer = plaintext.to_vec();
        cipher.encrypt(&mut buffer);

        Ok((Bytes::from(buffer), Bytes::copy_from_slice(&salt_bytes)))
    }

    /// Decrypt a ciphertext using the privacyParameters from the message.
    ///
    /// The output has the same length as the input. A wrong key or salt
    /// produces garbage rather than an error here; the ScopedPDU decoder
    /// rejects it when the plaintext does not begin with a SEQUENCE tag.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        engine_boots: i32,
        engine_time: i32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        if priv_params.len() != SALT_LEN {
            return Err(Error::decrypt(
                None,
                CryptoErrorKind::InvalidPrivParamsLength {
                    expected: SALT_LEN,
                    actual: priv_params.len(),
                },
            ));
        }

        let iv = Self::iv(engine_boots, engine_time, priv_params);
        let cipher = Aes128CfbDec::new_from_slices(&self.key[..KEY_LEN], &iv)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::CipherError))?;

        let mut buffer = ciphertext.to_vec();
        cipher.decrypt(&mut buffer);

        Ok(Bytes::from(buffer))
    }
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey").field("key", &"[REDACTED]").finish()
    }
}
