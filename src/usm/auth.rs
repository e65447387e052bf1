//! Authentication key derivation and HMAC-SHA-1-96 operations (RFC 3414).
//!
//! - Password-to-key derivation (1 MiB expansion + SHA-1)
//! - Key localization (binding the key to an engine ID)
//! - Message authentication with in-place digest-span zeroing

use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha1 = Hmac<Sha1>;

/// Length of a localized SHA-1 key.
pub const KEY_LEN: usize = 20;

/// Length of the truncated HMAC-SHA-1-96 digest.
pub const MAC_LEN: usize = 12;

/// Derive a localized key from a password and engine ID
/// (RFC 3414 Appendix A.2.2).
///
/// Expands the password by repetition to exactly 1 MiB, hashes it to obtain
/// `Ku`, then hashes `Ku || engineID || Ku` to obtain the localized key.
/// Deterministic; an empty password yields an all-zero key.
pub fn password_to_key(password: &[u8], engine_id: &[u8]) -> [u8; KEY_LEN] {
    const EXPANSION_SIZE: usize = 1 << 20;

    if password.is_empty() {
        return [0u8; KEY_LEN];
    }

    let mut hasher = Sha1::new();
    for _ in 0..EXPANSION_SIZE / password.len() {
        hasher.update(password);
    }
    let remain = EXPANSION_SIZE % password.len();
    if remain > 0 {
        hasher.update(&password[..remain]);
    }
    let ku = hasher.finalize();

    let mut hasher = Sha1::new();
    hasher.update(ku);
    hasher.update(engine_id);
    hasher.update(ku);
    hasher.finalize().into()
}

/// Localized HMAC-SHA-1 authentication key.
///
/// Key material is zeroed from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AuthKey {
    key: Vec<u8>,
}

impl AuthKey {
    /// Derive a localized key from a password and engine ID.
    pub fn from_password(password: &[u8], engine_id: &[u8]) -> Self {
        Self {
            key: password_to_key(password, engine_id).to_vec(),
        }
    }

    /// Create from raw localized key bytes (e.g. from configuration).
    pub fn from_bytes(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Compute HMAC-SHA-1 over a message, truncated to 12 bytes.
    pub fn compute_mac(&self, data: &[u8]) -> [u8; MAC_LEN] {
        let mut mac =
            <HmacSha1 as Mac>::new_from_slice(&self.key).expect("HMAC accepts any key size");
        mac.update(data);
        let digest = mac.finalize().into_bytes();
        let mut out = [0u8; MAC_LEN];
        out.copy_from_slice(&digest[..MAC_LEN]);
        out
    }
}

impl std::fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKey").field("key", &"[REDACTED]").finish()
    }
}

/// Verify an incoming message's HMAC-SHA-1-96 digest.
///
/// Computes the MAC over a copy of `whole_msg` with the 12 bytes at
/// `auth_offset` zeroed, and compares against `received_mac` in constant
/// time.
pub fn verify_message(
    key: &AuthKey,
    whole_msg: &[u8],
    auth_offset: usize,
    received_mac: &[u8],
) -> bool {
    if received_mac.len() != MAC_LEN || auth_offset + MAC_LEN > whole_msg.len() {
        return false;
    }

    let mut msg = whole_msg.to_vec();
    msg[auth_offset..auth_offset + MAC_LEN].fill(0);

    let computed = key.compute_mac(&msg);
    computed[..].ct_eq(received_mac).into()
}

/// Authenticate an outgoing message in place.
///
/// The message must carry a 12-byte zero placeholder at `auth_offset`; the
/// computed digest overwrites it.
pub fn authenticate_message(key: &AuthKey, message: &mut [u8], auth_offset: usize) {
    let mac = key.compute_mac(message);
    message[auth_offset..auth_offset + MAC_LEN].copy_from_slice(&mac);
}
