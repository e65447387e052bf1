//! User-based Security Model (RFC 3414) incoming-message processing.
//!
//! This is the trust boundary. Every step has a failure condition and runs
//! in a fixed order: engine identification, the discovery fast path, user
//! lookup, authentication, the time-window check, then decryption.

pub mod auth;
pub mod privacy;

use std::sync::Arc;

use bytes::Bytes;

use crate::error::{AuthErrorKind, Error, Result};
use crate::lcd::{Lcd, TimeEntry};
use crate::message::{Packet, SecurityLevel};

/// Width of the RFC 3414 time window, in seconds.
pub const TIME_WINDOW: i32 = 150;

/// The USM processor.
///
/// Holds a shared handle to the LCD; lookups on the hot path are read-only,
/// and the single hot-path write (`latestReceived`) goes through the time
/// entry's own atomic.
pub struct UserSecurityModel {
    lcd: Arc<dyn Lcd>,
}

impl UserSecurityModel {
    /// Create a USM over the given datastore.
    pub fn new(lcd: Arc<dyn Lcd>) -> Self {
        Self { lcd }
    }

    /// Process an incoming message and return the plaintext ScopedPDU bytes.
    ///
    /// Implements the RFC 3414 Section 3.2 receiver steps this engine
    /// needs, in order:
    ///
    /// 1. non-empty authoritativeEngineID, with a known time entry;
    /// 2. fast path: empty userName at NoAuthNoPriv returns the payload
    ///    unchanged (discovery/response traffic);
    /// 3. user lookup, absence is a hard error;
    /// 4. HMAC-SHA-1-96 verification over the message with the digest span
    ///    zeroed at its recorded offset;
    /// 5. time-window check, then the `latestReceived` update;
    /// 6. AES-128-CFB decryption at AuthPriv only.
    ///
    /// A decryption with the wrong key succeeds here and fails in the
    /// ScopedPDU decoder, which rejects plaintext that does not start with
    /// a SEQUENCE tag.
    pub fn process_incoming(&self, packet: &Packet) -> Result<Bytes> {
        let params = &packet.security_params;

        if params.engine_id.is_empty() {
            return Err(Error::UnknownEngineId { source_addr: None });
        }

        let time_entry = self
            .lcd
            .get_time(&params.engine_id)
            .ok_or(Error::UnknownEngineId { source_addr: None })?;

        let level = packet.security_level();

        if params.user_name.is_empty() && level == SecurityLevel::NoAuthNoPriv {
            return Ok(packet.raw_data().clone());
        }

        let user = self
            .lcd
            .get_user(&params.engine_id, &params.user_name)
            .ok_or_else(|| Error::auth(None, AuthErrorKind::NoUser))?;

        if level >= SecurityLevel::AuthNoPriv {
            if params.auth_params.len() != auth::MAC_LEN {
                return Err(Error::auth(
                    None,
                    AuthErrorKind::WrongMacLength {
                        expected: auth::MAC_LEN,
                        actual: params.auth_params.len(),
                    },
                ));
            }
            let auth_offset = packet
                .auth_params_offset()
                .ok_or_else(|| Error::auth(None, AuthErrorKind::AuthParamsNotFound))?;

            if !auth::verify_message(
                &user.auth_key,
                packet.whole_bytes(),
                auth_offset,
                &params.auth_params,
            ) {
                return Err(Error::auth(None, AuthErrorKind::HmacMismatch));
            }

            check_time_window(&time_entry, params.engine_boots, params.engine_time)?;

            // RFC 3414 Section 2.2.3: the message is authentic and inside
            // the window, so advance latestReceived.
            time_entry.record_received(params.engine_time);
        }

        if level == SecurityLevel::AuthPriv {
            return user.priv_key.decrypt(
                packet.raw_data(),
                params.engine_boots,
                params.engine_time,
                &params.priv_params,
            );
        }

        Ok(packet.raw_data().clone())
    }
}

/// The RFC 3414 Section 3.2 step 7 time-window check for a
/// non-authoritative receiver.
///
/// Rejects when the local boot count is ahead of the message, when the
/// boot counts match but the message's time is more than [`TIME_WINDOW`]
/// seconds behind the highest time seen, or when the local boot counter
/// has pegged at `i32::MAX` (the engine must be reinitialized).
fn check_time_window(entry: &TimeEntry, boots: i32, time: i32) -> Result<()> {
    if entry.boots > boots
        || (entry.boots == boots && entry.latest_received() - TIME_WINDOW > time)
        || entry.boots == i32::MAX
    {
        return Err(Error::NotInTimeWindow { source_addr: None });
    }
    Ok(())
}
