//! Local Configuration Datastore (LCD).
//!
//! The LCD is the store of USM users and per-engine time state the security
//! model consults on the hot path. Lookups must tolerate concurrent readers;
//! the only hot-path mutation is the RFC 3414 Section 2.2.3 update of
//! `latestReceived`, which [`TimeEntry`] carries as a shared atomic so the
//! USM never takes a table lock to record it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;

use crate::error::Result;
use crate::message::EngineId;
use crate::usm::auth::AuthKey;
use crate::usm::privacy::PrivKey;

/// A provisioned USM user: localized keys bound to one engine.
#[derive(Debug, Clone)]
pub struct UsmUser {
    /// The authoritative engine this user's keys are localized to.
    pub engine_id: EngineId,
    /// User name (0..=32 bytes).
    pub name: Bytes,
    /// HMAC-SHA-1 authentication key (20 bytes).
    pub auth_key: AuthKey,
    /// AES-128 privacy key (first 16 bytes used).
    pub priv_key: PrivKey,
}

impl UsmUser {
    /// Derive a user's keys from passwords, RFC 3414 Appendix A.2 style.
    pub fn from_passwords(
        engine_id: EngineId,
        name: impl Into<Bytes>,
        auth_password: &[u8],
        priv_password: &[u8],
    ) -> Self {
        let auth_key = AuthKey::from_password(auth_password, engine_id.as_bytes());
        let priv_key = PrivKey::from_password(priv_password, engine_id.as_bytes());
        Self {
            engine_id,
            name: name.into(),
            auth_key,
            priv_key,
        }
    }
}

/// Per-engine time state for the RFC 3414 time-window check.
///
/// `latest_received` is shared between the store and every clone handed out
/// by [`TimeTable::get_time`], so the post-authentication update is visible
/// to later lookups without a write back through the table.
#[derive(Debug, Clone)]
pub struct TimeEntry {
    /// The engine this entry tracks.
    pub engine_id: EngineId,
    /// snmpEngineBoots as last synchronized.
    pub boots: i32,
    /// snmpEngineTime as last synchronized.
    pub time: i32,
    latest_received: Arc<AtomicI32>,
}

impl TimeEntry {
    /// Create an entry whose `latest_received` starts at `time`.
    pub fn new(engine_id: EngineId, boots: i32, time: i32) -> Self {
        Self {
            engine_id,
            boots,
            time,
            latest_received: Arc::new(AtomicI32::new(time)),
        }
    }

    /// Create an entry with an explicit `latest_received`.
    pub fn with_latest_received(engine_id: EngineId, boots: i32, time: i32, latest: i32) -> Self {
        Self {
            engine_id,
            boots,
            time,
            latest_received: Arc::new(AtomicI32::new(latest)),
        }
    }

    /// The highest engineTime seen in an authenticated message.
    pub fn latest_received(&self) -> i32 {
        self.latest_received.load(Ordering::Acquire)
    }

    /// Record the engineTime of an authenticated message
    /// (`latestReceived = max(latestReceived, time)`).
    pub fn record_received(&self, time: i32) {
        self.latest_received.fetch_max(time, Ordering::AcqRel);
    }
}

/// USM user table.
pub trait UserTable: Send + Sync {
    /// Provision a user.
    fn add_user(&self, user: UsmUser) -> Result<()>;

    /// Look up a user by (engineID, userName).
    fn get_user(&self, engine_id: &[u8], user_name: &[u8]) -> Option<Arc<UsmUser>>;

    /// Remove a user. Removing an absent user is not an error.
    fn delete_user(&self, engine_id: &[u8], user_name: &[u8]) -> Result<()>;
}

/// Per-engine time table.
pub trait TimeTable: Send + Sync {
    /// Provision (or replace) the time entry for an engine.
    fn add_time(&self, entry: TimeEntry) -> Result<()>;

    /// Look up the time entry for an engine.
    fn get_time(&self, engine_id: &[u8]) -> Option<TimeEntry>;
}

/// The Local Configuration Datastore: user table plus time table.
pub trait Lcd: UserTable + TimeTable {}

impl<T: UserTable + TimeTable> Lcd for T {}

/// In-memory LCD.
///
/// RwLock-protected maps: many concurrent readers on the hot path, writers
/// only during provisioning.
#[derive(Default)]
pub struct MemoryLcd {
    users: RwLock<HashMap<(Bytes, Bytes), Arc<UsmUser>>>,
    times: RwLock<HashMap<Bytes, TimeEntry>>,
}

impl MemoryLcd {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserTable for MemoryLcd {
    fn add_user(&self, user: UsmUser) -> Result<()> {
        let key = (
            Bytes::copy_from_slice(user.engine_id.as_bytes()),
            user.name.clone(),
        );
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, Arc::new(user));
        Ok(())
    }

    fn get_user(&self, engine_id: &[u8], user_name: &[u8]) -> Option<Arc<UsmUser>> {
        let key = (
            Bytes::copy_from_slice(engine_id),
            Bytes::copy_from_slice(user_name),
        );
        self.users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned()
    }

    fn delete_user(&self, engine_id: &[u8], user_name: &[u8]) -> Result<()> {
        let key = (
            Bytes::copy_from_slice(engine_id),
            Bytes::copy_from_slice(user_name),
        );
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key);
        Ok(())
    }
}

impl TimeTable for MemoryLcd {
    fn add_time(&self, entry: TimeEntry) -> Result<()> {
        let key = Bytes::copy_from_slice(entry.engine_id.as_bytes());
        self.times
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, entry);
        Ok(())
    }

    fn get_time(&self, engine_id: &[u8]) -> Option<TimeEntry> {
        self.times
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(engine_id)
            .cloned()
    }
}
