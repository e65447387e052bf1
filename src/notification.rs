//! Application-level notification delivery.
//!
//! The dispatcher routes decoded SNMPv2-Trap and InformRequest PDUs to a
//! registered [`NotificationReceiver`]. Receivers get the cancellation
//! token that governs the engine so long-running callbacks can observe
//! shutdown; in-flight deliveries run to completion.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::message::{EngineId, SecurityLevel};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};

/// Boxed future type used by receiver callbacks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A decoded notification, delivered once per trap or inform.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Datagram source address.
    pub source: SocketAddr,
    /// USM user name the message authenticated as (may be empty).
    pub user_name: Bytes,
    /// Authoritative engine ID from the security parameters.
    pub engine_id: Bytes,
    /// Context engine ID from the ScopedPDU.
    pub context_engine_id: EngineId,
    /// Context name from the ScopedPDU.
    pub context_name: Bytes,
    /// Security level the message arrived at.
    pub security_level: SecurityLevel,
    /// The notification PDU (SNMPv2-Trap or InformRequest).
    pub pdu: Pdu,
}

impl Notification {
    /// The PDU type (always a notification-class type).
    pub fn pdu_type(&self) -> PduType {
        self.pdu.pdu_type
    }

    /// Whether this is a confirmed notification (InformRequest).
    pub fn is_confirmed(&self) -> bool {
        self.pdu.pdu_type == PduType::InformRequest
    }

    /// The sysUpTime.0 value, when the first varbind carries it.
    pub fn uptime(&self) -> Option<u32> {
        self.pdu
            .varbinds
            .iter()
            .find(|vb| vb.oid == oids::sys_uptime())
            .and_then(|vb| vb.value.as_u32())
    }

    /// The snmpTrapOID.0 value, when present.
    pub fn trap_oid(&self) -> Option<&Oid> {
        self.pdu
            .varbinds
            .iter()
            .find(|vb| vb.oid == oids::snmp_trap_oid())
            .and_then(|vb| vb.value.as_oid())
    }
}

/// Well-known OIDs for notification varbinds.
pub mod oids {
    use crate::oid;
    use crate::oid::Oid;

    /// sysUpTime.0 - first varbind in v2/v3 notifications
    pub fn sys_uptime() -> Oid {
        oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
    }

    /// snmpTrapOID.0 - second varbind, carries the trap type
    pub fn snmp_trap_oid() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0)
    }

    /// coldStart trap OID (snmpTraps.1)
    pub fn cold_start() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 1)
    }

    /// warmStart trap OID (snmpTraps.2)
    pub fn warm_start() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 2)
    }

    /// linkDown trap OID (snmpTraps.3)
    pub fn link_down() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 3)
    }

    /// linkUp trap OID (snmpTraps.4)
    pub fn link_up() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 4)
    }
}

/// Callback invoked for each decoded trap or inform.
///
/// Errors are logged and do not affect the receive loop. Callbacks should
/// honor `cancel` when doing slow work; the dispatcher does not abort them.
pub trait NotificationReceiver: Send + Sync {
    /// Process one notification.
    fn process_pdu(
        &self,
        cancel: CancellationToken,
        notification: Notification,
    ) -> BoxFuture<'_, Result<()>>;
}
