//! # trapsink
//!
//! Receiver-side SNMPv3 engine: accept UDP datagrams, decode the BER/ASN.1
//! message structure, authenticate and decrypt under the User-based
//! Security Model (RFC 3414), and dispatch decoded SNMPv2-Trap and
//! InformRequest PDUs to registered notification receivers.
//!
//! ## Features
//!
//! - HMAC-SHA-1-96 authentication with exact-span digest zeroing
//! - AES-128-CFB privacy (RFC 3826) with the boots/time-derived IV
//! - RFC 3414 time-window enforcement with atomic `latestReceived` updates
//! - Concurrent per-packet processing with a configurable in-flight bound
//! - Exponential backoff on transient socket errors (5 ms doubling to 1 s)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use tokio_util::sync::CancellationToken;
//! use trapsink::lcd::{MemoryLcd, TimeEntry, TimeTable, UserTable, UsmUser};
//! use trapsink::notification::{BoxFuture, Notification, NotificationReceiver};
//! use trapsink::{Engine, EngineId, Result};
//!
//! struct Printer;
//!
//! impl NotificationReceiver for Printer {
//!     fn process_pdu(
//!         &self,
//!         _cancel: CancellationToken,
//!         notification: Notification,
//!     ) -> BoxFuture<'_, Result<()>> {
//!         Box::pin(async move {
//!             println!("{} from {}", notification.pdu_type(), notification.source);
//!             Ok(())
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let engine_id = EngineId::new(Bytes::from_static(&[1, 1, 1, 1, 1, 1, 1, 1, 1, 1]))?;
//!
//!     let lcd = Arc::new(MemoryLcd::new());
//!     lcd.add_user(UsmUser::from_passwords(
//!         engine_id.clone(),
//!         "hoge",
//!         b"hogehoge",
//!         b"fugafuga",
//!     ))?;
//!     lcd.add_time(TimeEntry::new(engine_id, 0, 0))?;
//!
//!     let engine = Engine::builder(lcd)
//!         .notification_receiver(Arc::new(Printer))
//!         .build()?;
//!
//!     let socket = trapsink::transport::bind_udp_socket("0.0.0.0:16200".parse().unwrap()).await
//!         .map_err(|source| trapsink::Error::Io { source })?;
//!     engine.serve(socket).await
//! }
//! ```
//!
//! ## Scope
//!
//! This is a receiver: no agent/MIB logic, no SNMPv1/v2c, no outbound
//! requests, no Report PDU generation, HMAC-SHA-1 and AES-128-CFB only.

pub mod ber;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod lcd;
pub mod message;
pub mod mpm;
pub mod notification;
pub mod oid;
pub mod pdu;
pub mod transport;
pub mod usm;
pub mod value;
pub mod varbind;

// Re-exports for convenience
pub use dispatcher::{
    DEFAULT_MAX_INFLIGHT, DEFAULT_MAX_RECV_SIZE, MIN_RECV_SIZE, UnhandledPduHook,
};
pub use engine::{Engine, EngineBuilder};
pub use error::{
    AuthErrorKind, CryptoErrorKind, DecodeErrorKind, Error, ErrorStatus, OidErrorKind, Result,
};
pub use lcd::{Lcd, MemoryLcd, TimeEntry, TimeTable, UserTable, UsmUser};
pub use message::{
    EngineId, MsgData, MsgFlags, MsgGlobalData, Packet, SecurityLevel, SecurityModel,
    SecurityParams, encode_message,
};
pub use mpm::MessageProcessor;
pub use notification::{Notification, NotificationReceiver};
pub use oid::Oid;
pub use pdu::{BulkPdu, Pdu, PduBody, PduType, ScopedPdu};
pub use usm::{TIME_WINDOW, UserSecurityModel};
pub use value::Value;
pub use varbind::VarBind;
