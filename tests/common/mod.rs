//! Shared helpers for integration tests: wire-message builders, a
//! provisioned in-memory LCD, a recording notification receiver, and a
//! scripted packet connection for driving the dispatcher without a network.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::Notify;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_util::sync::CancellationToken;

use trapsink::lcd::{MemoryLcd, TimeEntry, TimeTable, UserTable, UsmUser};
use trapsink::notification::{BoxFuture, Notification, NotificationReceiver};
use trapsink::transport::PacketConn;
use trapsink::usm::auth::{self, AuthKey};
use trapsink::usm::privacy::PrivKey;
use trapsink::{
    EngineId, MsgData, MsgFlags, MsgGlobalData, Pdu, PduBody, Result, ScopedPdu, SecurityLevel,
    SecurityParams, Value, VarBind, encode_message, oid,
};

/// Engine ID used throughout the scenarios: 01:01:01:01:01:01:01:01:01:01.
pub const ENGINE: [u8; 10] = [1; 10];

pub const AUTH_PASSWORD: &[u8] = b"hogehoge";
pub const PRIV_PASSWORD: &[u8] = b"fugafuga";
pub const USER: &[u8] = b"hoge";

pub fn engine_id() -> EngineId {
    EngineId::new(Bytes::from_static(&ENGINE)).unwrap()
}

/// LCD provisioned with the scenario user and a time entry at (0, 0).
pub fn provisioned_lcd() -> Arc<MemoryLcd> {
    let lcd = Arc::new(MemoryLcd::new());
    lcd.add_user(UsmUser::from_passwords(
        engine_id(),
        Bytes::from_static(USER),
        AUTH_PASSWORD,
        PRIV_PASSWORD,
    ))
    .unwrap();
    lcd.add_time(TimeEntry::new(engine_id(), 0, 0)).unwrap();
    lcd
}

/// The scenario trap: one VarBind `sysUpTime.0 -> TimeTicks(12345)`.
pub fn trap_scoped_pdu(request_id: i32) -> ScopedPdu {
    ScopedPdu::new(
        engine_id(),
        Bytes::new(),
        PduBody::Normal(Pdu::trap(
            request_id,
            vec![VarBind::new(
                oid!(1, 3, 6, 1, 2, 1, 1, 3, 0),
                Value::TimeTicks(12345),
            )],
        )),
    )
}

/// NoAuthNoPriv trap wire message (flags 0x04, empty user).
pub fn noauth_trap_wire(request_id: i32) -> Vec<u8> {
    let global = MsgGlobalData::new(
        request_id,
        2048,
        MsgFlags::new(SecurityLevel::NoAuthNoPriv, true),
    );
    let params = SecurityParams::new(Bytes::from_static(&ENGINE), 0, 0, Bytes::new());
    encode_message(&global, &params, &MsgData::Plaintext(trap_scoped_pdu(request_id))).to_vec()
}

/// AuthNoPriv trap wire message (flags 0x05) with a correctly computed
/// HMAC-SHA-1-96 digest; `tamper` flips one digest byte afterwards.
pub fn auth_trap_wire(request_id: i32, boots: i32, time: i32, tamper: bool) -> Vec<u8> {
    let key = AuthKey::from_password(AUTH_PASSWORD, &ENGINE);
    let global = MsgGlobalData::new(
        request_id,
        2048,
        MsgFlags::new(SecurityLevel::AuthNoPriv, true),
    );
    let params = SecurityParams::new(
        Bytes::from_static(&ENGINE),
        boots,
        time,
        Bytes::from_static(USER),
    )
    .with_auth_placeholder();

    let mut wire =
        encode_message(&global, &params, &MsgData::Plaintext(trap_scoped_pdu(request_id))).to_vec();
    let (offset, _) = SecurityParams::find_auth_params_offset(&wire).unwrap();
    auth::authenticate_message(&key, &mut wire, offset);
    if tamper {
        wire[offset] ^= 0x01;
    }
    wire
}

/// AuthPriv trap wire message (flags 0x07) with
/// privacyParameters 00:00:00:00:00:00:00:01; `corrupt_ciphertext` flips a
/// ciphertext bit before the digest is computed, so authentication passes
/// and decryption yields garbage.
pub fn authpriv_trap_wire(request_id: i32, corrupt_ciphertext: bool) -> Vec<u8> {
    let auth_key = AuthKey::from_password(AUTH_PASSWORD, &ENGINE);
    let priv_key = PrivKey::from_password(PRIV_PASSWORD, &ENGINE);

    let plaintext = trap_scoped_pdu(request_id).encode_to_bytes();
    let (ciphertext, priv_params) = priv_key.encrypt(&plaintext, 0, 0, 1).unwrap();
    let mut ciphertext = ciphertext.to_vec();
    if corrupt_ciphertext {
        ciphertext[0] ^= 0x01;
    }

    let global = MsgGlobalData::new(request_id, 2048, MsgFlags::new(SecurityLevel::AuthPriv, true));
    let params = SecurityParams::new(
        Bytes::from_static(&ENGINE),
        0,
        0,
        Bytes::from_static(USER),
    )
    .with_auth_placeholder()
    .with_priv_params(priv_params);

    let mut wire =
        encode_message(&global, &params, &MsgData::Encrypted(Bytes::from(ciphertext))).to_vec();
    let (offset, _) = SecurityParams::find_auth_params_offset(&wire).unwrap();
    auth::authenticate_message(&auth_key, &mut wire, offset);
    wire
}

/// First bytes of an SNMPv2c message (version 1 on the wire).
pub fn v2c_wire() -> Vec<u8> {
    let mut buf = trapsink::ber::EncodeBuf::new();
    buf.push_sequence(|buf| {
        Pdu::trap(1, vec![]).encode(buf);
        buf.push_octet_string(b"public");
        buf.push_integer(1);
    });
    buf.finish().to_vec()
}

/// Notification receiver that records deliveries with their (tokio)
/// arrival times.
pub struct Recorder {
    tx: UnboundedSender<(Notification, tokio::time::Instant)>,
}

impl Recorder {
    pub fn channel() -> (
        Arc<Self>,
        UnboundedReceiver<(Notification, tokio::time::Instant)>,
    ) {
        let (tx, rx) = unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl NotificationReceiver for Recorder {
    fn process_pdu(
        &self,
        _cancel: CancellationToken,
        notification: Notification,
    ) -> BoxFuture<'_, Result<()>> {
        let _ = self.tx.send((notification, tokio::time::Instant::now()));
        Box::pin(async { Ok(()) })
    }
}

/// One scripted receive result.
pub enum MockRecv {
    Datagram(Vec<u8>, SocketAddr),
    Error(io::ErrorKind),
}

/// Scripted packet connection. Pops one script entry per `recv_from` call
/// and pends once the script is exhausted (like a quiet socket).
pub struct MockConn {
    script: Mutex<VecDeque<MockRecv>>,
    wakeup: Notify,
    local: SocketAddr,
}

impl MockConn {
    pub fn new(script: Vec<MockRecv>) -> Self {
        Self {
            script: Mutex::new(VecDeque::from(script)),
            wakeup: Notify::new(),
            local: "127.0.0.1:16200".parse().unwrap(),
        }
    }

    pub fn push(&self, item: MockRecv) {
        self.script.lock().unwrap().push_back(item);
        self.wakeup.notify_one();
    }
}

impl PacketConn for MockConn {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        loop {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(MockRecv::Datagram(data, source)) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    return Ok((len, source));
                }
                Some(MockRecv::Error(kind)) => return Err(io::Error::from(kind)),
                None => self.wakeup.notified().await,
            }
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }
}

/// Source address used by scripted datagrams.
pub fn mock_source() -> SocketAddr {
    "192.0.2.1:4000".parse().unwrap()
}
