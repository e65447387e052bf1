//! Datagram dispatcher: the receive loop.
//!
//! A single loop owns the socket. Each datagram is copied out of the shared
//! receive buffer, version-gated, and handed to a spawned task that runs
//! the message processor and routes the decoded PDU. The loop itself never
//! blocks on packet processing, and no single bad packet can take it down:
//! only a non-transient socket error terminates it.
//!
//! Transient read errors back off exponentially from 5 ms, doubling per
//! consecutive failure up to 1 s, and reset on the first successful read.
//! Task spawning is bounded by a semaphore so a datagram flood cannot turn
//! the receiver into an unbounded task amplifier.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::ber::Decoder;
use crate::error::{Error, Result};
use crate::message::Packet;
use crate::mpm::MessageProcessor;
use crate::notification::{Notification, NotificationReceiver};
use crate::pdu::PduBody;
use crate::transport::PacketConn;

/// Default receive buffer size in bytes.
pub const DEFAULT_MAX_RECV_SIZE: usize = 2048;

/// Minimum permitted receive buffer size (the RFC 3412 minimum message
/// size every engine must accept).
pub const MIN_RECV_SIZE: usize = 484;

/// Default bound on concurrently processing packets.
pub const DEFAULT_MAX_INFLIGHT: usize = 64;

const BACKOFF_INITIAL: Duration = Duration::from_millis(5);
const BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Hook invoked for decoded packets whose PDU type has no route (anything
/// other than SNMPv2-Trap and InformRequest in this receiver-oriented
/// engine).
pub type UnhandledPduHook = Arc<dyn Fn(SocketAddr, &Packet) + Send + Sync>;

#[derive(Clone)]
pub(crate) struct DispatcherConfig {
    pub(crate) max_recv_size: usize,
    pub(crate) max_inflight: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_recv_size: DEFAULT_MAX_RECV_SIZE,
            max_inflight: DEFAULT_MAX_INFLIGHT,
        }
    }
}

pub(crate) struct Dispatcher {
    mpm: Arc<MessageProcessor>,
    receiver: Option<Arc<dyn NotificationReceiver>>,
    unhandled_hook: Option<UnhandledPduHook>,
    config: DispatcherConfig,
    shutdown: CancellationToken,
    inflight: Arc<Semaphore>,
}

impl Dispatcher {
    pub(crate) fn new(
        mpm: Arc<MessageProcessor>,
        receiver: Option<Arc<dyn NotificationReceiver>>,
        unhandled_hook: Option<UnhandledPduHook>,
        config: DispatcherConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let inflight = Arc::new(Semaphore::new(config.max_inflight));
        Self {
            mpm,
            receiver,
            unhandled_hook,
            config,
            shutdown,
            inflight,
        }
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub(crate) fn set_receiver(&mut self, receiver: Arc<dyn NotificationReceiver>) {
        self.receiver = Some(receiver);
    }

    /// Run the receive loop until cancellation or a fatal socket error.
    pub(crate) async fn listen<C: PacketConn>(&self, conn: C) -> Result<()> {
        let mut buf = vec![0u8; self.config.max_recv_size];
        let mut backoff = Duration::ZERO;

        loop {
            let result = tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    tracing::debug!(target: "trapsink::dispatcher", "receive loop shutdown");
                    return Ok(());
                }

                result = conn.recv_from(&mut buf) => result,
            };

            let (len, source) = match result {
                Ok(ok) => {
                    backoff = Duration::ZERO;
                    ok
                }
                Err(e) if is_transient(&e) => {
                    backoff = next_backoff(backoff);
                    tracing::warn!(
                        target: "trapsink::dispatcher",
                        error = %e,
                        delay_ms = backoff.as_millis() as u64,
                        "transient read error, backing off"
                    );
                    tokio::select! {
                        biased;
                        _ = self.shutdown.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    continue;
                }
                Err(e) => {
                    tracing::error!(
                        target: "trapsink::dispatcher",
                        error = %e,
                        "fatal read error, terminating"
                    );
                    return Err(Error::Io { source: e });
                }
            };

            // The receive buffer is reused; hand the task its own copy.
            let data = Bytes::copy_from_slice(&buf[..len]);

            match peek_version(data.clone()) {
                Ok(3) => {}
                Ok(other) => {
                    tracing::warn!(
                        target: "trapsink::dispatcher",
                        source = %source,
                        error = %Error::UnsupportedVersion(other),
                        "dropping datagram"
                    );
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        target: "trapsink::dispatcher",
                        source = %source,
                        error = %e,
                        "dropping malformed datagram"
                    );
                    continue;
                }
            }

            // Bound the in-flight packet tasks; the loop waits here rather
            // than spawning without limit.
            let permit = match self.inflight.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Ok(()),
            };

            let mpm = Arc::clone(&self.mpm);
            let receiver = self.receiver.clone();
            let unhandled_hook = self.unhandled_hook.clone();
            let cancel = self.shutdown.clone();

            tokio::spawn(async move {
                let _permit = permit;
                process_datagram(mpm, receiver, unhandled_hook, cancel, data, source).await;
            });
        }
    }
}

/// Run one datagram through the message processor and route the result.
async fn process_datagram(
    mpm: Arc<MessageProcessor>,
    receiver: Option<Arc<dyn NotificationReceiver>>,
    unhandled_hook: Option<UnhandledPduHook>,
    cancel: CancellationToken,
    data: Bytes,
    source: SocketAddr,
) {
    let packet = match mpm.prepare(data) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::warn!(
                target: "trapsink::dispatcher",
                source = %source,
                error = %e,
                security_failure = e.is_security_failure(),
                "dropping datagram"
            );
            return;
        }
    };

    let Some(scoped) = packet.scoped_pdu.as_ref() else {
        // prepare() always populates the ScopedPDU on success
        return;
    };

    match &scoped.body {
        PduBody::Normal(pdu) if pdu.pdu_type.is_notification() => {
            let Some(receiver) = receiver else {
                tracing::debug!(
                    target: "trapsink::dispatcher",
                    source = %source,
                    pdu_type = %pdu.pdu_type,
                    "no notification receiver registered"
                );
                return;
            };

            let notification = Notification {
                source,
                user_name: packet.security_params.user_name.clone(),
                engine_id: packet.security_params.engine_id.clone(),
                context_engine_id: scoped.context_engine_id.clone(),
                context_name: scoped.context_name.clone(),
                security_level: packet.security_level(),
                pdu: pdu.clone(),
            };

            if let Err(e) = receiver.process_pdu(cancel, notification).await {
                tracing::warn!(
                    target: "trapsink::dispatcher",
                    source = %source,
                    error = %e,
                    "notification receiver failed"
                );
            }
        }
        body => {
            if let Some(hook) = unhandled_hook {
                hook(source, &packet);
            } else {
                tracing::debug!(
                    target: "trapsink::dispatcher",
                    source = %source,
                    pdu_type = %body.pdu_type(),
                    "dropping PDU with no route"
                );
            }
        }
    }
}

/// Cheap outer-structure version peek, run before any task is spawned.
fn peek_version(data: Bytes) -> Result<i32> {
    let mut decoder = Decoder::new(data);
    let mut seq = decoder.read_sequence()?;
    seq.read_integer()
}

/// Classify a socket read error as transient (retry with backoff) or fatal.
fn is_transient(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        e.kind(),
        ErrorKind::WouldBlock
            | ErrorKind::Interrupted
            | ErrorKind::TimedOut
            // ICMP unreachable surfaced on a UDP socket; the socket is fine
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionRefused
    )
}

/// Next backoff delay: 5 ms after the first failure, doubling to a 1 s cap.
fn next_backoff(current: Duration) -> Duration {
    if current.is_zero() {
        BACKOFF_INITIAL
    } else {
        (current * 2).min(BACKOFF_MAX)
    }
}
