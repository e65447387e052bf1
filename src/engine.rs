//! Engine facade.
//!
//! Composes LCD -> USM -> message processor -> dispatcher and binds the
//! pipeline to a packet transport. Build one with [`Engine::builder`],
//! register a notification receiver, then call [`Engine::serve`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::dispatcher::{
    DEFAULT_MAX_INFLIGHT, DEFAULT_MAX_RECV_SIZE, Dispatcher, DispatcherConfig, MIN_RECV_SIZE,
    UnhandledPduHook,
};
use crate::error::{Error, Result};
use crate::lcd::Lcd;
use crate::mpm::MessageProcessor;
use crate::notification::NotificationReceiver;
use crate::transport::PacketConn;

/// Builder for [`Engine`].
pub struct EngineBuilder {
    lcd: Arc<dyn Lcd>,
    max_recv_size: usize,
    max_inflight: usize,
    receiver: Option<Arc<dyn NotificationReceiver>>,
    unhandled_hook: Option<UnhandledPduHook>,
}

impl EngineBuilder {
    fn new(lcd: Arc<dyn Lcd>) -> Self {
        Self {
            lcd,
            max_recv_size: DEFAULT_MAX_RECV_SIZE,
            max_inflight: DEFAULT_MAX_INFLIGHT,
            receiver: None,
            unhandled_hook: None,
        }
    }

    /// Receive buffer size in bytes (default 2048, minimum 484).
    pub fn max_recv_size(mut self, size: usize) -> Self {
        self.max_recv_size = size;
        self
    }

    /// Bound on concurrently processing packets (default 64).
    pub fn max_inflight(mut self, bound: usize) -> Self {
        self.max_inflight = bound;
        self
    }

    /// Register the notification receiver callback.
    pub fn notification_receiver(mut self, receiver: Arc<dyn NotificationReceiver>) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Register a hook for decoded packets with no notification route.
    pub fn unhandled_pdu_hook(mut self, hook: UnhandledPduHook) -> Self {
        self.unhandled_hook = Some(hook);
        self
    }

    /// Build the engine.
    pub fn build(self) -> Result<Engine> {
        if self.max_recv_size < MIN_RECV_SIZE {
            return Err(Error::Config(format!(
                "max_recv_size {} below minimum {}",
                self.max_recv_size, MIN_RECV_SIZE
            )));
        }
        if self.max_inflight == 0 {
            return Err(Error::Config("max_inflight must be at least 1".into()));
        }

        let mpm = Arc::new(MessageProcessor::new(self.lcd));
        let shutdown = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            mpm,
            self.receiver,
            self.unhandled_hook,
            DispatcherConfig {
                max_recv_size: self.max_recv_size,
                max_inflight: self.max_inflight,
            },
            shutdown,
        );

        Ok(Engine { dispatcher })
    }
}

/// The receiver-side SNMPv3 engine.
pub struct Engine {
    dispatcher: Dispatcher,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Start building an engine over the given datastore.
    pub fn builder(lcd: Arc<dyn Lcd>) -> EngineBuilder {
        EngineBuilder::new(lcd)
    }

    /// Serve datagrams from `conn` until [`shutdown`](Self::shutdown) is
    /// called or a fatal socket error occurs.
    ///
    /// In-flight packet tasks run to completion after cancellation; they
    /// observe the engine's cancellation token through their callbacks.
    pub async fn serve<C: PacketConn>(&self, conn: C) -> Result<()> {
        if let Ok(addr) = conn.local_addr() {
            tracing::info!(target: "trapsink::engine", local_addr = %addr, "serving");
        }
        self.dispatcher.listen(conn).await
    }

    /// Register (or replace) the notification receiver.
    ///
    /// Equivalent to [`EngineBuilder::notification_receiver`]; usable when
    /// the callback is constructed after the engine.
    pub fn register_notification_receiver(&mut self, receiver: Arc<dyn NotificationReceiver>) {
        self.dispatcher.set_receiver(receiver);
    }

    /// Signal the receive loop to exit.
    pub fn shutdown(&self) {
        self.dispatcher.shutdown_token().cancel();
    }

    /// The cancellation token governing this engine.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.dispatcher.shutdown_token().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::MemoryLcd;

    #[test]
    fn test_builder_defaults() {
        let engine = Engine::builder(Arc::new(MemoryLcd::new())).build();
        assert!(engine.is_ok());
    }

    #[test]
    fn test_builder_rejects_small_recv_size() {
        let err = Engine::builder(Arc::new(MemoryLcd::new()))
            .max_recv_size(483)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        assert!(Engine::builder(Arc::new(MemoryLcd::new()))
            .max_recv_size(484)
            .build()
            .is_ok());
    }

    #[test]
    fn test_builder_rejects_zero_inflight() {
        assert!(Engine::builder(Arc::new(MemoryLcd::new()))
            .max_inflight(0)
            .build()
            .is_err());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_token() {
        let engine = Engine::builder(Arc::new(MemoryLcd::new())).build().unwrap();
        let token = engine.cancellation_token();
        assert!(!token.is_cancelled());
        engine.shutdown();
        assert!(token.is_cancelled());
    }
}
