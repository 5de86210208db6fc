//! # Outbound channel
//!
//! Best-effort, one-way delivery of [`OutboundMessage`]s to the host.
//!
//! ## Guarantees
//! - Non-blocking: no transport here waits for the host
//! - Never fails outward: [`Outbound::post`] returns nothing; transport errors
//!   are counted and dropped
//! - No acknowledgement, retry or backpressure
//!
//! ## NOT Responsible For
//! - Deciding what to send (that is the rate policy)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::message::OutboundMessage;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub mod post_message;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Something that can carry a message toward the host context.
///
/// Implementations must return immediately.
pub trait Transport: Send + Sync {
    /// Short label used in logs and errors.
    fn name(&self) -> &'static str;

    fn try_send(&self, message: &OutboundMessage) -> Result<()>;
}

/// In-process host: a tokio mpsc sender whose receiver plays the parent page.
#[derive(Debug, Clone)]
pub enum ChannelTransport {
    Unbounded(mpsc::UnboundedSender<OutboundMessage>),
    /// Drops messages when the host has `capacity` unread.
    Bounded(mpsc::Sender<OutboundMessage>),
}

impl ChannelTransport {
    pub fn unbounded() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelTransport::Unbounded(tx), rx)
    }

    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (ChannelTransport::Bounded(tx), rx)
    }
}

impl Transport for ChannelTransport {
    fn name(&self) -> &'static str {
        "mpsc"
    }

    fn try_send(&self, message: &OutboundMessage) -> Result<()> {
        match self {
            ChannelTransport::Unbounded(tx) => tx
                .send(message.clone())
                .map_err(|_| BridgeError::transport(self.name(), "host receiver dropped")),
            ChannelTransport::Bounded(tx) => tx.try_send(message.clone()).map_err(|e| {
                let detail = match e {
                    mpsc::error::TrySendError::Full(_) => "host not draining",
                    mpsc::error::TrySendError::Closed(_) => "host receiver dropped",
                };
                BridgeError::transport(self.name(), detail)
            }),
        }
    }
}

/// Tries each transport in order; the first success wins.
pub struct FallbackTransport {
    transports: Vec<Arc<dyn Transport>>,
}

impl FallbackTransport {
    pub fn new(transports: Vec<Arc<dyn Transport>>) -> Self {
        Self { transports }
    }
}

impl Transport for FallbackTransport {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn try_send(&self, message: &OutboundMessage) -> Result<()> {
        let mut last_err = None;
        for transport in &self.transports {
            match transport.try_send(message) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!(transport = transport.name(), error = %e, "transport failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| BridgeError::transport(self.name(), "no transports configured")))
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Fire-and-forget front for a [`Transport`].
pub struct Outbound {
    transport: Arc<dyn Transport>,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl Outbound {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Hand `message` to the transport. Failures are logged and dropped.
    pub fn post(&self, message: &OutboundMessage) {
        match self.transport.try_send(message) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                debug!(kind = message.kind(), error = %e, "dropping outbound message");
            }
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Transport for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn try_send(&self, _message: &OutboundMessage) -> Result<()> {
            Err(BridgeError::transport("broken", "no parent"))
        }
    }

    #[tokio::test]
    async fn test_unbounded_channel_delivers_in_order() {
        let (transport, mut rx) = ChannelTransport::unbounded();
        transport.try_send(&OutboundMessage::RunStart).unwrap();
        transport.try_send(&OutboundMessage::Score { score: 4.0 }).unwrap();
        assert_eq!(rx.recv().await, Some(OutboundMessage::RunStart));
        assert_eq!(rx.recv().await, Some(OutboundMessage::Score { score: 4.0 }));
    }

    #[test]
    fn test_unbounded_channel_fails_when_host_gone() {
        let (transport, rx) = ChannelTransport::unbounded();
        drop(rx);
        assert!(transport.try_send(&OutboundMessage::RunStart).is_err());
    }

    #[test]
    fn test_bounded_channel_drops_when_full() {
        let (transport, mut rx) = ChannelTransport::bounded(1);
        transport.try_send(&OutboundMessage::RunStart).unwrap();
        let err = transport.try_send(&OutboundMessage::RunStart).unwrap_err();
        assert!(err.to_string().contains("host not draining"));
        assert_eq!(rx.try_recv().unwrap(), OutboundMessage::RunStart);
    }

    #[test]
    fn test_fallback_uses_first_working_transport() {
        let (good, mut rx) = ChannelTransport::unbounded();
        let fallback = FallbackTransport::new(vec![Arc::new(Broken), Arc::new(good)]);
        fallback.try_send(&OutboundMessage::RunStart).unwrap();
        assert_eq!(rx.try_recv().unwrap(), OutboundMessage::RunStart);
    }

    #[test]
    fn test_fallback_reports_last_error() {
        let fallback = FallbackTransport::new(vec![Arc::new(Broken)]);
        let err = fallback.try_send(&OutboundMessage::RunStart).unwrap_err();
        assert!(err.to_string().contains("no parent"));
    }

    #[test]
    fn test_empty_fallback_errors() {
        let fallback = FallbackTransport::new(Vec::new());
        assert!(fallback.try_send(&OutboundMessage::RunStart).is_err());
    }

    #[test]
    fn test_outbound_swallows_failures() {
        let outbound = Outbound::new(Arc::new(Broken));
        outbound.post(&OutboundMessage::RunStart);
        outbound.post(&OutboundMessage::Score { score: 1.0 });
        assert_eq!(outbound.failed(), 2);
        assert_eq!(outbound.delivered(), 0);
    }

    #[test]
    fn test_outbound_counts_deliveries() {
        let (transport, _rx) = ChannelTransport::unbounded();
        let outbound = Outbound::new(Arc::new(transport));
        outbound.post(&OutboundMessage::RunStart);
        assert_eq!(outbound.delivered(), 1);
        assert_eq!(outbound.failed(), 0);
    }
}
