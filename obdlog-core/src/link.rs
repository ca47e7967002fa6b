//! Link state and connection management over a pluggable link provider.
//!
//! The provider owns the actual SPP-style channel (Bluetooth stack, or a
//! TCP bridge standing in for it). It hands received bytes and close
//! notifications to the engine through [`LinkEvents`] from whatever context
//! its radio stack runs in; everything else happens on the polling thread.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info};

use crate::address::BdAddr;
use crate::error::ObdError;
use crate::queue::{chunk_queue, Chunk, ChunkQueue, ChunkSender};
use crate::session::{read_reply, Reply};

/// Wait after a successful connect before the first command, so the remote
/// adapter can finish initializing.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// The underlying serial channel, consumed through a narrow interface.
///
/// `open` receives a [`LinkEvents`] handle; the provider must call
/// [`LinkEvents::chunk_received`] for every received chunk and
/// [`LinkEvents::link_closed`] when the channel dies, from any context,
/// without blocking beyond a small bound.
pub trait LinkProvider {
    /// Opaque transport handle, valid from `open` until `close`.
    type Handle;

    fn open(&mut self, addr: BdAddr, events: LinkEvents) -> io::Result<Self::Handle>;
    fn write(&mut self, handle: &mut Self::Handle, data: &[u8]) -> io::Result<()>;
    fn close(&mut self, handle: Self::Handle);
}

struct LinkShared {
    connected: AtomicBool,
    connecting: AtomicBool,
    chunks: ChunkSender,
}

/// Cloneable handle for the provider's asynchronous notifications.
#[derive(Clone)]
pub struct LinkEvents {
    shared: Arc<LinkShared>,
}

impl LinkEvents {
    /// Deliver one received chunk. Never blocks; at queue capacity the
    /// chunk is dropped and counted.
    pub fn chunk_received(&self, data: &[u8]) {
        self.shared.chunks.push(Chunk::from_slice(data));
    }

    /// Provider-initiated closure. The link state becomes Disconnected
    /// immediately; the stale handle is reclaimed by the next connection
    /// manager operation.
    pub fn link_closed(&self) {
        if self.shared.connected.swap(false, Ordering::SeqCst) {
            info!("link closed by remote");
        }
    }
}

/// Connection manager and command session for one adapter link.
pub struct Obd2Link<P: LinkProvider> {
    provider: P,
    shared: Arc<LinkShared>,
    queue: ChunkQueue,
    handle: Option<P::Handle>,
    settle_delay: Duration,
}

impl<P: LinkProvider> Obd2Link<P> {
    pub fn new(provider: P) -> Self {
        let (tx, rx) = chunk_queue();
        Self {
            provider,
            shared: Arc::new(LinkShared {
                connected: AtomicBool::new(false),
                connecting: AtomicBool::new(false),
                chunks: tx,
            }),
            queue: rx,
            handle: None,
            settle_delay: SETTLE_DELAY,
        }
    }

    #[must_use]
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Handle for the provider's delivery callbacks.
    #[must_use]
    pub fn events(&self) -> LinkEvents {
        LinkEvents {
            shared: self.shared.clone(),
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Open the channel to `addr` and wait the settle delay.
    ///
    /// Success without any link operation if already connected. Does not
    /// retry; the polling loop owns retry timing.
    pub fn connect(&mut self, addr: BdAddr) -> Result<(), ObdError> {
        self.reap_closed();
        if self.is_connected() {
            return Ok(());
        }
        if self.shared.connecting.swap(true, Ordering::SeqCst) {
            return Err(ObdError::AlreadyConnecting);
        }
        info!("connecting to adapter {addr}");
        let result = self.provider.open(addr, self.events());
        self.shared.connecting.store(false, Ordering::SeqCst);
        match result {
            Ok(handle) => {
                self.handle = Some(handle);
                self.shared.connected.store(true, Ordering::SeqCst);
                info!("connected to adapter {addr}");
                thread::sleep(self.settle_delay);
                Ok(())
            }
            Err(e) => {
                error!("connect to adapter {addr} failed: {e}");
                Err(ObdError::Transport(e.to_string()))
            }
        }
    }

    /// Tear the channel down. Idempotent.
    pub fn disconnect(&mut self) {
        self.shared.connected.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            info!("disconnecting from adapter");
            self.provider.close(handle);
        }
    }

    /// One command out, one reassembled reply back.
    ///
    /// Appends the single CR terminator unless the command already carries
    /// one, performs exactly one write, then hands the reply budget to
    /// [`read_reply`]. No retries at this layer.
    pub fn send_and_read(
        &mut self,
        command: &[u8],
        max_reply: usize,
        timeout: Duration,
    ) -> Result<Reply, ObdError> {
        if command.is_empty() {
            return Err(ObdError::InvalidArgument("empty command".to_string()));
        }
        if max_reply == 0 {
            return Err(ObdError::InvalidArgument(
                "zero reply capacity".to_string(),
            ));
        }
        self.reap_closed();
        if !self.is_connected() {
            return Err(ObdError::NotConnected);
        }
        let Some(handle) = self.handle.as_mut() else {
            return Err(ObdError::NotConnected);
        };

        let mut framed = Chunk::from_slice(command);
        if !framed.ends_with(b"\r") {
            framed.push(b'\r');
        }
        self.provider
            .write(handle, &framed)
            .map_err(|e| ObdError::Transport(e.to_string()))?;

        read_reply(&self.queue, max_reply, timeout)
    }

    /// Reclaim the transport handle after an asynchronous close, keeping
    /// the handle-present-iff-connected invariant.
    fn reap_closed(&mut self) {
        if !self.is_connected() {
            if let Some(handle) = self.handle.take() {
                self.provider.close(handle);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{test_addr, MockProvider};
    use super::*;

    fn link(provider: &MockProvider) -> Obd2Link<MockProvider> {
        Obd2Link::new(provider.clone()).with_settle_delay(Duration::ZERO)
    }

    #[test]
    fn test_connect_is_idempotent() {
        let provider = MockProvider::default();
        let mut link = link(&provider);
        link.connect(test_addr()).unwrap();
        link.connect(test_addr()).unwrap();
        assert!(link.is_connected());
        assert_eq!(provider.0.lock().unwrap().opens, 1);
    }

    #[test]
    fn test_connect_failure_leaves_disconnected() {
        let provider = MockProvider::default();
        provider.0.lock().unwrap().fail_open = true;
        let mut link = link(&provider);
        let err = link.connect(test_addr()).unwrap_err();
        assert!(matches!(err, ObdError::Transport(_)));
        assert!(!link.is_connected());
        let err = link
            .send_and_read(b"010C", 512, Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(err, ObdError::NotConnected);
    }

    #[test]
    fn test_send_requires_connection() {
        let provider = MockProvider::default();
        let mut link = link(&provider);
        let err = link
            .send_and_read(b"010C", 512, Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(err, ObdError::NotConnected);
        assert!(provider.0.lock().unwrap().writes.is_empty());
    }

    #[test]
    fn test_send_rejects_bad_arguments() {
        let provider = MockProvider::default();
        let mut link = link(&provider);
        link.connect(test_addr()).unwrap();
        assert!(matches!(
            link.send_and_read(b"", 512, Duration::from_millis(10)),
            Err(ObdError::InvalidArgument(_))
        ));
        assert!(matches!(
            link.send_and_read(b"010C", 0, Duration::from_millis(10)),
            Err(ObdError::InvalidArgument(_))
        ));
        assert!(provider.0.lock().unwrap().writes.is_empty());
    }

    #[test]
    fn test_send_appends_single_cr() {
        let provider = MockProvider::with_reply(&[b"OK>"]);
        provider.queue_reply(&[b"OK>"]);
        let mut link = link(&provider);
        link.connect(test_addr()).unwrap();
        link.send_and_read(b"010C", 512, Duration::from_millis(50))
            .unwrap();
        link.send_and_read(b"010C\r", 512, Duration::from_millis(50))
            .unwrap();
        let inner = provider.0.lock().unwrap();
        assert_eq!(inner.writes, vec![b"010C\r".to_vec(), b"010C\r".to_vec()]);
    }

    #[test]
    fn test_exchange_reassembles_reply() {
        let provider = MockProvider::with_reply(&[b"41 0C 0B", b"B8>"]);
        let mut link = link(&provider);
        link.connect(test_addr()).unwrap();
        let reply = link
            .send_and_read(b"010C", 512, Duration::from_millis(200))
            .unwrap();
        assert_eq!(reply.as_bytes(), b"41 0C 0BB8");
        assert_eq!(obdlog_elm327_lib::decode_rpm(reply.as_bytes()), Some(750));
    }

    #[test]
    fn test_write_failure_is_transport_error() {
        let provider = MockProvider::default();
        let mut link = link(&provider);
        link.connect(test_addr()).unwrap();
        provider.0.lock().unwrap().fail_write = true;
        let err = link
            .send_and_read(b"010C", 512, Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, ObdError::Transport(_)));
    }

    #[test]
    fn test_remote_close_observed_and_handle_reaped() {
        let provider = MockProvider::default();
        let mut link = link(&provider);
        link.connect(test_addr()).unwrap();
        link.events().link_closed();
        assert!(!link.is_connected());

        let err = link
            .send_and_read(b"010C", 512, Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(err, ObdError::NotConnected);
        assert_eq!(provider.0.lock().unwrap().closes, 1);

        link.connect(test_addr()).unwrap();
        assert!(link.is_connected());
        assert_eq!(provider.0.lock().unwrap().opens, 2);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let provider = MockProvider::default();
        let mut link = link(&provider);
        link.connect(test_addr()).unwrap();
        link.disconnect();
        link.disconnect();
        assert!(!link.is_connected());
        assert_eq!(provider.0.lock().unwrap().closes, 1);
    }
}
