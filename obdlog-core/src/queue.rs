//! Bounded inbound chunk queue.
//!
//! Single producer (the link provider's delivery context), single consumer
//! (the response reader on the polling thread). The producer side never
//! blocks: at capacity the newest arrival is dropped and counted, so the
//! delivery path stays bounded no matter how far the consumer falls behind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use smallvec::SmallVec;

/// One delivery unit of raw bytes from the link provider. Chunk boundaries
/// carry no protocol meaning; a reply may span several chunks.
pub type Chunk = SmallVec<[u8; 32]>;

/// Queue depth. Arrivals beyond this are dropped on the producer side.
pub const QUEUE_CAPACITY: usize = 16;

/// Producer handle, called from the link provider's delivery context.
#[derive(Clone)]
pub struct ChunkSender {
    tx: SyncSender<Chunk>,
    dropped: Arc<AtomicU64>,
}

/// Consumer handle, owned by the polling thread.
pub struct ChunkQueue {
    rx: Receiver<Chunk>,
}

/// Create a connected producer/consumer pair with [`QUEUE_CAPACITY`] slots.
#[must_use]
pub fn chunk_queue() -> (ChunkSender, ChunkQueue) {
    let (tx, rx) = mpsc::sync_channel(QUEUE_CAPACITY);
    (
        ChunkSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        ChunkQueue { rx },
    )
}

impl ChunkSender {
    /// Enqueue a chunk without blocking. At capacity the chunk is discarded
    /// and the overflow counter bumped; the caller never sees a failure.
    pub fn push(&self, chunk: Chunk) {
        match self.tx.try_send(chunk) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("inbound queue full, dropping chunk ({total} dropped so far)");
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("inbound queue consumer gone, dropping chunk");
            }
        }
    }

    /// Total chunks discarded because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl ChunkQueue {
    /// Wait up to `timeout` for the next chunk in arrival order.
    ///
    /// `Ok(None)` means the timeout elapsed with nothing enqueued. `Err`
    /// means the producer side is gone and no chunk can ever arrive.
    pub fn pop(&self, timeout: Duration) -> Result<Option<Chunk>, RecvTimeoutError> {
        match self.rx.recv_timeout(timeout) {
            Ok(chunk) => Ok(Some(chunk)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(e @ RecvTimeoutError::Disconnected) => Err(e),
        }
    }
}
