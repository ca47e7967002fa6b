//! Response reassembly for one command/response exchange.
//!
//! The adapter answers each command with ASCII text terminated by the `>`
//! prompt, delivered as one or more chunks with no alignment guarantees.
//! [`read_reply`] drains the inbound queue under a single timeout budget and
//! assembles the reply; the command side of the exchange lives in
//! [`crate::link::Obd2Link::send_and_read`].

use std::time::{Duration, Instant};

use obdlog_elm327_lib::PROMPT;
use smallvec::SmallVec;

use crate::error::ObdError;
use crate::queue::ChunkQueue;

/// Reassembled reply bytes, prompt stripped.
pub type ReplyBuffer = SmallVec<[u8; 64]>;

/// Outcome of a command session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The timeout elapsed with zero reply bytes. Not an error.
    NoData,
    /// At least one byte of reply, trailing prompt removed.
    Data(ReplyBuffer),
}

impl Reply {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::NoData => &[],
            Self::Data(buf) => buf,
        }
    }

    #[must_use]
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }
}

/// Drain `queue` until the `>` prompt, `max_len - 1` bytes, or `timeout`.
///
/// The deadline is fixed at entry; every wait uses the currently remaining
/// time, so the total wait is bounded by `timeout` no matter how many chunks
/// trickle in. Copying stops at the prompt even when more bytes remain in
/// the same chunk; those residual bytes are discarded with the chunk.
pub fn read_reply(
    queue: &ChunkQueue,
    max_len: usize,
    timeout: Duration,
) -> Result<Reply, ObdError> {
    let deadline = Instant::now() + timeout;
    let limit = max_len.saturating_sub(1);
    let mut reply = ReplyBuffer::new();

    'collect: while reply.len() < limit {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match queue.pop(remaining) {
            Ok(Some(chunk)) => {
                for &byte in &chunk {
                    reply.push(byte);
                    if byte == PROMPT || reply.len() >= limit {
                        break 'collect;
                    }
                }
            }
            Ok(None) => break,
            Err(_) => {
                return Err(ObdError::Transport("inbound queue unavailable".to_string()));
            }
        }
    }

    if reply.last() == Some(&PROMPT) {
        reply.pop();
    }
    if reply.is_empty() {
        return Ok(Reply::NoData);
    }
    Ok(Reply::Data(reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{chunk_queue, Chunk};
    use std::thread;

    #[test]
    fn test_no_chunks_reports_no_data_after_timeout() {
        let (_tx, rx) = chunk_queue();
        let start = Instant::now();
        let reply = read_reply(&rx, 512, Duration::from_millis(80)).unwrap();
        assert!(reply.is_no_data());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(80));
        assert!(elapsed < Duration::from_millis(500));
    }

    #[test]
    fn test_multi_chunk_reply_with_trailing_prompt() {
        let (tx, rx) = chunk_queue();
        tx.push(Chunk::from_slice(b"41 0C 0B"));
        tx.push(Chunk::from_slice(b"B8>"));
        let reply = read_reply(&rx, 512, Duration::from_millis(200)).unwrap();
        assert_eq!(reply.as_bytes(), b"41 0C 0BB8");
    }

    #[test]
    fn test_prompt_returns_before_timeout() {
        let (tx, rx) = chunk_queue();
        let feeder = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.push(Chunk::from_slice(b"41 0C 1A F8"));
            thread::sleep(Duration::from_millis(20));
            tx.push(Chunk::from_slice(b"\r\r>"));
        });
        let start = Instant::now();
        let reply = read_reply(&rx, 512, Duration::from_secs(3)).unwrap();
        feeder.join().unwrap();
        assert_eq!(reply.as_bytes(), b"41 0C 1A F8\r\r");
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_reply_truncated_to_capacity() {
        let (tx, rx) = chunk_queue();
        tx.push(Chunk::from_slice(b"0123456789ABCDEF"));
        let reply = read_reply(&rx, 8, Duration::from_millis(200)).unwrap();
        assert_eq!(reply.as_bytes(), b"0123456");
    }

    #[test]
    fn test_residual_bytes_after_prompt_discarded() {
        let (tx, rx) = chunk_queue();
        tx.push(Chunk::from_slice(b"OK>41 0C"));
        let reply = read_reply(&rx, 512, Duration::from_millis(100)).unwrap();
        assert_eq!(reply.as_bytes(), b"OK");
        // The remainder of the chunk went away with it
        assert!(rx.pop(Duration::from_millis(10)).unwrap().is_none());
    }

    #[test]
    fn test_bare_prompt_is_no_data() {
        let (tx, rx) = chunk_queue();
        tx.push(Chunk::from_slice(b">"));
        let reply = read_reply(&rx, 512, Duration::from_millis(100)).unwrap();
        assert!(reply.is_no_data());
    }

    #[test]
    fn test_unavailable_queue_is_transport_failure() {
        let (tx, rx) = chunk_queue();
        drop(tx);
        let err = read_reply(&rx, 512, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, ObdError::Transport(_)));
    }
}
