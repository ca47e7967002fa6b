//! Request/response transport and connection-lifecycle engine for
//! ELM327-class OBD2 adapters on an SPP-style serial link.
//!
//! Architecture:
//! - Link provider (trait): opens/closes the serial channel, accepts bytes
//!   to transmit, delivers received chunks through [`LinkEvents`]
//! - Inbound chunk queue: bounded FIFO decoupling the provider's delivery
//!   context from the polling thread; drop-newest on overflow
//! - Command session: one command out, one reassembled reply back, under a
//!   total timeout budget
//! - Poller: connect/settle/retry supervision plus the periodic RPM request,
//!   decoded samples handed to a storage sink

pub mod address;
pub mod error;
pub mod link;
pub mod poll;
pub mod queue;
pub mod sample;
pub mod session;

pub use address::BdAddr;
pub use error::ObdError;
pub use link::{LinkEvents, LinkProvider, Obd2Link};
pub use poll::Poller;
pub use queue::{chunk_queue, Chunk, ChunkQueue, ChunkSender, QUEUE_CAPACITY};
pub use sample::{RpmSample, SampleSink};
pub use session::Reply;
