//! Decoded telemetry samples and the storage sink they are handed to.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One decoded engine-RPM reading. Ephemeral: handed to the sink and
/// dropped, never retained by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpmSample {
    /// Unix time of the decode, milliseconds.
    pub ts: u64,
    pub rpm: u32,
}

impl RpmSample {
    /// Sample stamped with the current wall-clock time.
    #[must_use]
    pub fn now(rpm: u32) -> Self {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self { ts, rpm }
    }
}

/// Append-only durable destination for decoded samples.
///
/// Best-effort: the polling loop logs append failures and keeps going.
pub trait SampleSink {
    fn append(&mut self, sample: &RpmSample) -> std::io::Result<()>;
}

/// In-memory sink for tests and dry runs.
#[derive(Debug, Default)]
pub struct VecSink(pub Vec<RpmSample>);

impl SampleSink for VecSink {
    fn append(&mut self, sample: &RpmSample) -> std::io::Result<()> {
        self.0.push(*sample);
        Ok(())
    }
}
