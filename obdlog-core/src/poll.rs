//! The long-running polling loop.
//!
//! Each iteration ensures the link is up, runs one command session for the
//! RPM PID, decodes the reply and hands the sample to the storage sink.
//! Every failure is recovered locally: connect failures back off, a failed
//! exchange tears the link down and cools off, decode failures are logged
//! and skipped. Nothing escalates past the loop.

use std::thread;
use std::time::Duration;

use log::{info, warn};
use obdlog_elm327_lib::{decode_rpm, pid_request, MODE_CURRENT_DATA, PID_ENGINE_RPM};

use crate::address::BdAddr;
use crate::link::{LinkProvider, Obd2Link};
use crate::sample::{RpmSample, SampleSink};
use crate::session::Reply;

/// Poll interval used when the configured value is zero or negative.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
/// Wait after a failed connect attempt before the next iteration.
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);
/// Wait after a failed exchange; the link is torn down first, since a
/// failed read usually means a stale or dead connection.
const EXCHANGE_COOLDOWN: Duration = Duration::from_secs(1);
/// Total budget for one command/response exchange.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(3);
/// Upper bound on one reassembled reply.
const MAX_REPLY_LEN: usize = 512;

/// Poll interval from a configured millisecond value; non-positive values
/// fall back to [`DEFAULT_POLL_INTERVAL`].
#[must_use]
pub fn poll_interval_from_ms(ms: i64) -> Duration {
    match u64::try_from(ms) {
        Ok(ms) if ms > 0 => Duration::from_millis(ms),
        _ => DEFAULT_POLL_INTERVAL,
    }
}

/// How one iteration ended, and therefore how long to wait before the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    ConnectFailed,
    ExchangeFailed,
    Completed,
}

/// Periodic RPM poller over one adapter link.
pub struct Poller<P: LinkProvider, S: SampleSink> {
    link: Obd2Link<P>,
    sink: S,
    address: BdAddr,
    interval: Duration,
    command: String,
}

impl<P: LinkProvider, S: SampleSink> Poller<P, S> {
    pub fn new(link: Obd2Link<P>, sink: S, address: BdAddr, interval: Duration) -> Self {
        Self {
            link,
            sink,
            address,
            interval,
            command: pid_request(MODE_CURRENT_DATA, PID_ENGINE_RPM),
        }
    }

    /// Run forever. Only process termination ends the loop.
    pub fn run(&mut self) -> ! {
        info!(
            "polling adapter {} every {:?} for engine RPM",
            self.address, self.interval
        );
        loop {
            let wait = match self.cycle() {
                Cycle::ConnectFailed => CONNECT_RETRY_DELAY,
                Cycle::ExchangeFailed => EXCHANGE_COOLDOWN,
                Cycle::Completed => self.interval,
            };
            thread::sleep(wait);
        }
    }

    /// One iteration: ensure connected, execute, decode, log.
    fn cycle(&mut self) -> Cycle {
        if !self.link.is_connected() {
            info!("not connected, attempting connect to {}", self.address);
            if let Err(e) = self.link.connect(self.address) {
                warn!("connect failed: {e}, retrying in {CONNECT_RETRY_DELAY:?}");
                return Cycle::ConnectFailed;
            }
        }

        let reply = match self
            .link
            .send_and_read(self.command.as_bytes(), MAX_REPLY_LEN, COMMAND_TIMEOUT)
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!("exchange failed: {e}, dropping link");
                self.link.disconnect();
                return Cycle::ExchangeFailed;
            }
        };

        match &reply {
            Reply::NoData => warn!("no data for RPM request"),
            Reply::Data(raw) => match decode_rpm(raw) {
                Some(rpm) => {
                    info!("RPM: {rpm}");
                    let sample = RpmSample::now(rpm);
                    if let Err(e) = self.sink.append(&sample) {
                        warn!("failed to store sample: {e}");
                    }
                }
                None => warn!(
                    "failed to parse RPM, reply: {:?}",
                    String::from_utf8_lossy(raw)
                ),
            },
        }
        Cycle::Completed
    }
}
