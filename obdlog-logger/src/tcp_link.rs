//! TCP bridge link provider.
//!
//! Carries the adapter's serial byte stream over a WiFi/TCP bridge
//! (`host:port`) when no Bluetooth stack is available. A reader thread per
//! connection is the asynchronous delivery context: it pushes chunks as the
//! socket yields them and reports closure when the stream ends.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use obdlog_core::{BdAddr, LinkEvents, LinkProvider};

/// Read buffer sized to a conservative serial-bridge MTU.
const CHUNK_BUF_LEN: usize = 256;

pub struct TcpLinkProvider {
    target: SocketAddr,
    connect_timeout: Duration,
}

pub struct TcpLinkHandle {
    stream: TcpStream,
}

impl TcpLinkProvider {
    pub fn new(target: SocketAddr, connect_timeout: Duration) -> Self {
        Self {
            target,
            connect_timeout,
        }
    }
}

impl LinkProvider for TcpLinkProvider {
    type Handle = TcpLinkHandle;

    fn open(&mut self, addr: BdAddr, events: LinkEvents) -> io::Result<TcpLinkHandle> {
        info!("opening bridge {} to adapter {addr}", self.target);
        let stream = TcpStream::connect_timeout(&self.target, self.connect_timeout)?;
        stream.set_nodelay(true)?;

        let reader = stream.try_clone()?;
        thread::Builder::new()
            .name("spp-rx".to_string())
            .spawn(move || delivery_loop(reader, events))?;

        Ok(TcpLinkHandle { stream })
    }

    fn write(&mut self, handle: &mut TcpLinkHandle, data: &[u8]) -> io::Result<()> {
        handle.stream.write_all(data)
    }

    fn close(&mut self, handle: TcpLinkHandle) {
        // Unblocks the reader thread, which then reports closure
        let _ = handle.stream.shutdown(Shutdown::Both);
    }
}

fn delivery_loop(mut stream: TcpStream, events: LinkEvents) {
    let mut buf = [0u8; CHUNK_BUF_LEN];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                debug!("bridge stream ended");
                break;
            }
            Ok(n) => events.chunk_received(&buf[..n]),
            Err(e) => {
                warn!("bridge read error: {e}");
                break;
            }
        }
    }
    events.link_closed();
}
