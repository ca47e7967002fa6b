//! Mock ELM327 adapter for testing the obdlog poller
//!
//! Usage: cargo run -p obdlog-mock-elm327-server
//! Then point the logger at 127.0.0.1:35000, e.g.
//! `obdlog --bridge 127.0.0.1:35000`
//!
//! `--split` delivers every reply in two writes with a short pause, to
//! exercise multi-chunk reassembly in the client.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use obdlog_elm327_lib::encode_rpm;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 35000)]
    port: u16,

    /// Send each reply in two chunks with a short delay between them.
    #[arg(long)]
    split: bool,
}

fn main() {
    let args = Args::parse();
    let listener =
        TcpListener::bind(("0.0.0.0", args.port)).expect("Failed to bind mock adapter port");
    println!("Mock ELM327 ready on 0.0.0.0:{} - waiting for connections...", args.port);

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                println!("Client connected: {:?}", stream.peer_addr());
                let split = args.split;
                thread::spawn(move || handle_client(stream, split));
            }
            Err(e) => eprintln!("Connection error: {e}"),
        }
    }
}

fn handle_client(mut stream: TcpStream, split: bool) {
    let start_time = Instant::now();
    let mut buffer = Vec::new();
    let mut byte = [0u8; 1];
    let mut echo = true;

    loop {
        match stream.read(&mut byte) {
            Ok(0) => {
                println!("Client disconnected");
                break;
            }
            Ok(_) => {
                let ch = byte[0];

                if echo && stream.write_all(&byte).is_err() {
                    break;
                }

                // Carriage return terminates a command; linefeeds ignored
                if ch == b'\r' {
                    let command = String::from_utf8_lossy(&buffer).trim().to_uppercase();
                    if !command.is_empty() {
                        println!("RX: {command}");
                        let response = process_command(&command, &start_time, &mut echo);
                        println!("TX: {}", response.escape_debug());
                        if send_reply(&mut stream, response.as_bytes(), split).is_err() {
                            break;
                        }
                    }
                    buffer.clear();
                } else if ch != b'\n' {
                    buffer.push(ch);
                }
            }
            Err(e) => {
                eprintln!("Read error: {e}");
                break;
            }
        }
    }
}

fn send_reply(stream: &mut TcpStream, reply: &[u8], split: bool) -> std::io::Result<()> {
    if split && reply.len() > 2 {
        let mid = reply.len() / 2;
        stream.write_all(&reply[..mid])?;
        stream.flush()?;
        thread::sleep(Duration::from_millis(30));
        stream.write_all(&reply[mid..])
    } else {
        stream.write_all(reply)
    }
}

/// Ramp between idle and 3500 RPM so a watching client sees movement.
fn current_rpm(start_time: &Instant) -> u32 {
    const MIN_RPM: f32 = 800.0;
    const MAX_RPM: f32 = 3500.0;
    const RAMP_TIME: f32 = 4.0;
    const HOLD_TIME: f32 = 3.0;
    const CYCLE_TIME: f32 = 2.0 * (RAMP_TIME + HOLD_TIME);

    let phase = start_time.elapsed().as_secs_f32() % CYCLE_TIME;
    let rpm = if phase < RAMP_TIME {
        MIN_RPM + (MAX_RPM - MIN_RPM) * (phase / RAMP_TIME)
    } else if phase < RAMP_TIME + HOLD_TIME {
        MAX_RPM
    } else if phase < 2.0 * RAMP_TIME + HOLD_TIME {
        MAX_RPM - (MAX_RPM - MIN_RPM) * ((phase - RAMP_TIME - HOLD_TIME) / RAMP_TIME)
    } else {
        MIN_RPM
    };
    rpm as u32
}

fn process_command(cmd: &str, start_time: &Instant, echo: &mut bool) -> String {
    if cmd.starts_with("AT") {
        let reply = match cmd {
            "ATZ" => {
                *echo = true;
                "ELM327 v1.5"
            }
            "ATE0" => {
                *echo = false;
                "OK"
            }
            "ATE1" => {
                *echo = true;
                "OK"
            }
            _ => "OK",
        };
        return format!("\r{reply}\r\r>");
    }

    match cmd {
        "010C" => {
            let [a, b] = encode_rpm(current_rpm(start_time));
            format!("41 0C {a:02X} {b:02X}\r\r>")
        }
        _ => "?\r\r>".to_string(),
    }
}
