//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Line-mode client driving a [`Connection`] from a single-threaded poll loop
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=vtlink=debug cargo run -p vtlink-connection --example poll_client -- telnet localhost 23
//! cargo run -p vtlink-connection --example poll_client -- raw localhost 7
//! ```
//!
//! Lines typed on stdin are sent with a trailing CR LF. End stdin (Ctrl+D) to quit.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vtlink_connection::autostart;
use vtlink_connection::{Connection, ConnectionConfig, ConnectionError, Protocol};

const IDLE: Duration = Duration::from_millis(10);

fn parse_protocol(name: &str) -> Option<Protocol> {
    match name {
        "telnet" => Some(Protocol::Telnet),
        "rlogin" => Some(Protocol::Rlogin),
        "raw" => Some(Protocol::Raw),
        _ => None,
    }
}

/// Spawn a thread forwarding stdin lines; the socket side stays on the main thread
fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn write_all(conn: &mut Connection, mut data: &[u8]) -> Result<(), ConnectionError> {
    while !data.is_empty() {
        match conn.write(data) {
            Ok(count) => data = &data[count..],
            Err(err) if err.is_would_block() => thread::sleep(IDLE),
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let (Some(protocol), Some(host), Some(port)) = (
        args.get(1).and_then(|name| parse_protocol(name)),
        args.get(2),
        args.get(3).and_then(|port| port.parse::<u16>().ok()),
    ) else {
        eprintln!("usage: poll_client <telnet|rlogin|raw> <host> <port>");
        std::process::exit(2);
    };

    let mut conn = Connection::new(protocol, ConnectionConfig::from_env());
    conn.connect_start(host, port)?;
    loop {
        match conn.connect_finish() {
            Ok(()) => break,
            Err(err) if err.is_would_block() => thread::sleep(IDLE),
            Err(err) => {
                warn!("Connect failed: {}", err);
                conn.connect_next()?;
            }
        }
    }
    info!(peer = ?conn.peer_addr(), "Connected");

    let lines = stdin_lines();
    let mut buf = [0u8; 4096];
    let mut stdout = io::stdout();
    loop {
        let mut idle = true;

        match conn.read(&mut buf) {
            Ok(0) => break,
            Ok(count) => {
                idle = false;
                if let Some(found) = autostart::scan(&buf[..count]) {
                    info!(transfer = %found.transfer, "Remote side started a file transfer");
                }
                stdout.write_all(&buf[..count])?;
                stdout.flush()?;
            }
            Err(err) if err.is_would_block() => {}
            Err(err) => return Err(err.into()),
        }

        // Rlogin control bytes arrive as urgent data
        match conn.read_oob() {
            Err(err) if err.is_would_block() => {}
            Err(err) => return Err(err.into()),
            Ok(_) => {}
        }

        match lines.try_recv() {
            Ok(line) => {
                idle = false;
                write_all(&mut conn, line.as_bytes())?;
                write_all(&mut conn, b"\r\n")?;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }

        if idle {
            thread::sleep(IDLE);
        }
    }

    conn.close();
    Ok(())
}
