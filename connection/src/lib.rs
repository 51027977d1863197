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


//! # vtlink Connection
//!
//! The single entry point a terminal emulator drives: one [`Connection`] per session, one
//! socket descriptor to poll, and the same `read()`/`write()` contract whichever protocol
//! runs underneath.
//!
//! ## Protocols
//!
//! - [`Protocol::Telnet`]: NVT engine from `vtlink-telnet`; outbound connections run the
//!   client side, accepted connections the server side
//! - [`Protocol::Rlogin`]: handshake engine from `vtlink-rlogin`, client side only, from a
//!   privileged local port
//! - [`Protocol::Ssh`]: an external library session attached with
//!   [`Connection::attach_ssh`] after the TCP connect completes
//! - [`Protocol::Raw`]: plain 8-bit pass-through
//!
//! ## Poll Loop
//!
//! ```no_run
//! use vtlink_connection::{Connection, ConnectionConfig, Protocol};
//!
//! let mut conn = Connection::new(Protocol::Telnet, ConnectionConfig::from_env());
//! conn.connect_start("localhost", 23)?;
//! loop {
//!     // wait for the descriptor from `conn.raw_fd()` to become writable
//!     match conn.connect_finish() {
//!         Ok(()) => break,
//!         Err(err) if err.is_would_block() => continue,
//!         Err(err) => return Err(err),
//!     }
//! }
//! let mut buf = [0u8; 4096];
//! match conn.read(&mut buf) {
//!     Ok(0) => println!("closed"),
//!     Ok(n) => println!("{}", String::from_utf8_lossy(&buf[..n])),
//!     Err(err) if err.is_would_block() => {}
//!     Err(err) => return Err(err),
//! }
//! # Ok::<(), vtlink_connection::ConnectionError>(())
//! ```
//!
//! ## Observability
//!
//! Lifecycle events are logged through `tracing`; byte and connection counts are reported
//! through the `metrics` facade under `vtlink.*`. Neither a subscriber nor a recorder is
//! installed by this crate.

#![warn(
    clippy::cargo,
    missing_docs,
    clippy::pedantic,
    future_incompatible,
    rust_2018_idioms
)]
#![allow(
    clippy::option_if_let_else,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc
)]

pub mod autostart;
mod config;
mod connection;
mod error;
mod raw;
pub mod ssh;

pub use self::config::{ConnectionConfig, DEFAULT_LISTEN_PORTS};
pub use self::connection::{Connection, Protocol};
pub use self::error::{ConnectionError, ConnectionResult};
pub use self::raw::RawSession;
pub use vtlink_telnet::{NvtRole, TelnetCommand};
pub use vtlink_transport::{Flushed, NegotiationState, PortSpec};
