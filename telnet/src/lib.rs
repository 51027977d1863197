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

//! # vtlink Telnet Network Virtual Terminal
//!
//! Byte-level telnet (RFC 854) engine for a terminal emulator: option negotiation,
//! sub-negotiation framing, IAC escaping and NVT ASCII CR canonicalization.
//!
//! ## Core Components
//!
//! ### [`TelnetCodec`]
//!
//! The pure state machine. It never touches a socket: raw bytes in, payload out; payload
//! in, framed bytes out. Replies it wants to send on its own are queued and drained with
//! [`TelnetCodec::take_replies`]. It also implements `tokio_util::codec::{Decoder, Encoder}`.
//!
//! ### [`TelnetSession`]
//!
//! A codec bound to a non-blocking [`vtlink_transport::Transport`], exposing the POSIX
//! `read()`/`write()` contract the rest of vtlink relies on.
//!
//! ## Negotiated Options
//!
//! | Option              | Number | Client                     | Server                 |
//! |---------------------|--------|----------------------------|------------------------|
//! | Binary Transmission | 0      | requests both directions   | requests both          |
//! | Echo                | 1      | accepts remote echo        | offers echo            |
//! | Suppress Go Ahead   | 3      | requests both directions   | requests both          |
//! | Terminal Type       | 24     | offers, answers `SEND`     | asks, records `IS`     |
//! | NAWS                | 31     | offers, reports on resize  | asks, records the size |
//! | Terminal Speed      | 32     | answers `SEND`             | accepts `WILL`         |
//! | New Environment     | 39     | offers, answers `SEND`     | accepts `WILL`         |
//!
//! A server never performs the client-sourced options itself: `DO` for any of them is
//! answered with `WONT`. Every other option is refused (`DO` with `WONT`, `WILL` with
//! `DONT`), and a refusal is sent again for every repeated request.
//!
//! ## Example
//!
//! ```
//! use vtlink_telnet::{TelnetCodec, TerminalInfo, TelnetSession};
//! use vtlink_transport::ScriptedTransport;
//!
//! let mut transport = ScriptedTransport::new();
//! transport.push_read(b"Welcome\r\n\xff\xfd\x1f");
//!
//! let codec = TelnetCodec::client(TerminalInfo::new("vt100", "en_US"));
//! let mut session = TelnetSession::new(transport, codec);
//! let mut buf = [0u8; 64];
//! let count = session.read(&mut buf).unwrap();
//! assert_eq!(&buf[..count], b"Welcome\r\n");
//! assert!(session.flags().do_naws);
//! ```
//!
//! ## Related RFCs
//!
//! - RFC 854: Telnet Protocol Specification
//! - RFC 856: Telnet Binary Transmission
//! - RFC 857: Telnet Echo Option
//! - RFC 858: Telnet Suppress Go Ahead Option
//! - RFC 1073: Telnet Window Size Option
//! - RFC 1079: Telnet Terminal Speed Option
//! - RFC 1091: Telnet Terminal-Type Option
//! - RFC 1572: Telnet Environment Option

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

mod codec;
pub mod consts;
mod options;
mod result;
mod session;
pub mod subneg;

pub use self::codec::{TelnetCodec, TelnetCommand};
pub use self::options::{NvtFlags, NvtRole, TelnetOption, Verb};
pub use self::result::{SubnegotiationErrorKind, TelnetError, TelnetResult};
pub use self::session::{DEFAULT_RETRY_TIMEOUT, TelnetSession};
pub use self::subneg::{TerminalInfo, WindowSize};
