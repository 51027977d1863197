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


//! # vtlink Rlogin
//!
//! Client side of the BSD rlogin protocol ([RFC1282](https://tools.ietf.org/html/rfc1282)).
//!
//! The handshake is a single login frame of three NUL-terminated fields. After that the
//! stream carries raw bytes; the server steers the client with urgent (out-of-band) bytes:
//!
//! | Bit    | Meaning                                  |
//! |--------|------------------------------------------|
//! | `0x80` | Report the window size (12-byte message) |
//! | `0x02` | Discard unprocessed output               |
//! | `0x10` | Raw flow control                         |
//! | `0x20` | Cooked flow control                      |
//!
//! ```
//! use vtlink_rlogin::{LoginInfo, RloginSession};
//! use vtlink_transport::ScriptedTransport;
//!
//! let login = LoginInfo::new("alice", "vt100").with_remote_user("root");
//! let mut session = RloginSession::new(ScriptedTransport::new(), login);
//! session.start().unwrap();
//! assert_eq!(session.transport().written(), b"\0alice\0root\0vt100/38400\0");
//! ```

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

mod frame;
mod session;

pub use self::frame::{
    CELL_HEIGHT, CELL_WIDTH, LoginInfo, TERMINAL_SPEED, WINDOW_MAGIC, WINDOW_MESSAGE_LEN, control,
    window_message,
};
pub use self::session::{DEFAULT_RETRY_TIMEOUT, FlowControl, RloginSession};
