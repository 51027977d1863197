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

//! # vtlink Transport
//!
//! Non-blocking TCP plumbing shared by the vtlink protocol engines.
//!
//! ## Core Components
//!
//! - [`Transport`]: the raw byte channel every engine reads from and writes to
//! - [`RawSocket`] / [`RawListener`]: two-phase connect, listen and accept over `socket2`
//! - [`RawInput`] / [`RawOutput`]: fixed-capacity buffers between the kernel and a decoder
//!   or encoder
//! - [`NegotiationState`]: handshake progress shared by telnet and rlogin
//!
//! ## Read Discipline
//!
//! Every read follows the same contract:
//!
//! - `Ok(n)` with `n > 0`: payload
//! - `Err(TransportError::WouldBlock)`: nothing available, try again when readable
//! - a closed stream yields [`CONNECTION_CLOSED`] once, then `Ok(0)` forever
//!
//! Nothing in this crate spawns threads or waits on the network; the caller owns the
//! poll loop.

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

mod buffer;
mod io;
mod result;
#[cfg(any(test, feature = "test-util"))]
mod scripted;
mod socket;
mod state;

pub use self::buffer::{
    CONNECTION_CLOSED, DEFAULT_BUFFER_SIZE, EofPoll, MIN_BUFFER_SIZE, Flushed, RawInput, RawOutput,
    write_all_retry,
};
pub use self::io::Transport;
pub use self::result::{TransportError, TransportResult, is_would_block};
#[cfg(any(test, feature = "test-util"))]
pub use self::scripted::{ScriptedTransport, WriteStep};
pub use self::socket::{
    LocalBind, MAX_PORT_ATTEMPTS, PRIVILEGED_PORTS, PortSpec, RawListener, RawSocket, resolve,
};
pub use self::state::NegotiationState;
