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

//! Login frame and window-size message ([RFC1282](https://tools.ietf.org/html/rfc1282))

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};

/// Line speed appended to the terminal type
pub const TERMINAL_SPEED: &str = "38400";

/// Magic cookie opening a window-size message
pub const WINDOW_MAGIC: [u8; 4] = [0xFF, 0xFF, b's', b's'];

/// Length of a window-size message
pub const WINDOW_MESSAGE_LEN: usize = 12;

/// Assumed character cell width in pixels
pub const CELL_WIDTH: u16 = 9;

/// Assumed character cell height in pixels
pub const CELL_HEIGHT: u16 = 16;

/// Urgent-data control bits sent by an rlogin server
pub mod control {
    /// Discard unprocessed screen data
    pub const FLUSH: u8 = 0x02;
    /// Stop interpreting flow-control characters
    pub const RAW: u8 = 0x10;
    /// Resume interpreting flow-control characters
    pub const COOKED: u8 = 0x20;
    /// Report the window size
    pub const WINDOW: u8 = 0x80;
}

/// What the client reports when it logs in
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoginInfo {
    /// Account on the local machine
    pub local_user: String,
    /// Account on the server; the local account when unset
    pub remote_user: Option<String>,
    /// Terminal type name
    pub terminal_type: String,
    /// Window height in lines
    pub lines: u16,
    /// Window width in columns
    pub columns: u16,
}

impl LoginInfo {
    /// Log in as `local_user` on a `terminal_type` terminal with an 80x24 window
    pub fn new(local_user: impl Into<String>, terminal_type: impl Into<String>) -> Self {
        LoginInfo {
            local_user: local_user.into(),
            remote_user: None,
            terminal_type: terminal_type.into(),
            lines: 24,
            columns: 80,
        }
    }

    /// Log in to a different account on the server
    #[must_use]
    pub fn with_remote_user(mut self, remote_user: impl Into<String>) -> Self {
        self.remote_user = Some(remote_user.into());
        self
    }

    /// Set the initial window size
    #[must_use]
    pub fn with_window(mut self, lines: u16, columns: u16) -> Self {
        self.lines = lines;
        self.columns = columns;
        self
    }

    /// Account name sent as the remote user
    pub fn effective_remote_user(&self) -> &str {
        self.remote_user.as_deref().unwrap_or(&self.local_user)
    }

    /// Append the login frame: `\0 local\0 remote\0 term/speed\0`
    pub fn encode(&self, dst: &mut BytesMut) {
        let remote = self.effective_remote_user();
        dst.reserve(
            self.local_user.len() + remote.len() + self.terminal_type.len() + TERMINAL_SPEED.len() + 5,
        );
        dst.put_u8(0);
        dst.put_slice(self.local_user.as_bytes());
        dst.put_u8(0);
        dst.put_slice(remote.as_bytes());
        dst.put_u8(0);
        dst.put_slice(self.terminal_type.as_bytes());
        dst.put_u8(b'/');
        dst.put_slice(TERMINAL_SPEED.as_bytes());
        dst.put_u8(0);
    }
}

/// Encode the 12-byte window-size message.
///
/// Rows, columns, then the pixel size derived from a 9x16 cell, all big-endian.
pub fn window_message(lines: u16, columns: u16) -> [u8; WINDOW_MESSAGE_LEN] {
    let mut message = [0u8; WINDOW_MESSAGE_LEN];
    message[..4].copy_from_slice(&WINDOW_MAGIC);
    BigEndian::write_u16(&mut message[4..6], lines);
    BigEndian::write_u16(&mut message[6..8], columns);
    BigEndian::write_u16(&mut message[8..10], columns.saturating_mul(CELL_WIDTH));
    BigEndian::write_u16(&mut message[10..12], lines.saturating_mul(CELL_HEIGHT));
    message
}
