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

//! Sub-negotiation framing and the TTYPE, TSPEED, NEW-ENVIRON and NAWS payloads

use crate::consts::{self, environ, option, subneg};
use crate::result::{SubnegotiationErrorKind, TelnetError, TelnetResult};
use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};

/// Terminal description reported to the remote side
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TerminalInfo {
    /// Terminal type name, reported by TTYPE and NEW-ENVIRON (`TERM`)
    pub terminal_type: String,
    /// Locale, reported by NEW-ENVIRON (`LANG`)
    pub lang: String,
    /// Window size reported by NAWS
    pub window: WindowSize,
}

impl TerminalInfo {
    /// Describe a terminal with the default 80x24 window
    pub fn new(terminal_type: impl Into<String>, lang: impl Into<String>) -> Self {
        TerminalInfo {
            terminal_type: terminal_type.into(),
            lang: lang.into(),
            window: WindowSize::default(),
        }
    }

    /// Set the window size
    #[must_use]
    pub fn with_window(mut self, window: WindowSize) -> Self {
        self.window = window;
        self
    }
}

impl Default for TerminalInfo {
    fn default() -> Self {
        TerminalInfo::new("xterm", "en_US")
    }
}

/// Terminal window size in character cells.
///
/// ```
/// use vtlink_telnet::WindowSize;
///
/// let size = WindowSize::new(80, 24);
/// assert_eq!(size.cols, 80);
/// assert_eq!(size.rows, 24);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct WindowSize {
    /// Columns (width)
    pub cols: u16,
    /// Rows (height)
    pub rows: u16,
}

impl WindowSize {
    /// Create a window size
    pub fn new(cols: u16, rows: u16) -> Self {
        WindowSize { cols, rows }
    }

    /// The four-byte NAWS payload: width then height, big-endian
    pub fn to_bytes(&self) -> [u8; 4] {
        let mut bytes = [0u8; 4];
        BigEndian::write_u16(&mut bytes[0..2], self.cols);
        BigEndian::write_u16(&mut bytes[2..4], self.rows);
        bytes
    }

    /// Decode a four-byte NAWS payload
    pub fn parse(data: &[u8]) -> TelnetResult<WindowSize> {
        if data.len() < 4 {
            return Err(TelnetError::subnegotiation(
                option::NAWS,
                SubnegotiationErrorKind::InsufficientData {
                    required: 4,
                    available: data.len(),
                },
            ));
        }
        Ok(WindowSize {
            cols: BigEndian::read_u16(&data[0..2]),
            rows: BigEndian::read_u16(&data[2..4]),
        })
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        WindowSize { cols: 80, rows: 24 }
    }
}

/// Append `IAC SB <option> <payload> IAC SE`, doubling any IAC in the payload
pub fn frame(option: u8, payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(payload.len() + 6);
    dst.put_u8(consts::IAC);
    dst.put_u8(consts::SB);
    dst.put_u8(option);
    for &byte in payload {
        if byte == consts::IAC {
            dst.put_u8(consts::IAC);
        }
        dst.put_u8(byte);
    }
    dst.put_u8(consts::IAC);
    dst.put_u8(consts::SE);
}

/// NAWS report for `window`
pub fn naws(window: WindowSize, dst: &mut BytesMut) {
    frame(option::NAWS, &window.to_bytes(), dst);
}

/// `TTYPE IS <terminal>`
pub fn terminal_type_is(terminal_type: &str, dst: &mut BytesMut) {
    let mut payload = Vec::with_capacity(terminal_type.len() + 1);
    payload.push(subneg::IS);
    payload.extend_from_slice(terminal_type.as_bytes());
    frame(option::TTYPE, &payload, dst);
}

/// `TTYPE SEND`
pub fn terminal_type_send(dst: &mut BytesMut) {
    frame(option::TTYPE, &[subneg::SEND], dst);
}

/// `TSPEED IS <tx>,<rx>`
pub fn terminal_speed_is(dst: &mut BytesMut) {
    let speed = format!("{0},{0}", consts::TERMINAL_SPEED);
    let mut payload = Vec::with_capacity(speed.len() + 1);
    payload.push(subneg::IS);
    payload.extend_from_slice(speed.as_bytes());
    frame(option::TSPEED, &payload, dst);
}

/// `NEW-ENVIRON IS USERVAR TERM VALUE <term> USERVAR LANG VALUE <lang>`
pub fn environment_is(terminal: &TerminalInfo, dst: &mut BytesMut) {
    let mut payload = Vec::with_capacity(16 + terminal.terminal_type.len() + terminal.lang.len());
    payload.push(subneg::IS);
    for (name, value) in [("TERM", &terminal.terminal_type), ("LANG", &terminal.lang)] {
        payload.push(environ::USERVAR);
        payload.extend_from_slice(name.as_bytes());
        payload.push(environ::VALUE);
        push_environ_escaped(&mut payload, value.as_bytes());
    }
    frame(option::NEW_ENVIRON, &payload, dst);
}

/// Values must not contain raw NEW-ENVIRON type codes
fn push_environ_escaped(payload: &mut Vec<u8>, value: &[u8]) {
    for &byte in value {
        if matches!(
            byte,
            environ::VAR | environ::VALUE | environ::ESC | environ::USERVAR
        ) {
            payload.push(environ::ESC);
        }
        payload.push(byte);
    }
}

/// Parse `TTYPE IS <name>` as sent by a client
pub fn parse_terminal_type_is(data: &[u8]) -> TelnetResult<String> {
    match data.first() {
        Some(&subneg::IS) => Ok(String::from_utf8_lossy(&data[1..]).into_owned()),
        Some(&other) => Err(TelnetError::subnegotiation(
            option::TTYPE,
            SubnegotiationErrorKind::UnknownCommand(other),
        )),
        None => Err(TelnetError::subnegotiation(
            option::TTYPE,
            SubnegotiationErrorKind::InsufficientData {
                required: 1,
                available: 0,
            },
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naws_frame() {
        let mut dst = BytesMut::new();
        naws(WindowSize::new(80, 24), &mut dst);
        assert_eq!(&dst[..], &[255, 250, 31, 0, 80, 0, 24, 255, 240]);
    }

    #[test]
    fn test_naws_doubles_iac_bytes() {
        let mut dst = BytesMut::new();
        naws(WindowSize::new(0x00FF, 0xFF01), &mut dst);
        assert_eq!(
            &dst[..],
            &[255, 250, 31, 0, 255, 255, 255, 255, 1, 255, 240]
        );
    }

    #[test]
    fn test_terminal_type_is() {
        let mut dst = BytesMut::new();
        terminal_type_is("vt100", &mut dst);
        assert_eq!(&dst[..], b"\xff\xfa\x18\x00vt100\xff\xf0");
    }

    #[test]
    fn test_terminal_speed_is() {
        let mut dst = BytesMut::new();
        terminal_speed_is(&mut dst);
        assert_eq!(&dst[..], b"\xff\xfa\x20\x0038400,38400\xff\xf0");
    }

    #[test]
    fn test_environment_is() {
        let mut dst = BytesMut::new();
        environment_is(&TerminalInfo::new("ansi", "C"), &mut dst);
        assert_eq!(
            &dst[..],
            b"\xff\xfa\x27\x00\x03TERM\x01ansi\x03LANG\x01C\xff\xf0"
        );
    }

    #[test]
    fn test_window_size_parse() {
        assert_eq!(
            WindowSize::parse(&[0, 132, 0, 43]).unwrap(),
            WindowSize::new(132, 43)
        );
        assert!(WindowSize::parse(&[0, 132]).is_err());
        assert_eq!(WindowSize::new(300, 2).to_bytes(), [0x01, 0x2c, 0x00, 0x02]);
    }

    #[test]
    fn test_parse_terminal_type_is() {
        assert_eq!(parse_terminal_type_is(b"\x00XTERM").unwrap(), "XTERM");
        assert!(parse_terminal_type_is(b"\x01").is_err());
        assert!(parse_terminal_type_is(b"").is_err());
    }
}
