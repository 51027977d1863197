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

//! Telnet wire constants ([RFC854](https://tools.ietf.org/html/rfc854))

/// End of sub-negotiation parameters
pub const SE: u8 = 240;
/// No operation
pub const NOP: u8 = 241;
/// Data mark (data stream portion of a Synch)
pub const DM: u8 = 242;
/// NVT character BRK
pub const BRK: u8 = 243;
/// Interrupt Process
pub const IP: u8 = 244;
/// Abort Output
pub const AO: u8 = 245;
/// Are You There
pub const AYT: u8 = 246;
/// Erase Character
pub const EC: u8 = 247;
/// Erase Line
pub const EL: u8 = 248;
/// Go Ahead
pub const GA: u8 = 249;
/// Start of sub-negotiation
pub const SB: u8 = 250;
/// Sender wants to begin, or confirms, performing an option
pub const WILL: u8 = 251;
/// Sender refuses to perform, or stops performing, an option
pub const WONT: u8 = 252;
/// Sender asks the receiver to perform an option
pub const DO: u8 = 253;
/// Sender asks the receiver to stop performing an option
pub const DONT: u8 = 254;
/// Interpret As Command
pub const IAC: u8 = 255;

/// Carriage return
pub const CR: u8 = b'\r';
/// Line feed
pub const LF: u8 = b'\n';
/// NUL, the filler after a bare CR
pub const NUL: u8 = 0;

/// Option numbers handled by the engine
pub mod option {
    /// Binary Transmission [RFC856](https://tools.ietf.org/html/rfc856)
    pub const BINARY: u8 = 0;
    /// Echo [RFC857](https://tools.ietf.org/html/rfc857)
    pub const ECHO: u8 = 1;
    /// Suppress Go Ahead [RFC858](https://tools.ietf.org/html/rfc858)
    pub const SGA: u8 = 3;
    /// Terminal Type [RFC1091](https://tools.ietf.org/html/rfc1091)
    pub const TTYPE: u8 = 24;
    /// Negotiate About Window Size [RFC1073](https://tools.ietf.org/html/rfc1073)
    pub const NAWS: u8 = 31;
    /// Terminal Speed [RFC1079](https://tools.ietf.org/html/rfc1079)
    pub const TSPEED: u8 = 32;
    /// New Environment [RFC1572](https://tools.ietf.org/html/rfc1572)
    pub const NEW_ENVIRON: u8 = 39;
}

/// Sub-negotiation command codes shared by TTYPE, TSPEED and NEW-ENVIRON
pub mod subneg {
    /// Parameter report
    pub const IS: u8 = 0;
    /// Parameter request
    pub const SEND: u8 = 1;
    /// Unsolicited update (NEW-ENVIRON)
    pub const INFO: u8 = 2;
}

/// NEW-ENVIRON ([RFC1572](https://tools.ietf.org/html/rfc1572)) type codes
pub mod environ {
    /// Well-known variable name follows
    pub const VAR: u8 = 0;
    /// Variable value follows
    pub const VALUE: u8 = 1;
    /// Escape the next byte
    pub const ESC: u8 = 2;
    /// User-defined variable name follows
    pub const USERVAR: u8 = 3;
}

/// Maximum accumulated sub-negotiation length, option byte included
pub const SUBNEG_LIMIT: usize = 128;

/// Line speed reported in TSPEED and the rlogin terminal field
pub const TERMINAL_SPEED: &str = "38400";
