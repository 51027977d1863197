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

//! Option negotiation: supported options, NVT flags and the per-option response table

use crate::consts;
use std::fmt;

///
/// Telnet options this engine negotiates
///
/// [Telnet Options](https://www.iana.org/assignments/telnet-options/telnet-options.xhtml)
///
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TelnetOption {
    /// [`consts::option::BINARY`] Binary Transmission
    TransmitBinary,
    /// [`consts::option::ECHO`] Echo
    Echo,
    /// [`consts::option::SGA`] Suppress Go Ahead
    SuppressGoAhead,
    /// [`consts::option::TTYPE`] Terminal Type
    TerminalType,
    /// [`consts::option::NAWS`] Negotiate About Window Size
    NAWS,
    /// [`consts::option::TSPEED`] Terminal Speed
    TerminalSpeed,
    /// [`consts::option::NEW_ENVIRON`] New Environment
    NewEnvironment,
    /// Any option this engine refuses
    Unknown(u8),
}

impl TelnetOption {
    /// Map an option byte
    pub fn from_u8(byte: u8) -> TelnetOption {
        match byte {
            consts::option::BINARY => TelnetOption::TransmitBinary,
            consts::option::ECHO => TelnetOption::Echo,
            consts::option::SGA => TelnetOption::SuppressGoAhead,
            consts::option::TTYPE => TelnetOption::TerminalType,
            consts::option::NAWS => TelnetOption::NAWS,
            consts::option::TSPEED => TelnetOption::TerminalSpeed,
            consts::option::NEW_ENVIRON => TelnetOption::NewEnvironment,
            other => TelnetOption::Unknown(other),
        }
    }

    /// Option byte on the wire
    pub fn to_u8(self) -> u8 {
        match self {
            TelnetOption::TransmitBinary => consts::option::BINARY,
            TelnetOption::Echo => consts::option::ECHO,
            TelnetOption::SuppressGoAhead => consts::option::SGA,
            TelnetOption::TerminalType => consts::option::TTYPE,
            TelnetOption::NAWS => consts::option::NAWS,
            TelnetOption::TerminalSpeed => consts::option::TSPEED,
            TelnetOption::NewEnvironment => consts::option::NEW_ENVIRON,
            TelnetOption::Unknown(byte) => byte,
        }
    }

    /// Check if the engine negotiates this option at all
    pub fn is_supported(self) -> bool {
        !matches!(self, TelnetOption::Unknown(_))
    }

    /// Which side of the connection performs the option
    pub(crate) fn kind(self) -> OptionKind {
        match self {
            TelnetOption::TransmitBinary | TelnetOption::SuppressGoAhead => OptionKind::Symmetric,
            TelnetOption::Echo => OptionKind::ServerSourced,
            TelnetOption::TerminalType
            | TelnetOption::NAWS
            | TelnetOption::TerminalSpeed
            | TelnetOption::NewEnvironment => OptionKind::ClientSourced,
            TelnetOption::Unknown(_) => OptionKind::Refused,
        }
    }
}

impl From<u8> for TelnetOption {
    fn from(byte: u8) -> Self {
        TelnetOption::from_u8(byte)
    }
}

impl From<TelnetOption> for u8 {
    fn from(option: TelnetOption) -> Self {
        option.to_u8()
    }
}

impl fmt::Display for TelnetOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelnetOption::TransmitBinary => write!(f, "BINARY"),
            TelnetOption::Echo => write!(f, "ECHO"),
            TelnetOption::SuppressGoAhead => write!(f, "SGA"),
            TelnetOption::TerminalType => write!(f, "TTYPE"),
            TelnetOption::NAWS => write!(f, "NAWS"),
            TelnetOption::TerminalSpeed => write!(f, "TSPEED"),
            TelnetOption::NewEnvironment => write!(f, "NEW-ENVIRON"),
            TelnetOption::Unknown(byte) => write!(f, "UNKNOWN({})", byte),
        }
    }
}

/// Negotiation verb
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Verb {
    /// `IAC WILL`
    Will,
    /// `IAC WONT`
    Wont,
    /// `IAC DO`
    Do,
    /// `IAC DONT`
    Dont,
}

impl Verb {
    /// Map a command byte, if it is a negotiation verb
    pub fn from_u8(byte: u8) -> Option<Verb> {
        match byte {
            consts::WILL => Some(Verb::Will),
            consts::WONT => Some(Verb::Wont),
            consts::DO => Some(Verb::Do),
            consts::DONT => Some(Verb::Dont),
            _ => None,
        }
    }

    /// Command byte on the wire
    pub fn to_u8(self) -> u8 {
        match self {
            Verb::Will => consts::WILL,
            Verb::Wont => consts::WONT,
            Verb::Do => consts::DO,
            Verb::Dont => consts::DONT,
        }
    }

    /// `WILL` and `DO` enable, `WONT` and `DONT` disable
    pub fn is_positive(self) -> bool {
        matches!(self, Verb::Will | Verb::Do)
    }

    /// `WILL`/`WONT` speak about the sender's side
    fn is_local(self) -> bool {
        matches!(self, Verb::Will | Verb::Wont)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Will => write!(f, "WILL"),
            Verb::Wont => write!(f, "WONT"),
            Verb::Do => write!(f, "DO"),
            Verb::Dont => write!(f, "DONT"),
        }
    }
}

/// Which end of the connection this engine plays
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum NvtRole {
    /// Outbound connection
    #[default]
    Client,
    /// Accepted connection
    Server,
}

/// Per-connection Network Virtual Terminal flags.
///
/// Mutated only by option negotiation. The defaults are the RFC 854 NVT: seven-bit ASCII
/// with go-ahead, everything else off.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct NvtFlags {
    /// Remote echo in effect
    pub echo_mode: bool,
    /// Binary transmission in effect
    pub binary_mode: bool,
    /// Go-ahead in effect (cleared by SGA)
    pub go_ahead: bool,
    /// Window size reporting agreed
    pub do_naws: bool,
    /// Terminal type reporting agreed
    pub do_term_type: bool,
    /// Terminal speed reporting agreed
    pub do_term_speed: bool,
    /// Environment reporting agreed
    pub do_environment: bool,
}

impl Default for NvtFlags {
    fn default() -> Self {
        NvtFlags {
            echo_mode: false,
            binary_mode: false,
            go_ahead: true,
            do_naws: false,
            do_term_type: false,
            do_term_speed: false,
            do_environment: false,
        }
    }
}

impl NvtFlags {
    /// Whether `option` is currently in effect
    pub fn is_enabled(&self, option: TelnetOption) -> bool {
        match option {
            TelnetOption::TransmitBinary => self.binary_mode,
            TelnetOption::Echo => self.echo_mode,
            TelnetOption::SuppressGoAhead => !self.go_ahead,
            TelnetOption::TerminalType => self.do_term_type,
            TelnetOption::NAWS => self.do_naws,
            TelnetOption::TerminalSpeed => self.do_term_speed,
            TelnetOption::NewEnvironment => self.do_environment,
            TelnetOption::Unknown(_) => false,
        }
    }

    /// Switch `option` on or off; returns the previous state
    pub(crate) fn set(&mut self, option: TelnetOption, enabled: bool) -> bool {
        let previous = self.is_enabled(option);
        match option {
            TelnetOption::TransmitBinary => self.binary_mode = enabled,
            TelnetOption::Echo => self.echo_mode = enabled,
            TelnetOption::SuppressGoAhead => self.go_ahead = !enabled,
            TelnetOption::TerminalType => self.do_term_type = enabled,
            TelnetOption::NAWS => self.do_naws = enabled,
            TelnetOption::TerminalSpeed => self.do_term_speed = enabled,
            TelnetOption::NewEnvironment => self.do_environment = enabled,
            TelnetOption::Unknown(_) => {}
        }
        previous
    }
}

/// Who performs an option
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum OptionKind {
    /// Either side may perform it (BINARY, SGA)
    Symmetric,
    /// Only the server performs it (ECHO)
    ServerSourced,
    /// Only the client performs it (TTYPE, NAWS, TSPEED, NEW-ENVIRON)
    ClientSourced,
    /// Not supported
    Refused,
}

/// Follow-up work a negotiation triggers beyond the verb reply
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum FollowUp {
    None,
    /// Report the window size now
    SendWindowSize,
    /// Ask the peer for its terminal type
    RequestTerminalType,
}

/// Outcome of one received negotiation
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Response {
    /// New flag value, if the flag changes
    pub(crate) flag: Option<bool>,
    /// Verb to answer with, if any
    pub(crate) reply: Option<Verb>,
    /// Extra action on an off-to-on transition
    pub(crate) follow_up: FollowUp,
    /// The reply refuses a positive request and goes out every time it is asked
    pub(crate) refusal: bool,
}

impl Response {
    const fn new(flag: Option<bool>, reply: Option<Verb>) -> Self {
        Response {
            flag,
            reply,
            follow_up: FollowUp::None,
            refusal: false,
        }
    }

    const fn refuse(reply: Verb) -> Self {
        Response {
            flag: None,
            reply: Some(reply),
            follow_up: FollowUp::None,
            refusal: true,
        }
    }

    const fn then(mut self, follow_up: FollowUp) -> Self {
        self.follow_up = follow_up;
        self
    }
}

/// Response table: how `role` answers `verb` for `option`.
///
/// Positive requests for options the other side is supposed to perform are refused, and
/// a refusal is repeated for every request. Negative requests always clear the flag and are
/// acknowledged with the matching negative.
pub(crate) fn respond(role: NvtRole, option: TelnetOption, verb: Verb) -> Response {
    use Verb::{Do, Dont, Will, Wont};
    match (option.kind(), role, verb) {
        (OptionKind::Refused, _, Do) => Response::refuse(Wont),
        (OptionKind::Refused, _, Will) => Response::refuse(Dont),
        (OptionKind::Refused, _, Wont | Dont) => Response::new(None, None),

        (OptionKind::Symmetric, _, Will) => Response::new(Some(true), Some(Do)),
        (OptionKind::Symmetric, _, Do) => Response::new(Some(true), Some(Will)),
        (OptionKind::Symmetric, _, Wont) => Response::new(Some(false), Some(Dont)),
        (OptionKind::Symmetric, _, Dont) => Response::new(Some(false), Some(Wont)),

        (OptionKind::ServerSourced, NvtRole::Client, Will) => Response::new(Some(true), Some(Do)),
        (OptionKind::ServerSourced, NvtRole::Client, Do) => Response::refuse(Wont),
        (OptionKind::ServerSourced, NvtRole::Server, Do) => Response::new(Some(true), Some(Will)),
        (OptionKind::ServerSourced, NvtRole::Server, Will) => Response::refuse(Dont),
        (OptionKind::ServerSourced, _, Wont) => Response::new(Some(false), Some(Dont)),
        (OptionKind::ServerSourced, _, Dont) => Response::new(Some(false), Some(Wont)),

        (OptionKind::ClientSourced, NvtRole::Client, Will | Do) => {
            let response = Response::new(Some(true), Some(Will));
            if option == TelnetOption::NAWS {
                response.then(FollowUp::SendWindowSize)
            } else {
                response
            }
        }
        (OptionKind::ClientSourced, NvtRole::Client, Wont | Dont) => {
            Response::new(Some(false), Some(Wont))
        }
        (OptionKind::ClientSourced, NvtRole::Server, Will) => {
            let response = Response::new(Some(true), Some(Do));
            if option == TelnetOption::TerminalType {
                response.then(FollowUp::RequestTerminalType)
            } else {
                response
            }
        }
        (OptionKind::ClientSourced, NvtRole::Server, Do) => Response::refuse(Wont),
        (OptionKind::ClientSourced, NvtRole::Server, Wont) => {
            Response::new(Some(false), Some(Dont))
        }
        (OptionKind::ClientSourced, NvtRole::Server, Dont) => {
            Response::new(Some(false), Some(Wont))
        }
    }
}

/// Option requests sent when a connection starts
pub(crate) fn initial_requests(role: NvtRole) -> &'static [(Verb, TelnetOption)] {
    match role {
        NvtRole::Client => &[
            (Verb::Will, TelnetOption::TransmitBinary),
            (Verb::Do, TelnetOption::TransmitBinary),
            (Verb::Will, TelnetOption::SuppressGoAhead),
            (Verb::Do, TelnetOption::SuppressGoAhead),
            (Verb::Will, TelnetOption::NAWS),
            (Verb::Will, TelnetOption::TerminalType),
            (Verb::Will, TelnetOption::NewEnvironment),
        ],
        NvtRole::Server => &[
            (Verb::Will, TelnetOption::TransmitBinary),
            (Verb::Do, TelnetOption::TransmitBinary),
            (Verb::Will, TelnetOption::SuppressGoAhead),
            (Verb::Do, TelnetOption::SuppressGoAhead),
            (Verb::Will, TelnetOption::Echo),
            (Verb::Do, TelnetOption::TerminalType),
            (Verb::Do, TelnetOption::NAWS),
        ],
    }
}

/// Last verb this side put on the wire, per option and direction.
///
/// Suppresses identical re-announcements so two engines can never ping-pong.
#[derive(Clone, Debug)]
pub(crate) struct Announcements {
    local: [Option<bool>; 256],
    remote: [Option<bool>; 256],
}

impl Default for Announcements {
    fn default() -> Self {
        Announcements {
            local: [None; 256],
            remote: [None; 256],
        }
    }
}

impl Announcements {
    /// Record `verb` for `option`; returns false if it repeats the last announcement
    pub(crate) fn record(&mut self, verb: Verb, option: TelnetOption) -> bool {
        let slot = if verb.is_local() {
            &mut self.local[usize::from(option.to_u8())]
        } else {
            &mut self.remote[usize::from(option.to_u8())]
        };
        if *slot == Some(verb.is_positive()) {
            return false;
        }
        *slot = Some(verb.is_positive());
        true
    }
}
