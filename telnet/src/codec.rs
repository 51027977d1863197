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

use crate::consts::{self, CR, IAC, LF, NUL, option, subneg as subcmd};
use crate::options::{Announcements, FollowUp, NvtFlags, NvtRole, TelnetOption, Verb, respond};
use crate::result::{SubnegotiationErrorKind, TelnetError, TelnetResult};
use crate::subneg::{self, TerminalInfo, WindowSize};
use bytes::{BufMut, BytesMut};
use std::fmt;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace, warn};

/// Telnet commands the caller may send
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TelnetCommand {
    /// No operation
    NoOperation,
    /// Data mark
    DataMark,
    /// Break
    Break,
    /// Interrupt process
    InterruptProcess,
    /// Abort output
    AbortOutput,
    /// Are you there
    AreYouThere,
    /// Erase character
    EraseCharacter,
    /// Erase line
    EraseLine,
    /// Go ahead
    GoAhead,
}

impl TelnetCommand {
    /// Command byte following IAC
    pub fn to_u8(self) -> u8 {
        match self {
            TelnetCommand::NoOperation => consts::NOP,
            TelnetCommand::DataMark => consts::DM,
            TelnetCommand::Break => consts::BRK,
            TelnetCommand::InterruptProcess => consts::IP,
            TelnetCommand::AbortOutput => consts::AO,
            TelnetCommand::AreYouThere => consts::AYT,
            TelnetCommand::EraseCharacter => consts::EC,
            TelnetCommand::EraseLine => consts::EL,
            TelnetCommand::GoAhead => consts::GA,
        }
    }

    /// Map a command byte, if it is one of the simple commands
    pub fn from_u8(byte: u8) -> Option<TelnetCommand> {
        match byte {
            consts::NOP => Some(TelnetCommand::NoOperation),
            consts::DM => Some(TelnetCommand::DataMark),
            consts::BRK => Some(TelnetCommand::Break),
            consts::IP => Some(TelnetCommand::InterruptProcess),
            consts::AO => Some(TelnetCommand::AbortOutput),
            consts::AYT => Some(TelnetCommand::AreYouThere),
            consts::EC => Some(TelnetCommand::EraseCharacter),
            consts::EL => Some(TelnetCommand::EraseLine),
            consts::GA => Some(TelnetCommand::GoAhead),
            _ => None,
        }
    }
}

impl fmt::Display for TelnetCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TelnetCommand::NoOperation => "NOP",
            TelnetCommand::DataMark => "DM",
            TelnetCommand::Break => "BRK",
            TelnetCommand::InterruptProcess => "IP",
            TelnetCommand::AbortOutput => "AO",
            TelnetCommand::AreYouThere => "AYT",
            TelnetCommand::EraseCharacter => "EC",
            TelnetCommand::EraseLine => "EL",
            TelnetCommand::GoAhead => "GA",
        };
        write!(f, "{}", name)
    }
}

/// Telnet Network Virtual Terminal state machine.
///
/// `TelnetCodec` performs no I/O. Raw bytes go in through [`TelnetCodec::decode_into`] and
/// come out as payload; payload goes in through [`TelnetCodec::encode_into`] and comes out
/// framed. Everything the engine wants to say on its own (option requests, negotiation
/// replies, sub-negotiation answers) collects in a reply queue drained with
/// [`TelnetCodec::take_replies`].
///
/// The codec also implements the `tokio_util` [`Decoder`] and [`Encoder`] traits so it can be
/// driven over an async stream:
///
/// ```
/// use bytes::BytesMut;
/// use tokio_util::codec::Decoder;
/// use vtlink_telnet::TelnetCodec;
///
/// let mut codec = TelnetCodec::default();
/// let mut src = BytesMut::from(&b"login: \xff\xfb\x01"[..]);
/// let payload = codec.decode(&mut src).unwrap().unwrap();
/// assert_eq!(&payload[..], b"login: ");
/// assert!(codec.flags().echo_mode);
/// // IAC DO ECHO
/// assert_eq!(&codec.take_replies()[..], b"\xff\xfd\x01");
/// ```
#[derive(Debug)]
pub struct TelnetCodec {
    role: NvtRole,
    terminal: TerminalInfo,
    flags: NvtFlags,
    announced: Announcements,
    decoder_state: DecoderState,
    read_cr: bool,
    subneg_buffer: BytesMut,
    subneg_overflow: bool,
    replies: BytesMut,
    peer_terminal_type: Option<String>,
    peer_window: Option<WindowSize>,
}

impl TelnetCodec {
    /// Create an engine playing `role` and describing `terminal`
    pub fn new(role: NvtRole, terminal: TerminalInfo) -> TelnetCodec {
        TelnetCodec {
            role,
            terminal,
            flags: NvtFlags::default(),
            announced: Announcements::default(),
            decoder_state: DecoderState::NormalData,
            read_cr: false,
            subneg_buffer: BytesMut::with_capacity(consts::SUBNEG_LIMIT),
            subneg_overflow: false,
            replies: BytesMut::new(),
            peer_terminal_type: None,
            peer_window: None,
        }
    }

    /// Client engine for an outbound connection
    pub fn client(terminal: TerminalInfo) -> TelnetCodec {
        TelnetCodec::new(NvtRole::Client, terminal)
    }

    /// Server engine for an accepted connection
    pub fn server(terminal: TerminalInfo) -> TelnetCodec {
        TelnetCodec::new(NvtRole::Server, terminal)
    }

    /// Role this engine plays
    pub fn role(&self) -> NvtRole {
        self.role
    }

    /// Current NVT flags
    pub fn flags(&self) -> &NvtFlags {
        &self.flags
    }

    /// Terminal description reported to the peer
    pub fn terminal(&self) -> &TerminalInfo {
        &self.terminal
    }

    /// Terminal type the peer reported (server role)
    pub fn peer_terminal_type(&self) -> Option<&str> {
        self.peer_terminal_type.as_deref()
    }

    /// Window size the peer reported (server role)
    pub fn peer_window_size(&self) -> Option<WindowSize> {
        self.peer_window
    }

    /// Check if a decoded CR is waiting for its successor byte
    pub fn has_pending_cr(&self) -> bool {
        self.read_cr
    }

    /// Queue the initial option requests for this role.
    pub fn start(&mut self) {
        for &(verb, option) in crate::options::initial_requests(self.role) {
            self.announce(verb, option);
        }
    }

    /// Update the window size, reporting it if NAWS is in effect.
    ///
    /// Returns true if a NAWS report was queued.
    pub fn set_window_size(&mut self, window: WindowSize) -> bool {
        self.terminal.window = window;
        if self.role == NvtRole::Client && self.flags.do_naws {
            debug!(cols = window.cols, rows = window.rows, "Sending NAWS");
            subneg::naws(window, &mut self.replies);
            true
        } else {
            trace!(cols = window.cols, rows = window.rows, "Window size recorded");
            false
        }
    }

    /// Queue `IAC <command>`
    pub fn queue_command(&mut self, command: TelnetCommand) {
        debug!("Sending IAC {}", command);
        self.replies.put_u8(IAC);
        self.replies.put_u8(command.to_u8());
    }

    /// Check if replies are waiting to be sent
    pub fn has_replies(&self) -> bool {
        !self.replies.is_empty()
    }

    /// Remove and return every queued reply byte, in order
    pub fn take_replies(&mut self) -> BytesMut {
        self.replies.split()
    }

    /// Emit a pending CR as a bare CR. Used once the stream has ended.
    pub fn flush_pending_cr(&mut self, dst: &mut BytesMut) {
        if self.read_cr {
            self.read_cr = false;
            dst.put_u8(CR);
        }
    }

    /// Decode raw bytes, appending payload to `dst`.
    ///
    /// Every byte of `src` is consumed; partial protocol sequences are carried in the decoder
    /// state. Returns the number of payload bytes appended, which is zero when `src` held only
    /// protocol bytes.
    pub fn decode_into(&mut self, src: &[u8], dst: &mut BytesMut) -> usize {
        let start = dst.len();
        dst.reserve(src.len() + 1);
        for &byte in src {
            match (self.decoder_state, byte) {
                (DecoderState::NormalData, IAC) => {
                    self.decoder_state = DecoderState::InterpretAsCommand;
                }
                (DecoderState::NormalData, _) => self.push_data(byte, dst),
                (DecoderState::InterpretAsCommand, IAC) => {
                    self.decoder_state = DecoderState::NormalData;
                    self.flush_pending_cr(dst);
                    dst.put_u8(IAC);
                }
                (DecoderState::InterpretAsCommand, consts::SB) => {
                    self.decoder_state = DecoderState::Subnegotiate;
                    self.subneg_buffer.clear();
                    self.subneg_overflow = false;
                }
                (DecoderState::InterpretAsCommand, consts::WILL..=consts::DONT) => {
                    self.decoder_state = match Verb::from_u8(byte) {
                        Some(verb) => DecoderState::Negotiate(verb),
                        None => DecoderState::NormalData,
                    };
                }
                (DecoderState::InterpretAsCommand, consts::SE) => {
                    trace!("Ignoring SE outside subnegotiation");
                    self.decoder_state = DecoderState::NormalData;
                }
                (DecoderState::InterpretAsCommand, _) => {
                    self.decoder_state = DecoderState::NormalData;
                    match TelnetCommand::from_u8(byte) {
                        Some(command) => trace!("Received IAC {}", command),
                        None => warn!("Received Unknown Command {:#X}", byte),
                    }
                }
                (DecoderState::Negotiate(verb), _) => {
                    self.decoder_state = DecoderState::NormalData;
                    self.negotiate(verb, TelnetOption::from_u8(byte));
                }
                (DecoderState::Subnegotiate, IAC) => {
                    self.decoder_state = DecoderState::SubnegotiateIac;
                }
                (DecoderState::Subnegotiate, _) => self.push_subneg(byte),
                (DecoderState::SubnegotiateIac, IAC) => {
                    self.decoder_state = DecoderState::Subnegotiate;
                    self.push_subneg(IAC);
                }
                (DecoderState::SubnegotiateIac, consts::SE) => {
                    self.decoder_state = DecoderState::NormalData;
                    self.finish_subneg();
                }
                (DecoderState::SubnegotiateIac, _) => {
                    self.decoder_state = DecoderState::Subnegotiate;
                    warn!(
                        "Received Unknown or invalid Command during Subnegotiation {:#X}. Dropped",
                        byte
                    );
                }
            }
        }
        dst.len() - start
    }

    /// Frame payload bytes, writing at most `limit` bytes to `dst`.
    ///
    /// IAC is always doubled. Outside binary mode a CR followed by LF goes out as CR LF and
    /// any other CR goes out as CR NUL, including a CR that ends `src`. Returns the number of
    /// `src` bytes consumed.
    pub fn encode_into(&self, src: &[u8], dst: &mut BytesMut, limit: usize) -> usize {
        let binary = self.flags.binary_mode;
        let mut consumed = 0;
        let mut written = 0;
        dst.reserve(src.len().min(limit));
        while consumed < src.len() {
            let byte = src[consumed];
            let needed = if byte == IAC || (byte == CR && !binary) { 2 } else { 1 };
            if limit - written < needed {
                break;
            }
            if byte == IAC {
                dst.put_u8(IAC);
                dst.put_u8(IAC);
                consumed += 1;
            } else if byte == CR && !binary {
                dst.put_u8(CR);
                if src.get(consumed + 1) == Some(&LF) {
                    dst.put_u8(LF);
                    consumed += 2;
                } else {
                    dst.put_u8(NUL);
                    consumed += 1;
                }
            } else {
                dst.put_u8(byte);
                consumed += 1;
            }
            written += needed;
        }
        consumed
    }

    fn push_data(&mut self, byte: u8, dst: &mut BytesMut) {
        if self.flags.binary_mode {
            self.flush_pending_cr(dst);
            dst.put_u8(byte);
            return;
        }
        if self.read_cr {
            match byte {
                LF => {
                    self.read_cr = false;
                    dst.put_u8(CR);
                    dst.put_u8(LF);
                }
                NUL => {
                    self.read_cr = false;
                    dst.put_u8(CR);
                }
                CR => {
                    // The second CR stays pending
                    dst.put_u8(CR);
                    dst.put_u8(NUL);
                }
                _ => {
                    self.read_cr = false;
                    dst.put_u8(CR);
                    dst.put_u8(byte);
                }
            }
        } else if byte == CR {
            self.read_cr = true;
        } else {
            dst.put_u8(byte);
        }
    }

    fn announce(&mut self, verb: Verb, option: TelnetOption) {
        if self.announced.record(verb, option) {
            self.send_verb(verb, option);
        } else {
            trace!("Suppressing repeated {} {}", verb, option);
        }
    }

    fn send_verb(&mut self, verb: Verb, option: TelnetOption) {
        debug!("Sending {} {}", verb, option);
        self.replies.put_u8(IAC);
        self.replies.put_u8(verb.to_u8());
        self.replies.put_u8(option.to_u8());
    }

    fn negotiate(&mut self, verb: Verb, option: TelnetOption) {
        debug!("Received {} {}", verb, option);
        let response = respond(self.role, option, verb);
        let mut activated = false;
        if let Some(enabled) = response.flag {
            let previous = self.flags.set(option, enabled);
            activated = enabled && !previous;
        }
        match response.reply {
            Some(reply) if response.refusal => {
                self.announced.record(reply, option);
                self.send_verb(reply, option);
            }
            Some(reply) => self.announce(reply, option),
            None => {}
        }
        if activated {
            match response.follow_up {
                FollowUp::None => {}
                FollowUp::SendWindowSize => {
                    let window = self.terminal.window;
                    debug!(cols = window.cols, rows = window.rows, "Sending NAWS");
                    subneg::naws(window, &mut self.replies);
                }
                FollowUp::RequestTerminalType => {
                    debug!("Requesting terminal type");
                    subneg::terminal_type_send(&mut self.replies);
                }
            }
        }
    }

    fn push_subneg(&mut self, byte: u8) {
        if self.subneg_buffer.len() >= consts::SUBNEG_LIMIT {
            if !self.subneg_overflow {
                warn!(
                    limit = consts::SUBNEG_LIMIT,
                    "Subnegotiation exceeds buffer, it will be dropped"
                );
            }
            self.subneg_overflow = true;
            return;
        }
        self.subneg_buffer.put_u8(byte);
    }

    fn finish_subneg(&mut self) {
        let buffer = self.subneg_buffer.split();
        if self.subneg_overflow {
            self.subneg_overflow = false;
            let option = buffer.first().copied().unwrap_or_default();
            warn!(
                "{}",
                TelnetError::subnegotiation(
                    option,
                    SubnegotiationErrorKind::Overflow {
                        limit: consts::SUBNEG_LIMIT
                    }
                )
            );
            return;
        }
        let Some((&option, data)) = buffer.split_first() else {
            warn!("Received empty subnegotiation");
            return;
        };
        if let Err(err) = self.handle_subneg(option, data) {
            warn!("{}", err);
        }
    }

    fn handle_subneg(&mut self, code: u8, data: &[u8]) -> TelnetResult<()> {
        match (self.role, code) {
            (NvtRole::Client, option::TTYPE) => {
                expect_send(code, data)?;
                debug!(terminal = %self.terminal.terminal_type, "Sending TTYPE IS");
                subneg::terminal_type_is(&self.terminal.terminal_type, &mut self.replies);
            }
            (NvtRole::Client, option::TSPEED) => {
                expect_send(code, data)?;
                debug!("Sending TSPEED IS");
                subneg::terminal_speed_is(&mut self.replies);
            }
            (NvtRole::Client, option::NEW_ENVIRON) => {
                expect_send(code, data)?;
                debug!("Sending NEW-ENVIRON IS");
                subneg::environment_is(&self.terminal, &mut self.replies);
            }
            (NvtRole::Server, option::TTYPE) => {
                let terminal_type = subneg::parse_terminal_type_is(data)?;
                debug!(terminal = %terminal_type, "Peer terminal type");
                self.peer_terminal_type = Some(terminal_type);
            }
            (NvtRole::Server, option::NAWS) => {
                let window = WindowSize::parse(data)?;
                debug!(cols = window.cols, rows = window.rows, "Peer window size");
                self.peer_window = Some(window);
            }
            _ => {
                debug!(
                    "Ignoring subnegotiation for {} ({} bytes)",
                    TelnetOption::from_u8(code),
                    data.len()
                );
            }
        }
        Ok(())
    }
}

impl Default for TelnetCodec {
    fn default() -> Self {
        TelnetCodec::client(TerminalInfo::default())
    }
}

fn expect_send(option: u8, data: &[u8]) -> TelnetResult<()> {
    match data.first() {
        Some(&subcmd::SEND) => Ok(()),
        Some(&other) => Err(TelnetError::subnegotiation(
            option,
            SubnegotiationErrorKind::UnknownCommand(other),
        )),
        None => Err(TelnetError::subnegotiation(
            option,
            SubnegotiationErrorKind::InsufficientData {
                required: 1,
                available: 0,
            },
        )),
    }
}

impl Decoder for TelnetCodec {
    type Item = BytesMut;
    type Error = TelnetError;

    /// Decode every buffered byte; yields `None` when they were all protocol bytes.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let raw = src.split();
        let mut payload = BytesMut::with_capacity(raw.len());
        self.decode_into(&raw, &mut payload);
        Ok(if payload.is_empty() { None } else { Some(payload) })
    }
}

impl Encoder<&[u8]> for TelnetCodec {
    type Error = TelnetError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode_into(item, dst, usize::MAX);
        Ok(())
    }
}

impl Encoder<TelnetCommand> for TelnetCodec {
    type Error = TelnetError;

    fn encode(&mut self, item: TelnetCommand, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_u8(IAC);
        dst.put_u8(item.to_u8());
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum DecoderState {
    NormalData,
    InterpretAsCommand,
    Negotiate(Verb),
    Subnegotiate,
    SubnegotiateIac,
}
