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

//! Rlogin engine bound to a non-blocking transport

use crate::frame::{LoginInfo, control, window_message};
use std::time::Duration;
use tracing::{debug, trace, warn};
use vtlink_transport::{
    DEFAULT_BUFFER_SIZE, Flushed, NegotiationState, RawInput, RawOutput, Transport,
    TransportError, TransportResult, is_would_block,
};

/// Default bound on the login busy-retry
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(5);

/// Flow-control mode last signalled by the server
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FlowControl {
    /// Flow-control characters are interpreted locally
    #[default]
    Cooked,
    /// Flow-control characters are passed through
    Raw,
}

/// Rlogin client session.
///
/// The data stream is raw bytes in both directions. Control signals from the server arrive as
/// urgent data and are handled by [`RloginSession::read_oob`], which never yields payload.
#[derive(Debug)]
pub struct RloginSession<T: Transport> {
    transport: T,
    login: LoginInfo,
    state: NegotiationState,
    input: RawInput,
    output: RawOutput,
    flow: FlowControl,
    discards: u64,
    retry_timeout: Duration,
}

impl<T: Transport> RloginSession<T> {
    /// Bind `login` to `transport` with default buffer sizes
    pub fn new(transport: T, login: LoginInfo) -> Self {
        RloginSession {
            transport,
            login,
            state: NegotiationState::Init,
            input: RawInput::new(DEFAULT_BUFFER_SIZE),
            output: RawOutput::new(DEFAULT_BUFFER_SIZE),
            flow: FlowControl::default(),
            discards: 0,
            retry_timeout: DEFAULT_RETRY_TIMEOUT,
        }
    }

    /// Set the raw buffer capacity
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.input = RawInput::new(size);
        self.output = RawOutput::new(size);
        self
    }

    /// Set the bound on the login busy-retry
    #[must_use]
    pub fn with_retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout = timeout;
        self
    }

    /// Handshake progress
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Login details, including the current window size
    pub fn login(&self) -> &LoginInfo {
        &self.login
    }

    /// Flow-control mode last signalled by the server
    pub fn flow_control(&self) -> FlowControl {
        self.flow
    }

    /// Number of discard signals received
    pub fn discard_requests(&self) -> u64 {
        self.discards
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the session, returning the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Check if the remote side closed the stream
    pub fn is_eof(&self) -> bool {
        self.input.is_eof()
    }

    /// Bytes not yet accepted by the transport
    pub fn pending_output(&self) -> usize {
        self.output.len()
    }

    /// Send the login frame, once.
    pub fn start(&mut self) -> TransportResult<()> {
        if self.state.is_started() {
            return Ok(());
        }
        self.login.encode(self.output.buffer_mut());
        self.state = NegotiationState::SentLogin;
        debug!(
            local = %self.login.local_user,
            remote = %self.login.effective_remote_user(),
            terminal = %self.login.terminal_type,
            "Sending rlogin login"
        );
        self.output
            .flush_retry(&mut self.transport, self.retry_timeout)
            .map(|_| ())
    }

    /// Read raw payload into `out`.
    pub fn read(&mut self, out: &mut [u8]) -> TransportResult<usize> {
        self.start()?;
        self.input.read(&mut self.transport, out)
    }

    /// Handle one urgent control byte.
    ///
    /// Never returns payload: the result is [`TransportError::WouldBlock`] once the byte (if
    /// any) has been acted on, or a hard error from the transport.
    pub fn read_oob(&mut self) -> TransportResult<usize> {
        let mut byte = [0u8; 1];
        match self.transport.raw_read_oob(&mut byte) {
            Ok(1) => self.handle_control(byte[0])?,
            Ok(_) => {}
            Err(err) if is_would_block(&err) => {}
            Err(err) => return Err(TransportError::Io(err)),
        }
        Err(TransportError::WouldBlock)
    }

    /// Send caller bytes unchanged, returning how many were accepted.
    pub fn write(&mut self, data: &[u8]) -> TransportResult<usize> {
        self.start()?;
        let accepted = self.output.write_passthrough(&mut self.transport, data)?;
        trace!(accepted, pending = self.output.len(), "Rlogin write");
        Ok(accepted)
    }

    /// Push pending output without accepting new bytes
    pub fn flush(&mut self) -> TransportResult<Flushed> {
        self.output.flush(&mut self.transport)
    }

    /// Record a new window size, sending it if the server has asked for window updates.
    pub fn resize(&mut self, lines: u16, columns: u16) -> TransportResult<()> {
        self.login.lines = lines;
        self.login.columns = columns;
        if self.state == NegotiationState::Established {
            self.send_window()?;
        }
        Ok(())
    }

    fn handle_control(&mut self, byte: u8) -> TransportResult<()> {
        trace!(control = byte, "Rlogin urgent byte");
        if byte & control::WINDOW != 0 {
            debug!("Server requested window size");
            self.state = NegotiationState::Established;
            self.send_window()?;
        }
        if byte & control::FLUSH != 0 {
            debug!("Server requested discard of pending output");
            self.discards += 1;
        }
        if byte & control::RAW != 0 {
            debug!("Server switched to raw flow control");
            self.flow = FlowControl::Raw;
        }
        if byte & control::COOKED != 0 {
            debug!("Server switched to cooked flow control");
            self.flow = FlowControl::Cooked;
        }
        let unknown = byte & !(control::WINDOW | control::FLUSH | control::RAW | control::COOKED);
        if unknown != 0 {
            warn!("Ignoring unknown rlogin control bits {:#04x}", unknown);
        }
        Ok(())
    }

    fn send_window(&mut self) -> TransportResult<()> {
        let message = window_message(self.login.lines, self.login.columns);
        debug!(lines = self.login.lines, columns = self.login.columns, "Sending window size");
        self.output.extend_from_slice(&message);
        self.output
            .flush_retry(&mut self.transport, self.retry_timeout)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::WINDOW_MESSAGE_LEN;
    use std::io;
    use tracing_test::traced_test;
    use vtlink_transport::{CONNECTION_CLOSED, ScriptedTransport, WriteStep};

    const LOGIN: &[u8] = b"\0alice\0alice\0vt100/38400\0";

    fn session() -> RloginSession<ScriptedTransport> {
        RloginSession::new(ScriptedTransport::new(), LoginInfo::new("alice", "vt100"))
    }

    fn established() -> RloginSession<ScriptedTransport> {
        let mut session = session();
        session.start().unwrap();
        session.transport_mut().push_oob(control::WINDOW);
        assert!(session.read_oob().unwrap_err().is_would_block());
        session.transport_mut().take_written();
        session
    }

    #[test]
    fn test_zero_buffer_size_still_reads_and_writes() {
        let mut session = session().with_buffer_size(0);
        session.transport_mut().push_read(b"ok");
        let mut out = [0u8; 8];
        assert_eq!(session.read(&mut out).unwrap(), 2);
        assert_eq!(&out[..2], b"ok");
        assert_eq!(session.transport().written(), LOGIN);
        session.transport_mut().take_written();
        assert_eq!(session.write(b"ls\r").unwrap(), 3);
        assert_eq!(session.transport().written(), b"ls\r");
    }

    #[test]
    fn test_start_sends_login_once() {
        let mut session = session();
        session.start().unwrap();
        session.start().unwrap();
        assert_eq!(session.state(), NegotiationState::SentLogin);
        assert_eq!(session.transport().written(), LOGIN);
    }

    #[test]
    fn test_read_passes_bytes_through() {
        let mut session = session();
        session.transport_mut().push_read(b"\xff\xff\0login: ");
        let mut out = [0u8; 32];
        let count = session.read(&mut out).unwrap();
        assert_eq!(&out[..count], b"\xff\xff\0login: ");
        assert_eq!(session.transport().written(), LOGIN);
    }

    #[test]
    fn test_read_eof_notice_then_eof() {
        let mut session = session();
        session.transport_mut().push_eof();
        let mut out = [0u8; 32];
        assert!(session.read(&mut out).unwrap_err().is_would_block());
        let count = session.read(&mut out).unwrap();
        assert_eq!(&out[..count], CONNECTION_CLOSED);
        assert_eq!(session.read(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_window_request_sends_size_and_establishes() {
        let mut session = session();
        session.start().unwrap();
        session.transport_mut().take_written();
        session.transport_mut().push_oob(control::WINDOW);
        assert!(session.read_oob().unwrap_err().is_would_block());
        assert_eq!(session.state(), NegotiationState::Established);
        assert_eq!(
            session.transport().written(),
            &[0xFF, 0xFF, b's', b's', 0, 24, 0, 80, 0x02, 0xD0, 0x01, 0x80]
        );
    }

    #[test]
    fn test_read_oob_without_urgent_data() {
        let mut session = session();
        assert!(session.read_oob().unwrap_err().is_would_block());
        assert_eq!(session.state(), NegotiationState::Init);
    }

    #[test]
    fn test_advisory_controls() {
        let mut session = established();
        session.transport_mut().push_oob(control::FLUSH | control::RAW);
        assert!(session.read_oob().unwrap_err().is_would_block());
        assert_eq!(session.discard_requests(), 1);
        assert_eq!(session.flow_control(), FlowControl::Raw);

        session.transport_mut().push_oob(control::COOKED);
        assert!(session.read_oob().unwrap_err().is_would_block());
        assert_eq!(session.flow_control(), FlowControl::Cooked);
        assert!(session.transport().written().is_empty());
    }

    #[test]
    #[traced_test]
    fn test_unknown_control_bits_are_logged() {
        let mut session = established();
        session.transport_mut().push_oob(0x01);
        assert!(session.read_oob().unwrap_err().is_would_block());
        assert!(logs_contain("Ignoring unknown rlogin control bits"));
    }

    #[test]
    fn test_resize_before_established_is_recorded() {
        let mut session = session();
        session.start().unwrap();
        session.transport_mut().take_written();
        session.resize(50, 132).unwrap();
        assert!(session.transport().written().is_empty());

        session.transport_mut().push_oob(control::WINDOW);
        let _ = session.read_oob();
        assert_eq!(&session.transport().written()[4..8], &[0, 50, 0, 132]);
    }

    #[test]
    fn test_resize_when_established_sends_message() {
        let mut session = established();
        session.resize(40, 100).unwrap();
        let written = session.transport().written();
        assert_eq!(written.len(), WINDOW_MESSAGE_LEN);
        assert_eq!(&written[4..8], &[0, 40, 0, 100]);
    }

    #[test]
    fn test_write_is_raw() {
        let mut session = established();
        assert_eq!(session.write(b"ls\r\xff").unwrap(), 4);
        assert_eq!(session.transport().written(), b"ls\r\xff");
    }

    #[test]
    fn test_write_backpressure() {
        let mut session = established().with_buffer_size(4);
        session.transport_mut().push_write(WriteStep::WouldBlock);
        assert_eq!(session.write(b"abcdef").unwrap(), 4);
        assert_eq!(session.pending_output(), 4);
        assert_eq!(session.flush().unwrap(), Flushed::Complete);
        assert_eq!(session.transport().written(), b"abcd");
    }

    #[test]
    fn test_oob_hard_error() {
        #[derive(Debug, Default)]
        struct Broken;
        impl Transport for Broken {
            fn raw_read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Ok(0)
            }
            fn raw_write(&mut self, buf: &[u8]) -> io::Result<usize> {
                Ok(buf.len())
            }
            fn raw_read_oob(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::ErrorKind::ConnectionReset.into())
            }
        }
        let mut session = RloginSession::new(Broken, LoginInfo::new("a", "b"));
        assert!(matches!(session.read_oob(), Err(TransportError::Io(_))));
    }
}
