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

//! Telnet engine bound to a non-blocking transport

use crate::codec::{TelnetCodec, TelnetCommand};
use crate::options::NvtFlags;
use crate::subneg::WindowSize;
use bytes::{Buf, BytesMut};
use std::time::Duration;
use tracing::{debug, trace, warn};
use vtlink_transport::{
    DEFAULT_BUFFER_SIZE, EofPoll, Flushed, NegotiationState, RawInput, RawOutput, Transport,
    TransportError, TransportResult,
};

/// Default bound on the handshake busy-retry
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`TelnetCodec`] driving a [`Transport`] with POSIX `read()`/`write()` semantics.
///
/// - `read` returns payload, [`TransportError::WouldBlock`] when the raw bytes it consumed
///   were all protocol bytes (or nothing was available), and `Ok(0)` at end of stream after
///   a one-time close notice.
/// - `write` returns the number of caller bytes accepted. A hard error hit after some bytes
///   were accepted is held back and reported by the next call.
///
/// Option requests go out on the first `read` or `write`. Negotiation replies are written
/// with the bounded busy-retry so the handshake never stalls behind caller data.
#[derive(Debug)]
pub struct TelnetSession<T: Transport> {
    transport: T,
    codec: TelnetCodec,
    state: NegotiationState,
    input: RawInput,
    output: RawOutput,
    payload: BytesMut,
    deferred: Option<TransportError>,
    retry_timeout: Duration,
    control_bytes: u64,
}

impl<T: Transport> TelnetSession<T> {
    /// Bind `codec` to `transport` with default buffer sizes
    pub fn new(transport: T, codec: TelnetCodec) -> Self {
        TelnetSession {
            transport,
            codec,
            state: NegotiationState::Init,
            input: RawInput::new(DEFAULT_BUFFER_SIZE),
            output: RawOutput::new(DEFAULT_BUFFER_SIZE),
            payload: BytesMut::new(),
            deferred: None,
            retry_timeout: DEFAULT_RETRY_TIMEOUT,
            control_bytes: 0,
        }
    }

    /// Set the raw buffer capacity
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.input = RawInput::new(size);
        self.output = RawOutput::new(size);
        self
    }

    /// Set the bound on the handshake busy-retry
    #[must_use]
    pub fn with_retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout = timeout;
        self
    }

    /// Negotiation progress
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// The protocol engine
    pub fn codec(&self) -> &TelnetCodec {
        &self.codec
    }

    /// Current NVT flags
    pub fn flags(&self) -> &NvtFlags {
        self.codec.flags()
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

    /// Encoded bytes not yet accepted by the transport
    pub fn pending_output(&self) -> usize {
        self.output.len()
    }

    /// Raw bytes consumed by protocol framing so far
    pub fn control_bytes(&self) -> u64 {
        self.control_bytes
    }

    /// Put the initial option requests on the wire, once.
    pub fn start(&mut self) -> TransportResult<()> {
        if self.state.is_started() {
            return Ok(());
        }
        self.codec.start();
        self.state = NegotiationState::SentOptions;
        debug!(role = ?self.codec.role(), "Sending telnet options");
        self.send_replies()
    }

    /// Read decoded payload into `out`.
    pub fn read(&mut self, out: &mut [u8]) -> TransportResult<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        self.start()?;
        if !self.payload.is_empty() {
            return Ok(self.drain_payload(out));
        }
        match self.input.poll_eof() {
            EofPoll::Notice => return Ok(self.input.read_notice(out)),
            EofPoll::Closed => return Ok(0),
            EofPoll::Open => {}
        }

        self.input.fill(&mut self.transport, usize::MAX)?;
        let raw = self.input.take();
        let produced = self.codec.decode_into(&raw, &mut self.payload);
        if self.input.is_eof() {
            self.codec.flush_pending_cr(&mut self.payload);
        }
        self.control_bytes += raw.len().saturating_sub(produced) as u64;
        trace!(raw = raw.len(), payload = produced, "Telnet decode");

        if self.codec.has_replies() {
            if let Err(err) = self.send_replies() {
                if self.payload.is_empty() {
                    return Err(err);
                }
                warn!("Failed to send negotiation reply: {}", err);
            }
        }

        let count = self.drain_payload(out);
        if count == 0 {
            return Err(TransportError::WouldBlock);
        }
        Ok(count)
    }

    /// Encode and send caller bytes, returning how many were accepted.
    pub fn write(&mut self, data: &[u8]) -> TransportResult<usize> {
        if let Some(err) = self.deferred.take() {
            debug!("Reporting deferred write error");
            return Err(err);
        }
        if data.is_empty() {
            return Ok(0);
        }
        self.start()?;

        // Whatever is still owed from the last call goes first
        if self.output.flush(&mut self.transport)? == Flushed::Stalled {
            return Err(TransportError::WouldBlock);
        }

        let mut consumed = 0;
        while consumed < data.len() {
            let room = self.output.remaining_capacity();
            let accepted =
                self.codec
                    .encode_into(&data[consumed..], self.output.buffer_mut(), room);
            if accepted == 0 {
                break;
            }
            consumed += accepted;
            match self.output.flush(&mut self.transport) {
                Ok(Flushed::Complete) => {}
                Ok(Flushed::Stalled) => break,
                Err(err) => {
                    warn!(accepted = consumed, "Write failed, deferring error: {}", err);
                    self.deferred = Some(err);
                    break;
                }
            }
        }
        trace!(accepted = consumed, pending = self.output.len(), "Telnet write");
        Ok(consumed)
    }

    /// Push pending output without accepting new bytes
    pub fn flush(&mut self) -> TransportResult<Flushed> {
        self.output.flush(&mut self.transport)
    }

    /// Report a new window size (sent only once NAWS is agreed)
    pub fn resize(&mut self, window: WindowSize) -> TransportResult<()> {
        if self.codec.set_window_size(window) {
            self.send_replies()?;
        }
        Ok(())
    }

    /// Send `IAC <command>`
    pub fn send_command(&mut self, command: TelnetCommand) -> TransportResult<()> {
        self.codec.queue_command(command);
        self.send_replies()
    }

    fn send_replies(&mut self) -> TransportResult<()> {
        let replies = self.codec.take_replies();
        if replies.is_empty() {
            return Ok(());
        }
        self.output.extend_from_slice(&replies);
        self.output
            .flush_retry(&mut self.transport, self.retry_timeout)
            .map(|_| ())
    }

    fn drain_payload(&mut self, out: &mut [u8]) -> usize {
        let count = self.payload.len().min(out.len());
        out[..count].copy_from_slice(&self.payload[..count]);
        self.payload.advance(count);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subneg::TerminalInfo;
    use std::io;
    use vtlink_transport::{CONNECTION_CLOSED, ScriptedTransport, WriteStep};

    const CLIENT_OPTIONS: &[u8] =
        b"\xff\xfb\x00\xff\xfd\x00\xff\xfb\x03\xff\xfd\x03\xff\xfb\x1f\xff\xfb\x18\xff\xfb\x27";

    fn session() -> TelnetSession<ScriptedTransport> {
        TelnetSession::new(ScriptedTransport::new(), TelnetCodec::default())
    }

    fn binary_session() -> TelnetSession<ScriptedTransport> {
        let mut session = session();
        session
            .transport_mut()
            .push_read(b"\xff\xfd\x00\xff\xfb\x00");
        let mut out = [0u8; 16];
        assert!(session.read(&mut out).unwrap_err().is_would_block());
        assert!(session.flags().binary_mode);
        session.transport_mut().take_written();
        session
    }

    #[test]
    fn test_first_read_sends_options() {
        let mut session = session();
        let mut out = [0u8; 16];
        assert!(session.read(&mut out).unwrap_err().is_would_block());
        assert_eq!(session.state(), NegotiationState::SentOptions);
        assert_eq!(session.transport().written(), CLIENT_OPTIONS);

        // Only once
        let _ = session.read(&mut out);
        assert_eq!(session.transport().written(), CLIENT_OPTIONS);
    }

    #[test]
    fn test_control_only_read_is_would_block() {
        let mut session = session();
        session
            .transport_mut()
            .push_read(b"\xff\xfa\x18\x01\xff\xf0");
        let mut out = [0u8; 16];
        let err = session.read(&mut out).unwrap_err();
        assert!(err.is_would_block());
        assert!(!session.is_eof());
        assert_eq!(session.control_bytes(), 6);
    }

    #[test]
    fn test_payload_carries_over_small_buffers() {
        let mut session = session();
        session.transport_mut().push_read(b"abcdef");
        let mut out = [0u8; 4];
        assert_eq!(session.read(&mut out).unwrap(), 4);
        assert_eq!(&out, b"abcd");
        assert_eq!(session.read(&mut out).unwrap(), 2);
        assert_eq!(&out[..2], b"ef");
    }

    #[test]
    fn test_eof_notice_then_eof() {
        let mut session = session();
        session.transport_mut().push_read(b"bye").push_eof();
        let mut out = [0u8; 64];
        assert_eq!(session.read(&mut out).unwrap(), 3);
        assert!(session.read(&mut out).unwrap_err().is_would_block());
        let count = session.read(&mut out).unwrap();
        assert_eq!(&out[..count], CONNECTION_CLOSED);
        assert_eq!(session.read(&mut out).unwrap(), 0);
        assert_eq!(session.read(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_pending_cr_flushed_at_eof() {
        let mut session = session();
        session.transport_mut().push_read(b"a\r");
        let mut out = [0u8; 64];
        assert_eq!(session.read(&mut out).unwrap(), 1);
        session.transport_mut().push_eof();
        assert_eq!(session.read(&mut out).unwrap(), 1);
        assert_eq!(out[0], b'\r');
    }

    #[test]
    fn test_negotiation_reply_is_written() {
        let mut session = session();
        session.transport_mut().push_read(b"\xff\xfd\x05hi");
        let mut out = [0u8; 16];
        assert_eq!(session.read(&mut out).unwrap(), 2);
        assert!(session.transport().written().ends_with(b"\xff\xfc\x05"));
    }

    #[test]
    fn test_write_escapes_and_counts_input_bytes() {
        let mut session = binary_session();
        assert_eq!(session.write(b"a\xffb").unwrap(), 3);
        assert_eq!(session.transport().written(), b"a\xff\xffb");
    }

    #[test]
    fn test_write_ascii_cr() {
        let mut session = session();
        let _ = session.read(&mut [0u8; 1]);
        session.transport_mut().take_written();
        assert_eq!(session.write(b"ls\r").unwrap(), 3);
        assert_eq!(session.transport().written(), b"ls\r\0");
    }

    #[test]
    fn test_tiny_buffers_still_move_data() {
        let mut session = session().with_buffer_size(1);
        session.transport_mut().push_read(b"hello");
        let mut received = Vec::new();
        let mut out = [0u8; 8];
        while received.len() < 5 {
            let count = session.read(&mut out).unwrap();
            received.extend_from_slice(&out[..count]);
        }
        assert_eq!(received, b"hello");

        session.transport_mut().take_written();
        assert_eq!(session.write(b"\r").unwrap(), 1);
        assert_eq!(session.write(b"\xff").unwrap(), 1);
        assert_eq!(session.transport().written(), b"\r\0\xff\xff");
    }

    #[test]
    fn test_write_backpressure_returns_partial_count() {
        let mut session = binary_session().with_buffer_size(4);
        session.transport_mut().push_write(WriteStep::WouldBlock);
        // Four bytes fit the pending buffer, nothing reaches the socket
        assert_eq!(session.write(b"abcdefgh").unwrap(), 4);
        assert_eq!(session.pending_output(), 4);
        // The pending bytes go first on the next call
        assert_eq!(session.write(b"efgh").unwrap(), 4);
        assert_eq!(session.transport().written(), b"abcdefgh");
    }

    #[test]
    fn test_write_stalled_with_full_buffer_would_block() {
        let mut session = binary_session().with_buffer_size(2);
        session
            .transport_mut()
            .push_write(WriteStep::WouldBlock)
            .push_write(WriteStep::WouldBlock);
        assert_eq!(session.write(b"ab").unwrap(), 2);
        assert!(session.write(b"cd").unwrap_err().is_would_block());
    }

    #[test]
    fn test_write_error_is_deferred() {
        let mut session = binary_session().with_buffer_size(2);
        session
            .transport_mut()
            .push_write(WriteStep::Accept(2))
            .push_write(WriteStep::Fail(io::ErrorKind::BrokenPipe));
        assert_eq!(session.write(b"abcd").unwrap(), 4);
        assert_eq!(session.transport().written(), b"ab");
        let err = session.write(b"more").unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[test]
    fn test_write_error_after_encoding_is_deferred() {
        let mut session = binary_session();
        session
            .transport_mut()
            .push_write(WriteStep::Fail(io::ErrorKind::ConnectionReset));
        // The byte was encoded before the failure, so its count is reported first
        assert_eq!(session.write(b"x").unwrap(), 1);
        assert!(session.write(b"y").is_err());
    }

    #[test]
    fn test_write_error_on_pending_bytes_is_immediate() {
        let mut session = binary_session().with_buffer_size(2);
        session
            .transport_mut()
            .push_write(WriteStep::WouldBlock)
            .push_write(WriteStep::Fail(io::ErrorKind::ConnectionReset));
        assert_eq!(session.write(b"ab").unwrap(), 2);
        let err = session.write(b"cd").unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[test]
    fn test_resize_after_naws_agreed() {
        let mut session = session();
        session.transport_mut().push_read(b"\xff\xfd\x1f");
        let _ = session.read(&mut [0u8; 8]);
        session.transport_mut().take_written();
        session.resize(WindowSize::new(100, 40)).unwrap();
        assert_eq!(
            session.transport().written(),
            b"\xff\xfa\x1f\x00\x64\x00\x28\xff\xf0"
        );
    }

    #[test]
    fn test_send_command() {
        let mut session = session();
        session.start().unwrap();
        session.transport_mut().take_written();
        session.send_command(TelnetCommand::Break).unwrap();
        assert_eq!(session.transport().written(), b"\xff\xf3");
    }

    #[test]
    fn test_server_session_sends_echo() {
        let codec = TelnetCodec::server(TerminalInfo::default());
        let mut session = TelnetSession::new(ScriptedTransport::new(), codec);
        session.start().unwrap();
        assert!(session.transport().written().windows(3).any(|w| w == b"\xff\xfb\x01"));
    }
}
