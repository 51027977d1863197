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

//! Raw byte buffers shared by every protocol engine
//!
//! [`RawInput`] decouples "bytes available from the kernel" from "bytes consumed by a
//! decoder"; [`RawOutput`] decouples "bytes produced by an encoder" from "bytes the kernel
//! accepted". Both are fixed-capacity.

use crate::result::{TransportError, TransportResult, is_would_block};
use crate::Transport;
use bytes::{Buf, BytesMut};
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Default capacity of the raw input and output buffers
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Smallest buffer capacity; the widest single encoded unit (`IAC IAC`, `CR NUL`) is two bytes
pub const MIN_BUFFER_SIZE: usize = 2;

fn checked_capacity(capacity: usize) -> usize {
    if capacity < MIN_BUFFER_SIZE {
        warn!(
            requested = capacity,
            minimum = MIN_BUFFER_SIZE,
            "Buffer capacity raised to the minimum"
        );
    }
    capacity.max(MIN_BUFFER_SIZE)
}

/// Payload handed to the caller once after the remote side closes the stream
pub const CONNECTION_CLOSED: &[u8] = b"Connection closed.";

/// Sleep between retries when a handshake write would block
const WRITE_RETRY_SLEEP: Duration = Duration::from_micros(100);

/// Where the input side stands with respect to remote end-of-file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EofState {
    /// Stream is open
    Open,
    /// A zero-byte read was observed, the notice has not been handed out yet
    Seen,
    /// The notice is being handed out; holds how much of it was already delivered
    Notice(usize),
    /// Notice delivered, every further read reports EOF
    Closed,
}

/// What the caller should do before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EofPoll {
    /// Stream is open (or buffered bytes remain); read and decode normally
    Open,
    /// Hand out [`CONNECTION_CLOSED`] via [`RawInput::read_notice`]
    Notice,
    /// Report EOF (`Ok(0)`)
    Closed,
}

/// Fixed-capacity queue of bytes read from the socket but not yet decoded.
///
/// The buffer is either empty or holds exactly the unconsumed tail of the last socket read;
/// engines drain it completely on every call.
#[derive(Debug)]
pub struct RawInput {
    buffer: BytesMut,
    capacity: usize,
    eof: EofState,
}

impl RawInput {
    /// Create an empty input buffer with the given capacity (at least [`MIN_BUFFER_SIZE`])
    pub fn new(capacity: usize) -> Self {
        let capacity = checked_capacity(capacity);
        Self {
            buffer: BytesMut::with_capacity(capacity),
            capacity,
            eof: EofState::Open,
        }
    }

    /// Number of bytes waiting to be decoded
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if no bytes are waiting
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if the remote side has closed the stream
    pub fn is_eof(&self) -> bool {
        !matches!(self.eof, EofState::Open)
    }

    /// Check if EOF has been fully reported to the caller
    pub fn is_closed(&self) -> bool {
        matches!(self.eof, EofState::Closed)
    }

    /// Advance the EOF bookkeeping.
    ///
    /// Buffered bytes always win over the notice. The first poll after EOF with an empty
    /// buffer switches to [`EofPoll::Notice`]; once the notice is out every poll returns
    /// [`EofPoll::Closed`].
    pub fn poll_eof(&mut self) -> EofPoll {
        if !self.buffer.is_empty() {
            return EofPoll::Open;
        }
        match self.eof {
            EofState::Open => EofPoll::Open,
            EofState::Seen => {
                self.eof = EofState::Notice(0);
                EofPoll::Notice
            }
            EofState::Notice(_) => EofPoll::Notice,
            EofState::Closed => EofPoll::Closed,
        }
    }

    /// Copy the pending part of the close notice into `out`.
    pub fn read_notice(&mut self, out: &mut [u8]) -> usize {
        let EofState::Notice(offset) = self.eof else {
            return 0;
        };
        let remaining = &CONNECTION_CLOSED[offset..];
        let count = remaining.len().min(out.len());
        out[..count].copy_from_slice(&remaining[..count]);
        self.eof = if offset + count >= CONNECTION_CLOSED.len() {
            debug!("Close notice delivered");
            EofState::Closed
        } else {
            EofState::Notice(offset + count)
        };
        count
    }

    /// Fill the buffer from the transport, reading at most `limit` bytes.
    ///
    /// Returns [`TransportError::WouldBlock`] only when the kernel had nothing and the buffer
    /// is still empty. A zero-byte read marks the stream as EOF and is not an error. A hard
    /// error with bytes already buffered is logged and the bytes are kept; the error recurs
    /// on the next call.
    pub fn fill<T: Transport>(&mut self, transport: &mut T, limit: usize) -> TransportResult<()> {
        if self.is_eof() {
            return Ok(());
        }
        let start = self.buffer.len();
        let room = self.capacity.saturating_sub(start).min(limit);
        if room == 0 {
            return Ok(());
        }
        self.buffer.resize(start + room, 0);
        let result = transport.raw_read(&mut self.buffer[start..]);
        match result {
            Ok(0) => {
                self.buffer.truncate(start);
                debug!("Remote side closed the connection");
                self.eof = EofState::Seen;
                Ok(())
            }
            Ok(count) => {
                self.buffer.truncate(start + count);
                trace!(bytes = count, "Raw read");
                Ok(())
            }
            Err(err) => {
                self.buffer.truncate(start);
                if is_would_block(&err) || err.kind() == io::ErrorKind::Interrupted {
                    if self.buffer.is_empty() {
                        Err(TransportError::WouldBlock)
                    } else {
                        Ok(())
                    }
                } else if self.buffer.is_empty() {
                    Err(TransportError::Io(err))
                } else {
                    warn!("Read error with {} bytes buffered: {}", self.buffer.len(), err);
                    Ok(())
                }
            }
        }
    }

    /// Remove and return every buffered byte
    pub fn take(&mut self) -> BytesMut {
        self.buffer.split()
    }

    /// Drain buffered bytes into `out`, returning how many were copied
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let count = self.buffer.len().min(out.len());
        out[..count].copy_from_slice(&self.buffer[..count]);
        self.buffer.advance(count);
        count
    }

    /// Pass-through read: the raw read discipline without any decoding.
    ///
    /// `Ok(n > 0)` is payload, `Ok(0)` is EOF, [`TransportError::WouldBlock`] means try again.
    pub fn read<T: Transport>(&mut self, transport: &mut T, out: &mut [u8]) -> TransportResult<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        match self.poll_eof() {
            EofPoll::Notice => return Ok(self.read_notice(out)),
            EofPoll::Closed => return Ok(0),
            EofPoll::Open => {}
        }
        self.fill(transport, out.len())?;
        let count = self.drain_into(out);
        if count == 0 {
            // EOF observed on this call; the notice follows on the next one
            return Err(TransportError::WouldBlock);
        }
        Ok(count)
    }
}

impl Default for RawInput {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

/// Outcome of a non-blocking flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flushed {
    /// Every pending byte reached the kernel
    Complete,
    /// The kernel stopped accepting bytes; some remain pending
    Stalled,
}

/// Fixed-capacity queue of encoded bytes still owed to the remote side.
#[derive(Debug)]
pub struct RawOutput {
    buffer: BytesMut,
    capacity: usize,
}

impl RawOutput {
    /// Create an empty output buffer with the given capacity (at least [`MIN_BUFFER_SIZE`])
    pub fn new(capacity: usize) -> Self {
        let capacity = checked_capacity(capacity);
        Self {
            buffer: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of pending bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Free space left before the buffer is full
    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.buffer.len())
    }

    /// Pending bytes, oldest first
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Mutable access for encoders appending framed output
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Append bytes to the pending queue
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Drop every pending byte
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Push pending bytes to the transport without blocking.
    pub fn flush<T: Transport>(&mut self, transport: &mut T) -> TransportResult<Flushed> {
        while !self.buffer.is_empty() {
            match transport.raw_write(&self.buffer) {
                Ok(0) => {
                    return Err(TransportError::Io(io::ErrorKind::WriteZero.into()));
                }
                Ok(count) => {
                    trace!(bytes = count, "Raw write");
                    self.buffer.advance(count);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) if is_would_block(&err) => return Ok(Flushed::Stalled),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(Flushed::Complete)
    }

    /// Pass-through write: queue caller bytes unchanged and push them out without blocking.
    ///
    /// Bytes still pending from an earlier call go first; if they cannot all be sent the call
    /// would block. Returns how many caller bytes were accepted. A hard error after bytes were
    /// accepted is logged; it recurs on the next flush.
    pub fn write_passthrough<T: Transport>(
        &mut self,
        transport: &mut T,
        data: &[u8],
    ) -> TransportResult<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        if self.flush(transport)? == Flushed::Stalled {
            return Err(TransportError::WouldBlock);
        }
        let mut accepted = 0;
        while accepted < data.len() {
            let count = self.remaining_capacity().min(data.len() - accepted);
            if count == 0 {
                break;
            }
            self.buffer.extend_from_slice(&data[accepted..accepted + count]);
            accepted += count;
            match self.flush(transport) {
                Ok(Flushed::Complete) => {}
                Ok(Flushed::Stalled) => break,
                Err(err) => {
                    warn!(accepted, "Write failed with bytes pending: {}", err);
                    break;
                }
            }
        }
        Ok(accepted)
    }

    /// Push every pending byte out, busy-retrying while the kernel would block.
    ///
    /// Only for short handshake payloads. Bounded by `timeout`; bytes still pending after
    /// the timeout stay queued for the next flush.
    pub fn flush_retry<T: Transport>(
        &mut self,
        transport: &mut T,
        timeout: Duration,
    ) -> TransportResult<usize> {
        let written = write_all_retry(transport, &self.buffer, timeout)?;
        self.buffer.advance(written);
        Ok(written)
    }
}

impl Default for RawOutput {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

/// Write all bytes, retrying with brief sleeps while the transport would block.
///
/// Stops on the first hard error or once `timeout` has elapsed and returns the count actually
/// written. A hard error before any byte went out is returned as an error.
pub fn write_all_retry<T: Transport>(
    transport: &mut T,
    data: &[u8],
    timeout: Duration,
) -> TransportResult<usize> {
    let start = Instant::now();
    let mut written = 0;

    while written < data.len() {
        match transport.raw_write(&data[written..]) {
            Ok(0) => {
                if written == 0 {
                    return Err(TransportError::Io(io::ErrorKind::WriteZero.into()));
                }
                break;
            }
            Ok(count) => {
                written += count;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) if is_would_block(&err) => {
                if start.elapsed() > timeout {
                    warn!(
                        written,
                        total = data.len(),
                        "Write retry timed out"
                    );
                    break;
                }
                std::thread::sleep(WRITE_RETRY_SLEEP);
            }
            Err(err) => {
                if written == 0 {
                    return Err(TransportError::Io(err));
                }
                warn!("Write failed after {} bytes: {}", written, err);
                break;
            }
        }
    }
    trace!(bytes = written, "Raw write (retrying)");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ScriptedTransport, WriteStep};
    use tracing_test::traced_test;

    #[test]
    fn test_read_passes_bytes_through() {
        let mut transport = ScriptedTransport::new();
        transport.push_read(b"hello");
        let mut input = RawInput::default();
        let mut out = [0u8; 64];
        let count = input.read(&mut transport, &mut out).unwrap();
        assert_eq!(&out[..count], b"hello");
        assert!(input.is_empty());
    }

    #[test]
    fn test_read_would_block_when_nothing_available() {
        let mut transport = ScriptedTransport::new();
        let mut input = RawInput::default();
        let mut out = [0u8; 64];
        let err = input.read(&mut transport, &mut out).unwrap_err();
        assert!(err.is_would_block());
    }

    #[test]
    fn test_eof_notice_then_eof_forever() {
        let mut transport = ScriptedTransport::new();
        transport.push_eof();
        let mut input = RawInput::default();
        let mut out = [0u8; 64];

        // Observing call: nothing buffered yet
        assert!(input.read(&mut transport, &mut out).unwrap_err().is_would_block());
        assert!(input.is_eof());

        let count = input.read(&mut transport, &mut out).unwrap();
        assert_eq!(&out[..count], CONNECTION_CLOSED);

        assert_eq!(input.read(&mut transport, &mut out).unwrap(), 0);
        transport.push_read(b"late data");
        assert_eq!(input.read(&mut transport, &mut out).unwrap(), 0);
        assert!(input.is_closed());
    }

    #[test]
    fn test_eof_notice_survives_small_buffers() {
        let mut transport = ScriptedTransport::new();
        transport.push_eof();
        let mut input = RawInput::default();
        let mut out = [0u8; 64];
        let _ = input.read(&mut transport, &mut out);

        let mut notice = Vec::new();
        let mut small = [0u8; 5];
        loop {
            let count = input.read(&mut transport, &mut small).unwrap();
            if count == 0 {
                break;
            }
            notice.extend_from_slice(&small[..count]);
        }
        assert_eq!(notice, CONNECTION_CLOSED);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_minimum() {
        let mut transport = ScriptedTransport::new();
        transport.push_read(b"hello");
        let mut input = RawInput::new(0);
        let mut out = [0u8; 8];
        assert_eq!(input.read(&mut transport, &mut out).unwrap(), MIN_BUFFER_SIZE);
        assert_eq!(&out[..2], b"he");

        let mut output = RawOutput::new(0);
        assert_eq!(output.remaining_capacity(), MIN_BUFFER_SIZE);
        assert_eq!(output.write_passthrough(&mut transport, b"abc").unwrap(), 3);
        assert_eq!(transport.written(), b"abc");
    }

    #[test]
    fn test_fill_respects_limit() {
        let mut transport = ScriptedTransport::new();
        transport.push_read(b"0123456789");
        let mut input = RawInput::default();
        let mut out = [0u8; 4];
        let count = input.read(&mut transport, &mut out).unwrap();
        assert_eq!(&out[..count], b"0123");
        let count = input.read(&mut transport, &mut out).unwrap();
        assert_eq!(&out[..count], b"4567");
    }

    #[test]
    fn test_hard_read_error_is_reported() {
        let mut transport = ScriptedTransport::new();
        transport.push_read_error(io::ErrorKind::ConnectionReset);
        let mut input = RawInput::default();
        let mut out = [0u8; 16];
        let err = input.read(&mut transport, &mut out).unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[test]
    #[traced_test]
    fn test_hard_error_with_buffered_bytes_keeps_bytes() {
        let mut transport = ScriptedTransport::new();
        transport
            .push_read(b"abc")
            .push_read_error(io::ErrorKind::ConnectionReset);
        let mut input = RawInput::default();
        input.fill(&mut transport, 64).unwrap();
        input.fill(&mut transport, 64).unwrap();
        assert_eq!(input.len(), 3);
        assert!(logs_contain("Read error with 3 bytes buffered"));
    }

    #[test]
    fn test_flush_stalls_on_backpressure() {
        let mut transport = ScriptedTransport::new();
        transport.push_write(WriteStep::Accept(3));
        transport.push_write(WriteStep::WouldBlock);
        let mut output = RawOutput::default();
        output.extend_from_slice(b"abcdef");
        assert_eq!(output.flush(&mut transport).unwrap(), Flushed::Stalled);
        assert_eq!(output.as_bytes(), b"def");
        assert_eq!(transport.written(), b"abc");
        assert_eq!(output.flush(&mut transport).unwrap(), Flushed::Complete);
        assert_eq!(transport.written(), b"abcdef");
    }

    #[test]
    fn test_write_passthrough_partial_acceptance() {
        let mut transport = ScriptedTransport::new();
        transport.push_write(WriteStep::Accept(2));
        transport.push_write(WriteStep::WouldBlock);
        let mut output = RawOutput::new(4);
        assert_eq!(output.write_passthrough(&mut transport, b"abcdef").unwrap(), 4);
        assert_eq!(transport.written(), b"ab");
        assert_eq!(output.as_bytes(), b"cd");
        // Pending bytes leave first, then the new ones
        assert_eq!(output.write_passthrough(&mut transport, b"ef").unwrap(), 2);
        assert_eq!(transport.written(), b"abcdef");
    }

    #[test]
    fn test_write_passthrough_would_block_when_pending_stalls() {
        let mut transport = ScriptedTransport::new();
        transport.push_write(WriteStep::WouldBlock);
        let mut output = RawOutput::new(4);
        output.extend_from_slice(b"old");
        let err = output.write_passthrough(&mut transport, b"new").unwrap_err();
        assert!(err.is_would_block());
        assert_eq!(output.as_bytes(), b"old");
    }

    #[test]
    fn test_write_all_retry_rides_out_would_block() {
        let mut transport = ScriptedTransport::new();
        transport.push_write(WriteStep::WouldBlock);
        transport.push_write(WriteStep::Accept(2));
        transport.push_write(WriteStep::WouldBlock);
        let written = write_all_retry(&mut transport, b"login", Duration::from_secs(1)).unwrap();
        assert_eq!(written, 5);
        assert_eq!(transport.written(), b"login");
    }

    #[test]
    fn test_write_all_retry_stops_on_hard_error() {
        let mut transport = ScriptedTransport::new();
        transport.push_write(WriteStep::Accept(2));
        transport.push_write(WriteStep::Fail(io::ErrorKind::BrokenPipe));
        let written = write_all_retry(&mut transport, b"login", Duration::from_secs(1)).unwrap();
        assert_eq!(written, 2);

        let mut transport = ScriptedTransport::new();
        transport.push_write(WriteStep::Fail(io::ErrorKind::BrokenPipe));
        assert!(write_all_retry(&mut transport, b"login", Duration::from_secs(1)).is_err());
    }
}
