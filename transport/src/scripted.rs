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

//! In-memory transport that replays a script, for engine tests

use crate::Transport;
use std::collections::VecDeque;
use std::io;

/// How the scripted transport answers the next write call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    /// Accept at most this many bytes
    Accept(usize),
    /// Report would-block
    WouldBlock,
    /// Fail with a hard error of this kind
    Fail(io::ErrorKind),
}

/// Transport replaying scripted reads and recording every written byte.
///
/// Reads pop the next scripted chunk (an empty chunk is EOF); with nothing scripted a read
/// would block. Writes follow the scripted [`WriteStep`]s and accept everything once the
/// script runs out.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    reads: VecDeque<io::Result<Vec<u8>>>,
    oob: VecDeque<u8>,
    writes: VecDeque<WriteStep>,
    written: Vec<u8>,
}

impl ScriptedTransport {
    /// Create a transport with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a chunk of incoming bytes
    pub fn push_read(&mut self, bytes: &[u8]) -> &mut Self {
        self.reads.push_back(Ok(bytes.to_vec()));
        self
    }

    /// Script a zero-byte read (remote EOF)
    pub fn push_eof(&mut self) -> &mut Self {
        self.reads.push_back(Ok(Vec::new()));
        self
    }

    /// Script a read failure
    pub fn push_read_error(&mut self, kind: io::ErrorKind) -> &mut Self {
        self.reads.push_back(Err(kind.into()));
        self
    }

    /// Script an urgent byte
    pub fn push_oob(&mut self, byte: u8) -> &mut Self {
        self.oob.push_back(byte);
        self
    }

    /// Script the answer to a write call
    pub fn push_write(&mut self, step: WriteStep) -> &mut Self {
        self.writes.push_back(step);
        self
    }

    /// Every byte written so far
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Take every byte written so far
    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.written)
    }
}

impl Transport for ScriptedTransport {
    fn raw_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reads.pop_front() {
            None => Err(io::ErrorKind::WouldBlock.into()),
            Some(Err(err)) => Err(err),
            Some(Ok(chunk)) => {
                let count = chunk.len().min(buf.len());
                buf[..count].copy_from_slice(&chunk[..count]);
                if count < chunk.len() {
                    self.reads.push_front(Ok(chunk[count..].to_vec()));
                }
                Ok(count)
            }
        }
    }

    fn raw_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writes.pop_front() {
            None => {
                self.written.extend_from_slice(buf);
                Ok(buf.len())
            }
            Some(WriteStep::Accept(limit)) => {
                let count = limit.min(buf.len());
                self.written.extend_from_slice(&buf[..count]);
                Ok(count)
            }
            Some(WriteStep::WouldBlock) => Err(io::ErrorKind::WouldBlock.into()),
            Some(WriteStep::Fail(kind)) => Err(kind.into()),
        }
    }

    fn raw_read_oob(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.oob.pop_front() {
            Some(byte) => {
                buf[0] = byte;
                Ok(1)
            }
            None => Err(io::ErrorKind::WouldBlock.into()),
        }
    }
}
