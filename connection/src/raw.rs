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

//! Plain 8-bit pass-through session

use vtlink_transport::{Flushed, RawInput, RawOutput, Transport, TransportResult};

/// No negotiation, no escaping; only the shared read/write discipline
#[derive(Debug)]
pub struct RawSession<T: Transport> {
    transport: T,
    input: RawInput,
    output: RawOutput,
}

impl<T: Transport> RawSession<T> {
    /// Wrap `transport` with buffers of `buffer_size` bytes
    pub fn new(transport: T, buffer_size: usize) -> Self {
        RawSession {
            transport,
            input: RawInput::new(buffer_size),
            output: RawOutput::new(buffer_size),
        }
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Bytes not yet accepted by the transport
    pub fn pending_output(&self) -> usize {
        self.output.len()
    }

    /// Read raw bytes
    pub fn read(&mut self, out: &mut [u8]) -> TransportResult<usize> {
        self.input.read(&mut self.transport, out)
    }

    /// Write raw bytes
    pub fn write(&mut self, data: &[u8]) -> TransportResult<usize> {
        self.output.write_passthrough(&mut self.transport, data)
    }

    /// Push pending output
    pub fn flush(&mut self) -> TransportResult<Flushed> {
        self.output.flush(&mut self.transport)
    }
}
