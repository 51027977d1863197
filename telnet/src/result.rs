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

use thiserror::Error;

/// Result Type for Telnet Operations
pub type TelnetResult<T> = Result<T, TelnetError>;

/// Errors raised by the telnet engine.
///
/// Protocol violations by the remote side are never fatal: the decoder logs them and drops
/// the offending exchange. They surface as values only where a caller asks for them (the
/// sub-negotiation parsers) and as the `tokio_util` codec error type.
#[derive(Debug, Error)]
pub enum TelnetError {
    /// A sub-negotiation could not be handled
    #[error("Subnegotiation error for option {option}: {reason}")]
    Subnegotiation {
        /// The telnet option being sub-negotiated
        option: u8,
        /// Specific reason for the failure
        reason: SubnegotiationErrorKind,
    },

    /// I/O error from a framed stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Specific kinds of sub-negotiation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubnegotiationErrorKind {
    /// Fewer parameter bytes than the option requires
    #[error("insufficient data (required: {required}, available: {available})")]
    InsufficientData {
        /// Number of bytes required
        required: usize,
        /// Number of bytes available
        available: usize,
    },

    /// The sub-negotiation exceeded the accumulation limit
    #[error("overflow (limit: {limit} bytes)")]
    Overflow {
        /// Limit in bytes
        limit: usize,
    },

    /// A command code this side does not answer
    #[error("unknown command: 0x{0:02X}")]
    UnknownCommand(u8),
}

impl TelnetError {
    /// Shorthand for a [`TelnetError::Subnegotiation`]
    pub fn subnegotiation(option: u8, reason: SubnegotiationErrorKind) -> Self {
        TelnetError::Subnegotiation { option, reason }
    }

    /// Check if the error came from the remote side's protocol usage rather than local I/O
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, TelnetError::Subnegotiation { .. })
    }
}
