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

//! Error types for the transport layer

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport error types
///
/// The variants follow the errno vocabulary a synchronous caller expects from a non-blocking
/// descriptor: [`TransportError::WouldBlock`] is the EAGAIN class, end of stream is never an
/// error (it is `Ok(0)`), everything else is a local socket failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The operation would block; call again once the descriptor is ready.
    #[error("Resource temporarily unavailable")]
    WouldBlock,

    /// I/O error from the underlying socket
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// Host name resolution failed
    #[error("Unable to resolve {host}: {source}")]
    Resolve {
        /// Host name that failed to resolve
        host: String,
        /// Resolver error
        source: io::Error,
    },

    /// Host name resolved to no usable address
    #[error("No address found for {host}")]
    NoAddress {
        /// Host name that was looked up
        host: String,
    },

    /// Binding a local address failed
    #[error("Unable to bind {addr}: {source}")]
    Bind {
        /// Local address that could not be bound
        addr: SocketAddr,
        /// Socket error
        source: io::Error,
    },

    /// No privileged local port in the search range could be bound
    #[error("Unable to bind a privileged port in {low}..={high}: {reason}")]
    NoPrivilegedPort {
        /// Lowest port tried
        low: u16,
        /// Highest port tried
        high: u16,
        /// Last failure seen
        reason: String,
    },

    /// The free-port search exhausted its attempts
    #[error("No free port found after {attempts} attempts")]
    NoFreePort {
        /// Number of ports tried
        attempts: usize,
    },

    /// `connect_finish` was called without a connect in progress
    #[error("No connection attempt is pending")]
    NotPending,

    /// The descriptor is not connected
    #[error("Not connected")]
    NotConnected,

    /// The connection has been closed and must not be used again
    #[error("Connection closed")]
    Closed,
}

impl TransportError {
    /// Check if the error is the EAGAIN class
    pub fn is_would_block(&self) -> bool {
        matches!(self, TransportError::WouldBlock)
    }

    /// Check if the error is recoverable
    ///
    /// Only the would-block class is recovered by calling again; every other error closes
    /// the connection and requires the caller to re-initiate.
    pub fn is_recoverable(&self) -> bool {
        self.is_would_block()
    }

    /// Check if the error is a connection establishment error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            TransportError::Resolve { .. }
                | TransportError::NoAddress { .. }
                | TransportError::Bind { .. }
                | TransportError::NoPrivilegedPort { .. }
                | TransportError::NotPending
                | TransportError::NotConnected
        )
    }
}

/// Check whether an I/O error belongs to the EAGAIN class.
pub fn is_would_block(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    #[cfg(unix)]
    {
        if let Some(code) = err.raw_os_error() {
            return code == libc::EAGAIN || code == libc::EWOULDBLOCK;
        }
    }
    false
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        if is_would_block(&err) {
            TransportError::WouldBlock
        } else {
            TransportError::Io(err)
        }
    }
}
