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

//! Error types for the connection facade

use crate::connection::Protocol;
use std::io;
use thiserror::Error;
use vtlink_transport::TransportError;

/// Result type for connection operations
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Connection error types
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Error from the socket layer, including the would-block class
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The host key was rejected
    #[error("Host {host} is not trusted (key {fingerprint})")]
    UntrustedHost {
        /// Host name as given to `connect_start`
        host: String,
        /// Fingerprint of the rejected key
        fingerprint: String,
    },

    /// Fatal error reported by the SSH library
    #[error("SSH error: {0}")]
    Ssh(String),

    /// An SSH connection has no session attached yet
    #[error("No SSH session attached")]
    SshNotAttached,

    /// A connection is already open or pending
    #[error("Already connected")]
    AlreadyConnected,

    /// No connection is open
    #[error("Not connected")]
    NotConnected,

    /// `accept` was called without a listening socket
    #[error("Not listening")]
    NotListening,

    /// The protocol does not support the operation
    #[error("{protocol} does not support {operation}")]
    UnsupportedRole {
        /// Selected protocol
        protocol: Protocol,
        /// Rejected operation
        operation: &'static str,
    },
}

impl ConnectionError {
    /// Check if the error is the EAGAIN class
    pub fn is_would_block(&self) -> bool {
        matches!(self, ConnectionError::Transport(err) if err.is_would_block())
    }

    /// Check if the error is recoverable
    ///
    /// Only the would-block class is; every other error leaves the connection closed or
    /// unusable until the caller re-initiates.
    pub fn is_recoverable(&self) -> bool {
        self.is_would_block()
    }
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        ConnectionError::Transport(TransportError::from(err))
    }
}

impl From<ConnectionError> for io::Error {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::Transport(TransportError::WouldBlock) => io::ErrorKind::WouldBlock.into(),
            ConnectionError::Transport(TransportError::Io(err)) => err,
            ConnectionError::NotConnected => io::ErrorKind::NotConnected.into(),
            other => io::Error::other(other),
        }
    }
}
