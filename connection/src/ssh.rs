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

//! SSH adapter
//!
//! The SSH protocol itself lives in an external library. This module defines the seam that
//! library is plugged into ([`SshSession`]) and maps its results onto the same read/write
//! contract the telnet and rlogin engines follow.

use crate::error::{ConnectionError, ConnectionResult};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};
use vtlink_transport::{CONNECTION_CLOSED, TransportError};

/// Server host key as presented during key exchange
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostKey {
    /// Key algorithm (e.g., "ssh-ed25519")
    pub algorithm: String,
    /// Printable fingerprint (e.g., "SHA256:...")
    pub fingerprint: String,
}

impl HostKey {
    /// Create a host key description
    pub fn new(algorithm: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        HostKey {
            algorithm: algorithm.into(),
            fingerprint: fingerprint.into(),
        }
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.algorithm, self.fingerprint)
    }
}

/// Signals an SSH library reports through [`SshSession`]
#[derive(Debug, Error)]
pub enum SshError {
    /// No data yet, or the channel window is full
    #[error("Would block")]
    WouldBlock,
    /// The channel was closed by the server
    #[error("End of stream")]
    Eof,
    /// The server presented a different host key mid-session
    #[error("Host key changed: {0}")]
    HostKeyChanged(HostKey),
    /// Any other library failure
    #[error("{0}")]
    Fatal(String),
}

/// An established SSH shell channel provided by an external library.
///
/// The library owns the socket I/O; it must run on a non-blocking socket and report
/// [`SshError::WouldBlock`] instead of waiting.
pub trait SshSession {
    /// Host key the server presented
    fn host_key(&self) -> HostKey;

    /// Read channel data into `buf`
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SshError>;

    /// Write caller bytes to the channel
    fn write(&mut self, data: &[u8]) -> Result<usize, SshError>;

    /// Forward new terminal dimensions
    fn resize(&mut self, lines: u16, columns: u16) -> Result<(), SshError>;

    /// Close the channel and the session
    fn close(&mut self);
}

/// The single synchronous "is this host trusted" decision point.
///
/// Prompting and key storage belong to the embedding application.
pub trait HostTrust {
    /// Decide whether to proceed with `host` presenting `key`
    fn is_trusted(&mut self, host: &str, key: &HostKey) -> bool;
}

impl<F> HostTrust for F
where
    F: FnMut(&str, &HostKey) -> bool,
{
    fn is_trusted(&mut self, host: &str, key: &HostKey) -> bool {
        self(host, key)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Eof {
    Open,
    Notice(usize),
    Closed,
}

/// Adapts an [`SshSession`] to the vtlink read/write contract
pub struct SshAdapter {
    session: Box<dyn SshSession>,
    host: String,
    eof: Eof,
    closed: bool,
}

impl fmt::Debug for SshAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshAdapter")
            .field("host", &self.host)
            .field("eof", &self.eof)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl SshAdapter {
    /// Check the host key with `trust` and wrap the session.
    ///
    /// A rejected key closes the session.
    pub fn attach(
        mut session: Box<dyn SshSession>,
        host: &str,
        trust: &mut dyn HostTrust,
    ) -> ConnectionResult<SshAdapter> {
        let key = session.host_key();
        if !trust.is_trusted(host, &key) {
            warn!(host, key = %key, "Host key rejected");
            session.close();
            return Err(ConnectionError::UntrustedHost {
                host: host.to_string(),
                fingerprint: key.fingerprint,
            });
        }
        debug!(host, key = %key, "SSH session attached");
        Ok(SshAdapter {
            session,
            host: host.to_string(),
            eof: Eof::Open,
            closed: false,
        })
    }

    /// Read channel data; EOF yields the close notice once, then `Ok(0)`.
    pub fn read(&mut self, out: &mut [u8]) -> ConnectionResult<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        match self.eof {
            Eof::Open => {}
            Eof::Notice(sent) => return Ok(self.read_notice(sent, out)),
            Eof::Closed => return Ok(0),
        }
        match self.session.read(out) {
            Ok(0) | Err(SshError::Eof) => {
                debug!(host = %self.host, "SSH channel closed");
                Ok(self.read_notice(0, out))
            }
            Ok(count) => Ok(count),
            Err(err) => Err(self.map_error(err)),
        }
    }

    /// Write caller bytes to the channel
    pub fn write(&mut self, data: &[u8]) -> ConnectionResult<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        self.session.write(data).map_err(|err| self.map_error(err))
    }

    /// Forward new terminal dimensions
    pub fn resize(&mut self, lines: u16, columns: u16) -> ConnectionResult<()> {
        self.session
            .resize(lines, columns)
            .map_err(|err| self.map_error(err))
    }

    /// Close the session, once
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.session.close();
        }
    }

    fn read_notice(&mut self, sent: usize, out: &mut [u8]) -> usize {
        let rest = &CONNECTION_CLOSED[sent..];
        let count = rest.len().min(out.len());
        out[..count].copy_from_slice(&rest[..count]);
        self.eof = if sent + count == CONNECTION_CLOSED.len() {
            Eof::Closed
        } else {
            Eof::Notice(sent + count)
        };
        count
    }

    fn map_error(&self, err: SshError) -> ConnectionError {
        match err {
            SshError::WouldBlock => TransportError::WouldBlock.into(),
            SshError::Eof => TransportError::Closed.into(),
            SshError::HostKeyChanged(key) => {
                warn!(host = %self.host, key = %key, "Host key changed mid-session");
                ConnectionError::UntrustedHost {
                    host: self.host.clone(),
                    fingerprint: key.fingerprint,
                }
            }
            SshError::Fatal(message) => ConnectionError::Ssh(message),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Scripted SSH session recording what the adapter forwards
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedSsh {
        pub(crate) reads: VecDeque<Result<Vec<u8>, SshError>>,
        pub(crate) log: Rc<RefCell<Vec<String>>>,
    }

    impl SshSession for ScriptedSsh {
        fn host_key(&self) -> HostKey {
            HostKey::new("ssh-ed25519", "SHA256:test")
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, SshError> {
            match self.reads.pop_front() {
                None => Err(SshError::WouldBlock),
                Some(Err(err)) => Err(err),
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
            }
        }

        fn write(&mut self, data: &[u8]) -> Result<usize, SshError> {
            self.log
                .borrow_mut()
                .push(format!("write {}", String::from_utf8_lossy(data)));
            Ok(data.len())
        }

        fn resize(&mut self, lines: u16, columns: u16) -> Result<(), SshError> {
            self.log.borrow_mut().push(format!("resize {lines}x{columns}"));
            Ok(())
        }

        fn close(&mut self) {
            self.log.borrow_mut().push("close".to_string());
        }
    }

    fn trust_all() -> impl FnMut(&str, &HostKey) -> bool {
        |_: &str, _: &HostKey| true
    }

    #[test]
    fn test_untrusted_host_closes_session() {
        let ssh = ScriptedSsh::default();
        let log = Rc::clone(&ssh.log);
        let mut reject = |_: &str, _: &HostKey| false;
        let err = SshAdapter::attach(Box::new(ssh), "example.org", &mut reject).unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::UntrustedHost { ref fingerprint, .. } if fingerprint == "SHA256:test"
        ));
        assert_eq!(*log.borrow(), vec!["close".to_string()]);
    }

    #[test]
    fn test_read_maps_signals() {
        let mut ssh = ScriptedSsh::default();
        ssh.reads.push_back(Ok(b"motd".to_vec()));
        ssh.reads.push_back(Err(SshError::WouldBlock));
        ssh.reads.push_back(Err(SshError::Eof));
        let mut adapter = SshAdapter::attach(Box::new(ssh), "host", &mut trust_all()).unwrap();

        let mut out = [0u8; 64];
        assert_eq!(adapter.read(&mut out).unwrap(), 4);
        assert!(adapter.read(&mut out).unwrap_err().is_would_block());
        let count = adapter.read(&mut out).unwrap();
        assert_eq!(&out[..count], CONNECTION_CLOSED);
        assert_eq!(adapter.read(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_notice_spans_small_buffers() {
        let mut ssh = ScriptedSsh::default();
        ssh.reads.push_back(Err(SshError::Eof));
        let mut adapter = SshAdapter::attach(Box::new(ssh), "host", &mut trust_all()).unwrap();

        let mut notice = Vec::new();
        let mut out = [0u8; 5];
        loop {
            let count = adapter.read(&mut out).unwrap();
            if count == 0 {
                break;
            }
            notice.extend_from_slice(&out[..count]);
        }
        assert_eq!(notice, CONNECTION_CLOSED);
    }

    #[test]
    fn test_host_key_change_is_untrusted() {
        let mut ssh = ScriptedSsh::default();
        ssh.reads
            .push_back(Err(SshError::HostKeyChanged(HostKey::new("ssh-rsa", "SHA256:new"))));
        let mut adapter = SshAdapter::attach(Box::new(ssh), "host", &mut trust_all()).unwrap();
        let err = adapter.read(&mut [0u8; 8]).unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::UntrustedHost { ref fingerprint, .. } if fingerprint == "SHA256:new"
        ));
    }

    #[test]
    fn test_fatal_error() {
        let mut ssh = ScriptedSsh::default();
        ssh.reads.push_back(Err(SshError::Fatal("channel failure".into())));
        let mut adapter = SshAdapter::attach(Box::new(ssh), "host", &mut trust_all()).unwrap();
        let err = adapter.read(&mut [0u8; 8]).unwrap_err();
        assert!(matches!(err, ConnectionError::Ssh(ref msg) if msg == "channel failure"));
    }

    #[test]
    fn test_write_resize_close_forwarded() {
        let ssh = ScriptedSsh::default();
        let log = Rc::clone(&ssh.log);
        let mut adapter = SshAdapter::attach(Box::new(ssh), "host", &mut trust_all()).unwrap();
        assert_eq!(adapter.write(b"ls").unwrap(), 2);
        adapter.resize(40, 100).unwrap();
        adapter.close();
        adapter.close();
        assert_eq!(
            *log.borrow(),
            vec!["write ls".to_string(), "resize 40x100".to_string(), "close".to_string()]
        );
    }
}
