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

//! TCP connect, listen and accept on non-blocking sockets
//!
//! Connecting is two-phase: [`RawSocket::connect_start`] returns at once with the connect in
//! progress, and [`RawSocket::connect_finish`] is called once the caller's poll loop reports
//! the descriptor writable. Nothing in here waits on the network except name resolution.

use crate::result::{TransportError, TransportResult, is_would_block};
use crate::Transport;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read, Write};
use std::mem::MaybeUninit;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs};
use std::ops::RangeInclusive;
use tracing::{debug, warn};

/// Local ports an rlogin client may bind, searched from the top down
pub const PRIVILEGED_PORTS: RangeInclusive<u16> = 512..=1023;

/// Hard cap on the free-port search
pub const MAX_PORT_ATTEMPTS: usize = 1024;

/// Listen backlog
const LISTEN_BACKLOG: i32 = 5;

/// Local address selection for an outbound connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalBind {
    /// Let the kernel pick an ephemeral port
    #[default]
    Any,
    /// Bind a port in [`PRIVILEGED_PORTS`] (required by rlogin servers)
    Privileged,
}

/// Port selection for a listening socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSpec {
    /// Exactly this port
    Specific(u16),
    /// The first free port of the configured search range
    AnyFree,
}

impl std::fmt::Display for PortSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortSpec::Specific(port) => write!(f, "{}", port),
            PortSpec::AnyFree => write!(f, "any"),
        }
    }
}

/// Resolve a host name to every address it maps to.
///
/// Resolution is synchronous; failures are reported immediately.
pub fn resolve(host: &str, port: u16) -> TransportResult<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::NoAddress {
            host: host.to_string(),
        });
    }
    debug!(host, port, count = addrs.len(), "Resolved host");
    Ok(addrs)
}

/// A connected (or connecting) non-blocking TCP socket
#[derive(Debug)]
pub struct RawSocket {
    socket: Socket,
    peer: SocketAddr,
}

impl RawSocket {
    /// Begin a non-blocking connect to `addr`.
    ///
    /// Socket creation, local binding and immediate connect failures are reported here; a
    /// connect that is merely in progress is success.
    pub fn connect_start(addr: SocketAddr, bind: LocalBind) -> TransportResult<RawSocket> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(TransportError::Io)?;
        socket.set_nonblocking(true).map_err(TransportError::Io)?;
        if bind == LocalBind::Privileged {
            bind_privileged(&socket, addr)?;
        }
        match socket.connect(&SockAddr::from(addr)) {
            Ok(()) => debug!(%addr, "Connected immediately"),
            Err(err) if connect_in_progress(&err) => debug!(%addr, "Connect in progress"),
            Err(err) => return Err(TransportError::Io(err)),
        }
        Ok(RawSocket { socket, peer: addr })
    }

    /// Complete a connect started by [`RawSocket::connect_start`].
    ///
    /// Inspects the socket's pending error. Returns [`TransportError::WouldBlock`] if the
    /// handshake has not finished yet.
    pub fn connect_finish(&self) -> TransportResult<()> {
        if let Some(err) = self.socket.take_error().map_err(TransportError::Io)? {
            debug!(peer = %self.peer, "Connect failed: {}", err);
            return Err(TransportError::Io(err));
        }
        match self.socket.peer_addr() {
            Ok(_) => {
                debug!(peer = %self.peer, "Connect complete");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Err(TransportError::WouldBlock),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    /// Remote address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Local address, once bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok().and_then(|addr| addr.as_socket())
    }

    /// Duplicate the descriptor as a standard stream, for libraries that drive the socket
    /// themselves.
    pub fn try_clone_stream(&self) -> io::Result<TcpStream> {
        Ok(self.socket.try_clone()?.into())
    }
}

impl Transport for RawSocket {
    fn raw_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.read(buf)
    }

    fn raw_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket.write(buf)
    }

    fn raw_read_oob(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(slot) = buf.first_mut() else {
            return Ok(0);
        };
        // TCP carries a single urgent byte
        let mut urgent = [MaybeUninit::<u8>::uninit(); 1];
        match self.socket.recv_out_of_band(&mut urgent) {
            Ok(0) => Ok(0),
            Ok(_) => {
                // SAFETY: recv reported at least one byte written into `urgent`.
                *slot = unsafe { urgent[0].assume_init() };
                Ok(1)
            }
            // No urgent data pending
            Err(err) if err.kind() == io::ErrorKind::InvalidInput => {
                Err(io::ErrorKind::WouldBlock.into())
            }
            Err(err) => Err(err),
        }
    }

    // Errors are logged, not returned
    fn shutdown(&mut self) {
        if let Err(err) = self.socket.shutdown(std::net::Shutdown::Both) {
            if err.kind() != io::ErrorKind::NotConnected {
                warn!(peer = %self.peer, "Shutdown failed: {}", err);
            }
        }
    }
}

#[cfg(unix)]
impl std::os::unix::io::AsRawFd for RawSocket {
    fn as_raw_fd(&self) -> std::os::unix::io::RawFd {
        std::os::unix::io::AsRawFd::as_raw_fd(&self.socket)
    }
}

/// A non-blocking listening socket
#[derive(Debug)]
pub struct RawListener {
    socket: Socket,
    local: SocketAddr,
}

impl RawListener {
    /// Listen on `ip` at the port chosen by `spec`.
    ///
    /// [`PortSpec::AnyFree`] walks `range` (at most [`MAX_PORT_ATTEMPTS`] ports) and takes the
    /// first port that binds; an empty range lets the kernel choose.
    pub fn bind(ip: IpAddr, spec: PortSpec, range: RangeInclusive<u16>) -> TransportResult<RawListener> {
        let listener = match spec {
            PortSpec::Specific(port) => Self::bind_port(SocketAddr::new(ip, port))?,
            PortSpec::AnyFree if range.is_empty() => Self::bind_port(SocketAddr::new(ip, 0))?,
            PortSpec::AnyFree => {
                let mut attempts = 0;
                let mut found = None;
                for port in range.take(MAX_PORT_ATTEMPTS) {
                    attempts += 1;
                    match Self::bind_port(SocketAddr::new(ip, port)) {
                        Ok(listener) => {
                            found = Some(listener);
                            break;
                        }
                        Err(TransportError::Bind { source, .. })
                            if source.kind() == io::ErrorKind::AddrInUse =>
                        {
                            continue;
                        }
                        Err(err) => return Err(err),
                    }
                }
                found.ok_or(TransportError::NoFreePort { attempts })?
            }
        };
        debug!(local = %listener.local, "Listening");
        Ok(listener)
    }

    fn bind_port(addr: SocketAddr) -> TransportResult<RawListener> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(TransportError::Io)?;
        socket.set_reuse_address(true).map_err(TransportError::Io)?;
        socket
            .bind(&SockAddr::from(addr))
            .map_err(|source| TransportError::Bind { addr, source })?;
        socket.listen(LISTEN_BACKLOG).map_err(TransportError::Io)?;
        socket.set_nonblocking(true).map_err(TransportError::Io)?;
        let local = socket
            .local_addr()
            .ok()
            .and_then(|local| local.as_socket())
            .unwrap_or(addr);
        Ok(RawListener { socket, local })
    }

    /// Accept a pending connection without blocking.
    ///
    /// Returns `Ok(None)` immediately when nobody is waiting.
    pub fn accept(&self) -> TransportResult<Option<RawSocket>> {
        match self.socket.accept() {
            Ok((socket, addr)) => {
                socket.set_nonblocking(true).map_err(TransportError::Io)?;
                let peer = addr.as_socket().unwrap_or(self.local);
                debug!(%peer, "Accepted connection");
                Ok(Some(RawSocket { socket, peer }))
            }
            Err(err) if is_would_block(&err) || err.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    /// Bound local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Bound local port
    pub fn port(&self) -> u16 {
        self.local.port()
    }
}

#[cfg(unix)]
impl std::os::unix::io::AsRawFd for RawListener {
    fn as_raw_fd(&self) -> std::os::unix::io::RawFd {
        std::os::unix::io::AsRawFd::as_raw_fd(&self.socket)
    }
}

fn connect_in_progress(err: &io::Error) -> bool {
    if is_would_block(err) {
        return true;
    }
    #[cfg(unix)]
    {
        if err.raw_os_error() == Some(libc::EINPROGRESS) {
            return true;
        }
    }
    false
}

/// Bind the first free privileged port, searching downwards.
fn bind_privileged(socket: &Socket, remote: SocketAddr) -> TransportResult<u16> {
    let ip: IpAddr = match remote {
        SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };
    let mut reason = String::from("no port tried");
    for port in PRIVILEGED_PORTS.rev() {
        match socket.bind(&SockAddr::from(SocketAddr::new(ip, port))) {
            Ok(()) => {
                debug!(port, "Bound privileged port");
                return Ok(port);
            }
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
                reason = err.to_string();
            }
            Err(err) => {
                // Permission problems affect every port equally
                reason = err.to_string();
                break;
            }
        }
    }
    Err(TransportError::NoPrivilegedPort {
        low: *PRIVILEGED_PORTS.start(),
        high: *PRIVILEGED_PORTS.end(),
        reason,
    })
}
