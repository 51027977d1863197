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

//! Connection facade

use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, ConnectionResult};
use crate::raw::RawSession;
use crate::ssh::{HostTrust, SshAdapter, SshSession};
use metrics::{counter, gauge};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use tracing::{debug, info, instrument, warn};
use vtlink_rlogin::RloginSession;
use vtlink_telnet::{NvtRole, TelnetCodec, TelnetCommand, TelnetSession, WindowSize};
use vtlink_transport::{
    Flushed, LocalBind, NegotiationState, PortSpec, RawListener, RawSocket, Transport,
    TransportError, resolve,
};

/// Wire protocol spoken over the connection
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Protocol {
    /// Telnet NVT with option negotiation
    Telnet,
    /// BSD rlogin
    Rlogin,
    /// SSH, delegated to an external library
    Ssh,
    /// Plain 8-bit pass-through
    Raw,
}

impl Protocol {
    /// Lower-case protocol name, also used as the metrics label
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Telnet => "telnet",
            Protocol::Rlogin => "rlogin",
            Protocol::Ssh => "ssh",
            Protocol::Raw => "raw",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
enum Engine<T: Transport> {
    Telnet(TelnetSession<T>),
    Rlogin(RloginSession<T>),
    Raw(RawSession<T>),
    Ssh {
        socket: T,
        adapter: Option<SshAdapter>,
    },
}

impl<T: Transport> Engine<T> {
    fn transport(&self) -> &T {
        match self {
            Engine::Telnet(session) => session.transport(),
            Engine::Rlogin(session) => session.transport(),
            Engine::Raw(session) => session.transport(),
            Engine::Ssh { socket, .. } => socket,
        }
    }

    fn state(&self) -> NegotiationState {
        match self {
            Engine::Telnet(session) => session.state(),
            Engine::Rlogin(session) => session.state(),
            Engine::Raw(_) | Engine::Ssh { adapter: Some(_), .. } => NegotiationState::Established,
            Engine::Ssh { adapter: None, .. } => NegotiationState::Init,
        }
    }

    fn shutdown(self) {
        match self {
            Engine::Telnet(session) => session.into_inner().shutdown(),
            Engine::Rlogin(session) => session.into_inner().shutdown(),
            Engine::Raw(mut session) => session.transport_mut().shutdown(),
            Engine::Ssh {
                mut socket,
                adapter,
            } => {
                if let Some(mut adapter) = adapter {
                    adapter.close();
                }
                socket.shutdown();
            }
        }
    }
}

/// One remote terminal connection.
///
/// The facade owns the socket and routes reads and writes to the protocol engine chosen at
/// construction. Every call is non-blocking and follows the POSIX `read()`/`write()`
/// contract: would-block is [`ConnectionError::is_would_block`], end of stream is `Ok(0)`
/// after a one-time close notice.
///
/// Connections made with [`Connection::connect_start`] or [`Connection::accept`] run over a
/// [`RawSocket`]; [`Connection::from_transport`] wraps any other [`Transport`].
#[derive(Debug)]
pub struct Connection<T: Transport = RawSocket> {
    protocol: Protocol,
    config: ConnectionConfig,
    host: String,
    candidates: VecDeque<SocketAddr>,
    pending: Option<T>,
    engine: Option<Engine<T>>,
    listener: Option<RawListener>,
    peer: Option<SocketAddr>,
    local: Option<SocketAddr>,
}

impl<T: Transport> Connection<T> {
    fn idle(protocol: Protocol, config: ConnectionConfig) -> Self {
        Connection {
            protocol,
            config,
            host: String::new(),
            candidates: VecDeque::new(),
            pending: None,
            engine: None,
            listener: None,
            peer: None,
            local: None,
        }
    }

    /// Run `protocol` over an already connected transport.
    ///
    /// `role` selects the telnet side; rlogin only supports the client role.
    pub fn from_transport(
        transport: T,
        protocol: Protocol,
        config: ConnectionConfig,
        role: NvtRole,
    ) -> ConnectionResult<Self> {
        let mut connection = Self::idle(protocol, config);
        connection.establish(transport, role)?;
        Ok(connection)
    }

    /// Selected protocol
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Active configuration, including the last window size
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Host name given to the last `connect_start`
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Remote address of the current or pending connection
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Local address of the current connection
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local
    }

    /// Negotiation progress
    pub fn state(&self) -> NegotiationState {
        self.engine
            .as_ref()
            .map_or(NegotiationState::Init, Engine::state)
    }

    /// Check if a connection is established
    pub fn is_connected(&self) -> bool {
        self.engine.is_some()
    }

    /// Check if a connect is in progress
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Check if a listening socket is open
    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    /// The telnet engine, when the protocol is telnet
    pub fn telnet(&self) -> Option<&TelnetSession<T>> {
        match &self.engine {
            Some(Engine::Telnet(session)) => Some(session),
            _ => None,
        }
    }

    /// The rlogin engine, when the protocol is rlogin
    pub fn rlogin(&self) -> Option<&RloginSession<T>> {
        match &self.engine {
            Some(Engine::Rlogin(session)) => Some(session),
            _ => None,
        }
    }

    /// The underlying transport of an established connection
    pub fn transport(&self) -> Option<&T> {
        self.engine.as_ref().map(Engine::transport)
    }

    fn establish(&mut self, transport: T, role: NvtRole) -> ConnectionResult<()> {
        let buffer_size = self.config.buffer_size;
        let timeout = self.config.write_retry_timeout;
        let mut engine = match self.protocol {
            Protocol::Telnet => {
                let codec = TelnetCodec::new(role, self.config.terminal_info());
                Engine::Telnet(
                    TelnetSession::new(transport, codec)
                        .with_buffer_size(buffer_size)
                        .with_retry_timeout(timeout),
                )
            }
            Protocol::Rlogin if role == NvtRole::Server => {
                return Err(self.unsupported("the server role"));
            }
            Protocol::Rlogin => Engine::Rlogin(
                RloginSession::new(transport, self.config.login_info())
                    .with_buffer_size(buffer_size)
                    .with_retry_timeout(timeout),
            ),
            Protocol::Raw => Engine::Raw(RawSession::new(transport, buffer_size)),
            Protocol::Ssh => Engine::Ssh {
                socket: transport,
                adapter: None,
            },
        };

        match &mut engine {
            Engine::Telnet(session) => session.start()?,
            Engine::Rlogin(session) => session.start()?,
            Engine::Raw(_) | Engine::Ssh { .. } => {}
        }

        counter!("vtlink.connections.opened", "protocol" => self.protocol.as_str()).increment(1);
        gauge!("vtlink.connections.active").increment(1.0);
        info!(protocol = %self.protocol, peer = ?self.peer, ?role, "Connection established");
        self.engine = Some(engine);
        Ok(())
    }

    fn unsupported(&self, operation: &'static str) -> ConnectionError {
        ConnectionError::UnsupportedRole {
            protocol: self.protocol,
            operation,
        }
    }

    fn engine_mut(&mut self) -> ConnectionResult<&mut Engine<T>> {
        self.engine.as_mut().ok_or(ConnectionError::NotConnected)
    }

    /// Read payload into `out`.
    pub fn read(&mut self, out: &mut [u8]) -> ConnectionResult<usize> {
        let protocol = self.protocol.as_str();
        let result = match self.engine_mut()? {
            Engine::Telnet(session) => {
                let before = session.control_bytes();
                let result = session.read(out);
                let consumed = session.control_bytes() - before;
                if consumed > 0 {
                    counter!("vtlink.bytes.control", "protocol" => protocol).increment(consumed);
                }
                result.map_err(ConnectionError::from)
            }
            Engine::Rlogin(session) => session.read(out).map_err(ConnectionError::from),
            Engine::Raw(session) => session.read(out).map_err(ConnectionError::from),
            Engine::Ssh { adapter, .. } => adapter
                .as_mut()
                .ok_or(ConnectionError::SshNotAttached)?
                .read(out),
        };
        if let Ok(count) = result {
            counter!("vtlink.bytes.read", "protocol" => protocol).increment(count as u64);
        }
        result
    }

    /// Handle pending urgent data.
    ///
    /// Only rlogin carries urgent data; the result is never payload, so a successful call
    /// surfaces as would-block like any other protocol.
    pub fn read_oob(&mut self) -> ConnectionResult<usize> {
        match self.engine_mut()? {
            Engine::Rlogin(session) => session.read_oob().map_err(ConnectionError::from),
            _ => Err(TransportError::WouldBlock.into()),
        }
    }

    /// Send caller bytes, returning how many were accepted.
    pub fn write(&mut self, data: &[u8]) -> ConnectionResult<usize> {
        let protocol = self.protocol.as_str();
        let result = match self.engine_mut()? {
            Engine::Telnet(session) => session.write(data).map_err(ConnectionError::from),
            Engine::Rlogin(session) => session.write(data).map_err(ConnectionError::from),
            Engine::Raw(session) => session.write(data).map_err(ConnectionError::from),
            Engine::Ssh { adapter, .. } => adapter
                .as_mut()
                .ok_or(ConnectionError::SshNotAttached)?
                .write(data),
        };
        if let Ok(count) = result {
            counter!("vtlink.bytes.written", "protocol" => protocol).increment(count as u64);
        }
        result
    }

    /// Push encoded bytes still owed to the remote side, without accepting new input
    pub fn flush(&mut self) -> ConnectionResult<Flushed> {
        match self.engine_mut()? {
            Engine::Telnet(session) => Ok(session.flush()?),
            Engine::Rlogin(session) => Ok(session.flush()?),
            Engine::Raw(session) => Ok(session.flush()?),
            Engine::Ssh { .. } => Ok(Flushed::Complete),
        }
    }

    /// Report new terminal dimensions.
    ///
    /// The size is remembered even when nothing is connected and used for the next login.
    pub fn resize(&mut self, lines: u16, columns: u16) -> ConnectionResult<()> {
        self.config.lines = lines;
        self.config.columns = columns;
        debug!(lines, columns, "Resize");
        match self.engine.as_mut() {
            None | Some(Engine::Raw(_)) => Ok(()),
            Some(Engine::Telnet(session)) => Ok(session.resize(WindowSize::new(columns, lines))?),
            Some(Engine::Rlogin(session)) => Ok(session.resize(lines, columns)?),
            Some(Engine::Ssh { adapter, .. }) => match adapter {
                Some(adapter) => adapter.resize(lines, columns),
                None => Ok(()),
            },
        }
    }

    /// Send a telnet command such as `BRK` or `AYT`
    pub fn send_command(&mut self, command: TelnetCommand) -> ConnectionResult<()> {
        match self.engine.as_mut() {
            Some(Engine::Telnet(session)) => Ok(session.send_command(command)?),
            Some(_) => Err(self.unsupported("telnet commands")),
            None => Err(ConnectionError::NotConnected),
        }
    }

    /// Hand an SSH session, established over this connection's socket, to the facade.
    ///
    /// The host key is checked with `trust` first; a rejected key closes the connection.
    #[instrument(skip(self, session, trust), fields(protocol = %self.protocol, host = %self.host))]
    pub fn attach_ssh(
        &mut self,
        session: Box<dyn SshSession>,
        trust: &mut dyn HostTrust,
    ) -> ConnectionResult<()> {
        let host = if self.host.is_empty() {
            self.peer.map(|peer| peer.ip().to_string()).unwrap_or_default()
        } else {
            self.host.clone()
        };
        let slot = match self.engine.as_mut() {
            Some(Engine::Ssh { adapter, .. }) => adapter,
            Some(_) => return Err(self.unsupported("ssh sessions")),
            None => return Err(ConnectionError::NotConnected),
        };
        if slot.is_some() {
            return Err(ConnectionError::AlreadyConnected);
        }
        match SshAdapter::attach(session, &host, trust) {
            Ok(adapter) => {
                *slot = Some(adapter);
                Ok(())
            }
            Err(err) => {
                self.close();
                Err(err)
            }
        }
    }

    /// Close the connection, any pending connect and any listening socket.
    ///
    /// Closing an idle connection does nothing.
    #[instrument(skip(self), fields(protocol = %self.protocol))]
    pub fn close(&mut self) {
        if self.listener.take().is_some() {
            debug!("Listener closed");
        }
        if self.pending.take().is_some() {
            debug!("Pending connect abandoned");
        }
        self.candidates.clear();
        if let Some(engine) = self.engine.take() {
            engine.shutdown();
            counter!("vtlink.connections.closed", "protocol" => self.protocol.as_str())
                .increment(1);
            gauge!("vtlink.connections.active").decrement(1.0);
            info!(peer = ?self.peer, "Connection closed");
        }
        self.peer = None;
        self.local = None;
    }
}

impl Connection<RawSocket> {
    /// Create an idle connection for `protocol`
    pub fn new(protocol: Protocol, config: ConnectionConfig) -> Self {
        Self::idle(protocol, config)
    }

    fn ensure_idle(&self) -> ConnectionResult<()> {
        if self.engine.is_some() || self.pending.is_some() || self.listener.is_some() {
            return Err(ConnectionError::AlreadyConnected);
        }
        Ok(())
    }

    /// Resolve `host` and start a non-blocking connect to its first address.
    ///
    /// Rlogin binds a privileged local port first. Returns the address being tried; finish
    /// with [`Connection::connect_finish`] once the socket is writable.
    #[instrument(skip(self), fields(protocol = %self.protocol))]
    pub fn connect_start(&mut self, host: &str, port: u16) -> ConnectionResult<SocketAddr> {
        self.ensure_idle()?;
        let addrs = resolve(host, port)?;
        debug!(count = addrs.len(), "Resolved addresses");
        self.host = host.to_string();
        self.candidates = addrs.into();
        self.start_next()
    }

    /// Start a connect to the next resolved address after a failed attempt
    #[instrument(skip(self), fields(protocol = %self.protocol, host = %self.host))]
    pub fn connect_next(&mut self) -> ConnectionResult<SocketAddr> {
        self.ensure_idle()?;
        self.start_next()
    }

    fn start_next(&mut self) -> ConnectionResult<SocketAddr> {
        let bind = if self.protocol == Protocol::Rlogin {
            LocalBind::Privileged
        } else {
            LocalBind::Any
        };
        let mut last = None;
        while let Some(addr) = self.candidates.pop_front() {
            match RawSocket::connect_start(addr, bind) {
                Ok(socket) => {
                    debug!(%addr, "Connect started");
                    self.peer = Some(addr);
                    self.pending = Some(socket);
                    return Ok(addr);
                }
                Err(err @ TransportError::NoPrivilegedPort { .. }) => {
                    self.candidates.clear();
                    return Err(err.into());
                }
                Err(err) => {
                    warn!(%addr, "Connect failed: {}", err);
                    last = Some(err);
                }
            }
        }
        Err(last
            .unwrap_or(TransportError::NoAddress {
                host: self.host.clone(),
            })
            .into())
    }

    /// Complete a pending connect and start the protocol handshake.
    ///
    /// Would-block means the handshake is still in flight. Any other failure closes the
    /// socket; the caller may then try [`Connection::connect_next`].
    #[instrument(skip(self), fields(protocol = %self.protocol, host = %self.host))]
    pub fn connect_finish(&mut self) -> ConnectionResult<()> {
        let Some(socket) = self.pending.take() else {
            return Err(TransportError::NotPending.into());
        };
        match socket.connect_finish() {
            Ok(()) => {
                self.local = socket.local_addr();
                self.establish(socket, NvtRole::Client)
            }
            Err(TransportError::WouldBlock) => {
                self.pending = Some(socket);
                Err(TransportError::WouldBlock.into())
            }
            Err(err) => {
                warn!(peer = ?self.peer, "Connect failed: {}", err);
                counter!("vtlink.connections.failed", "protocol" => self.protocol.as_str())
                    .increment(1);
                self.peer = None;
                Err(err.into())
            }
        }
    }

    /// Open a listening socket, returning the bound port.
    ///
    /// [`PortSpec::AnyFree`] searches the configured `listen_ports` range.
    #[instrument(skip(self), fields(protocol = %self.protocol))]
    pub fn listen(&mut self, spec: PortSpec) -> ConnectionResult<u16> {
        if matches!(self.protocol, Protocol::Rlogin | Protocol::Ssh) {
            return Err(self.unsupported("listen"));
        }
        self.ensure_idle()?;
        let listener = RawListener::bind(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            spec,
            self.config.listen_ports.clone(),
        )?;
        let port = listener.port();
        info!(port, "Listening");
        self.local = Some(listener.local_addr());
        self.listener = Some(listener);
        Ok(port)
    }

    /// Accept a waiting peer without blocking.
    ///
    /// Returns `Ok(None)` when nobody is waiting. The listener is closed once a peer is
    /// accepted; the connection then runs the server side of the protocol.
    #[instrument(skip(self), fields(protocol = %self.protocol))]
    pub fn accept(&mut self) -> ConnectionResult<Option<SocketAddr>> {
        let listener = self.listener.as_ref().ok_or(ConnectionError::NotListening)?;
        let Some(socket) = listener.accept()? else {
            return Ok(None);
        };
        self.listener = None;
        let peer = socket.peer_addr();
        self.peer = Some(peer);
        self.local = socket.local_addr();
        self.establish(socket, NvtRole::Server)?;
        Ok(Some(peer))
    }

    /// Duplicate the connected socket as a standard stream for an SSH library to drive
    pub fn clone_stream(&self) -> ConnectionResult<TcpStream> {
        match &self.engine {
            Some(engine) => Ok(engine.transport().try_clone_stream()?),
            None => Err(ConnectionError::NotConnected),
        }
    }

    /// Descriptor to poll: the connected, connecting or listening socket
    #[cfg(unix)]
    pub fn raw_fd(&self) -> Option<std::os::unix::io::RawFd> {
        use std::os::unix::io::AsRawFd;
        if let Some(engine) = &self.engine {
            return Some(engine.transport().as_raw_fd());
        }
        if let Some(socket) = &self.pending {
            return Some(socket.as_raw_fd());
        }
        self.listener.as_ref().map(AsRawFd::as_raw_fd)
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Transport> io::Read for Connection<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Connection::read(self, buf).map_err(io::Error::from)
    }
}

impl<T: Transport> io::Write for Connection<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Connection::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        match Connection::flush(self)? {
            Flushed::Complete => Ok(()),
            Flushed::Stalled => Err(io::ErrorKind::WouldBlock.into()),
        }
    }
}
