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

//! Connection configuration

use std::ops::RangeInclusive;
use std::time::Duration;
use vtlink_rlogin::LoginInfo;
use vtlink_telnet::{TerminalInfo, WindowSize};
use vtlink_transport::{DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE};

/// Ports searched by `listen(PortSpec::AnyFree)` unless configured otherwise
pub const DEFAULT_LISTEN_PORTS: RangeInclusive<u16> = 5500..=5599;

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Terminal type to report (e.g., "xterm")
    pub terminal_type: String,

    /// Locale reported through NEW-ENVIRON
    pub lang: String,

    /// Local account name (rlogin)
    pub local_user: String,

    /// Remote account name (rlogin); the local account when unset
    pub remote_user: Option<String>,

    /// Terminal height in lines
    pub lines: u16,

    /// Terminal width in columns
    pub columns: u16,

    /// Raw buffer capacity in bytes
    pub buffer_size: usize,

    /// Ports searched for a free listening port
    pub listen_ports: RangeInclusive<u16>,

    /// Bound on the handshake busy-retry
    pub write_retry_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            terminal_type: "xterm".to_string(),
            lang: "en_US".to_string(),
            local_user: "guest".to_string(),
            remote_user: None,
            lines: 24,
            columns: 80,
            buffer_size: DEFAULT_BUFFER_SIZE,
            listen_ports: DEFAULT_LISTEN_PORTS,
            write_retry_timeout: Duration::from_secs(5),
        }
    }
}

impl ConnectionConfig {
    /// Build a configuration from `TERM`, `LANG` and `USER` (or `LOGNAME`)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let mut config = Self::default();
        if let Some(term) = non_empty("TERM") {
            config.terminal_type = term;
        }
        if let Some(lang) = non_empty("LANG") {
            config.lang = lang;
        }
        if let Some(user) = non_empty("USER").or_else(|| non_empty("LOGNAME")) {
            config.local_user = user;
        }
        config
    }

    /// Set the terminal type
    #[must_use]
    pub fn with_terminal_type(mut self, terminal_type: impl Into<String>) -> Self {
        self.terminal_type = terminal_type.into();
        self
    }

    /// Set the reported locale
    #[must_use]
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    /// Set the local account name
    #[must_use]
    pub fn with_local_user(mut self, user: impl Into<String>) -> Self {
        self.local_user = user.into();
        self
    }

    /// Set the remote account name
    #[must_use]
    pub fn with_remote_user(mut self, user: impl Into<String>) -> Self {
        self.remote_user = Some(user.into());
        self
    }

    /// Set the terminal size
    #[must_use]
    pub fn with_window(mut self, lines: u16, columns: u16) -> Self {
        self.lines = lines;
        self.columns = columns;
        self
    }

    /// Set the raw buffer capacity, raised to [`MIN_BUFFER_SIZE`] if smaller
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(MIN_BUFFER_SIZE);
        self
    }

    /// Set the free-port search range
    #[must_use]
    pub fn with_listen_ports(mut self, ports: RangeInclusive<u16>) -> Self {
        self.listen_ports = ports;
        self
    }

    /// Set the bound on the handshake busy-retry
    #[must_use]
    pub fn with_write_retry_timeout(mut self, timeout: Duration) -> Self {
        self.write_retry_timeout = timeout;
        self
    }

    /// What the telnet engine reports about the terminal
    pub fn terminal_info(&self) -> TerminalInfo {
        TerminalInfo::new(self.terminal_type.clone(), self.lang.clone())
            .with_window(WindowSize::new(self.columns, self.lines))
    }

    /// What the rlogin engine sends at login
    pub fn login_info(&self) -> LoginInfo {
        let login = LoginInfo::new(self.local_user.clone(), self.terminal_type.clone())
            .with_window(self.lines, self.columns);
        match &self.remote_user {
            Some(remote) => login.with_remote_user(remote.clone()),
            None => login,
        }
    }
}
