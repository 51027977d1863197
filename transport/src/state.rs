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

use std::fmt;

/// Negotiation progress of a connection.
///
/// ```text
/// Init -> SentOptions -> [SentLogin] -> Established
/// ```
///
/// Telnet moves to `SentOptions` once its option requests are on the wire and never reports
/// `Established` explicitly. Rlogin moves to `SentLogin` after the login frame and to
/// `Established` when the server asks for the window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegotiationState {
    /// Nothing sent yet
    #[default]
    Init,
    /// Telnet option requests transmitted
    SentOptions,
    /// Rlogin login fields transmitted
    SentLogin,
    /// Steady-state data relay
    Established,
}

impl NegotiationState {
    /// Check if the handshake has put anything on the wire
    pub fn is_started(self) -> bool {
        !matches!(self, Self::Init)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::SentOptions => write!(f, "sent-options"),
            Self::SentLogin => write!(f, "sent-login"),
            Self::Established => write!(f, "established"),
        }
    }
}
