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

//! File-transfer autostart detection in received payload

use std::fmt;

/// ZRQINIT hex header prefix
const ZMODEM_SIGNATURE: &[u8] = b"**\x18B00";

const SOH: u8 = 0x01;

/// File-transfer protocol announced by the remote side
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transfer {
    /// Zmodem receive request
    Zmodem,
    /// Kermit send-init packet
    Kermit,
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transfer::Zmodem => write!(f, "zmodem"),
            Transfer::Kermit => write!(f, "kermit"),
        }
    }
}

/// A detected autostart signature
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Autostart {
    /// Announced protocol
    pub transfer: Transfer,
    /// Offset of the signature in the scanned chunk
    pub offset: usize,
}

/// Find the first file-transfer signature in `data`.
///
/// A Kermit send-init is `SOH`, a length byte, sequence number `' '` and type `'S'`.
pub fn scan(data: &[u8]) -> Option<Autostart> {
    let zmodem = data
        .windows(ZMODEM_SIGNATURE.len())
        .position(|window| window == ZMODEM_SIGNATURE)
        .map(|offset| Autostart {
            transfer: Transfer::Zmodem,
            offset,
        });
    let kermit = data
        .windows(4)
        .position(|window| window[0] == SOH && window[2] == b' ' && window[3] == b'S')
        .map(|offset| Autostart {
            transfer: Transfer::Kermit,
            offset,
        });
    match (zmodem, kermit) {
        (Some(z), Some(k)) => Some(if k.offset < z.offset { k } else { z }),
        (found, None) | (None, found) => found,
    }
}
