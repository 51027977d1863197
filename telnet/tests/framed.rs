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

//! The codec driven through `tokio_util` framing and through a scripted transport

use bytes::BytesMut;
use futures::StreamExt;
use tokio_util::codec::{Encoder, FramedRead};
use vtlink_telnet::{TelnetCodec, TelnetSession, TerminalInfo, WindowSize};
use vtlink_transport::{NegotiationState, ScriptedTransport};

#[tokio::test]
async fn framed_read_yields_only_payload() {
    let wire: &[u8] = b"\xff\xfb\x01\xff\xfb\x03Hello\xff\xfa\x18\x01\xff\xf0, world\r\n";
    let mut framed = FramedRead::new(wire, TelnetCodec::default());

    let mut payload = Vec::new();
    while let Some(chunk) = framed.next().await {
        payload.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(payload, b"Hello, world\r\n");

    let codec = framed.decoder();
    assert!(codec.flags().echo_mode);
    assert!(!codec.flags().go_ahead);
}

#[test]
fn encoder_frames_payload() {
    let mut codec = TelnetCodec::default();
    let mut dst = BytesMut::new();
    codec.encode(&b"exit\r"[..], &mut dst).unwrap();
    assert_eq!(&dst[..], b"exit\r\0");
}

#[test]
fn server_session_learns_peer_terminal() {
    let mut transport = ScriptedTransport::new();
    transport
        .push_read(b"\xff\xfb\x18\xff\xfb\x1f")
        .push_read(b"\xff\xfa\x1f\x00\x84\x00\x2b\xff\xf0")
        .push_read(b"\xff\xfa\x18\x00ANSI\xff\xf0");

    let codec = TelnetCodec::server(TerminalInfo::default());
    let mut session = TelnetSession::new(transport, codec);
    let mut out = [0u8; 64];
    for _ in 0..3 {
        assert!(session.read(&mut out).unwrap_err().is_would_block());
    }
    assert_eq!(session.state(), NegotiationState::SentOptions);
    assert_eq!(session.codec().peer_terminal_type(), Some("ANSI"));
    assert_eq!(
        session.codec().peer_window_size(),
        Some(WindowSize::new(132, 43))
    );
    // The server asked for the terminal type once TTYPE was agreed
    assert!(
        session
            .transport()
            .written()
            .windows(6)
            .any(|w| w == b"\xff\xfa\x18\x01\xff\xf0")
    );
}
