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

//! Property tests for NVT framing and negotiation

use bytes::BytesMut;
use proptest::prelude::*;
use vtlink_telnet::{NvtFlags, TelnetCodec, TerminalInfo, consts};

// ============================================================================
// Helper Functions
// ============================================================================

/// Codec with binary transmission agreed in both directions
fn binary_codec() -> TelnetCodec {
    let mut codec = TelnetCodec::default();
    let mut sink = BytesMut::new();
    codec.decode_into(b"\xff\xfb\x00\xff\xfd\x00", &mut sink);
    codec.take_replies();
    assert!(codec.flags().binary_mode);
    codec
}

fn encode(codec: &TelnetCodec, src: &[u8]) -> BytesMut {
    let mut wire = BytesMut::new();
    assert_eq!(codec.encode_into(src, &mut wire, usize::MAX), src.len());
    wire
}

fn decode_chunked(codec: &mut TelnetCodec, wire: &[u8], chunk: usize) -> Vec<u8> {
    let mut payload = BytesMut::new();
    for piece in wire.chunks(chunk.max(1)) {
        codec.decode_into(piece, &mut payload);
    }
    payload.to_vec()
}

const SUPPORTED: [u8; 7] = [0, 1, 3, 24, 31, 32, 39];

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn binary_roundtrip_is_identity(data in proptest::collection::vec(any::<u8>(), 0..512), chunk in 1usize..64) {
        let writer = binary_codec();
        let mut reader = binary_codec();
        let wire = encode(&writer, &data);
        prop_assert_eq!(decode_chunked(&mut reader, &wire, chunk), data);
    }

    #[test]
    fn binary_without_iac_is_unchanged_on_the_wire(data in proptest::collection::vec(0u8..0xFF, 0..512)) {
        let writer = binary_codec();
        let wire = encode(&writer, &data);
        prop_assert_eq!(&wire[..], &data[..]);
    }

    #[test]
    fn iac_count_doubles(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let writer = binary_codec();
        let wire = encode(&writer, &data);
        let iacs = data.iter().filter(|&&b| b == consts::IAC).count();
        prop_assert_eq!(wire.len(), data.len() + iacs);
    }

    #[test]
    fn ascii_roundtrip_without_cr_is_identity(data in proptest::collection::vec(any::<u8>().prop_filter("no CR", |b| *b != b'\r'), 0..512), chunk in 1usize..64) {
        let writer = TelnetCodec::default();
        let mut reader = TelnetCodec::default();
        let wire = encode(&writer, &data);
        prop_assert_eq!(decode_chunked(&mut reader, &wire, chunk), data);
    }

    #[test]
    fn unsupported_do_is_refused(option in any::<u8>().prop_filter("unsupported", |o| !SUPPORTED.contains(o))) {
        let mut codec = TelnetCodec::default();
        let before: NvtFlags = *codec.flags();
        for _ in 0..2 {
            let mut payload = BytesMut::new();
            codec.decode_into(&[consts::IAC, consts::DO, option], &mut payload);
            let replies = codec.take_replies();
            prop_assert!(payload.is_empty());
            prop_assert_eq!(&replies[..], &[consts::IAC, consts::WONT, option][..]);
            prop_assert_eq!(*codec.flags(), before);
        }
    }

    #[test]
    fn decoder_never_panics(data in proptest::collection::vec(any::<u8>(), 0..1024), chunk in 1usize..32) {
        let mut client = TelnetCodec::default();
        let mut server = TelnetCodec::server(TerminalInfo::default());
        decode_chunked(&mut client, &data, chunk);
        decode_chunked(&mut server, &data, chunk);
    }
}

// ============================================================================
// Fixed Scenarios
// ============================================================================

#[test]
fn ascii_bare_cr_roundtrip() {
    let writer = TelnetCodec::default();
    let mut reader = TelnetCodec::default();
    let wire = encode(&writer, b"one\rtwo\r\nthree");
    assert_eq!(&wire[..], b"one\r\0two\r\nthree");
    assert_eq!(decode_chunked(&mut reader, &wire, 1), b"one\rtwo\r\nthree");
}

#[test]
fn single_iac_encodes_to_two_bytes() {
    let codec = binary_codec();
    assert_eq!(&encode(&codec, &[0xFF])[..], &[0xFF, 0xFF]);
    let mut reader = binary_codec();
    assert_eq!(decode_chunked(&mut reader, &[0xFF, 0xFF], 1), vec![0xFF]);
}
