//! Fuzz target for frame reassembly
//!
//! Feeds arbitrary bytes into a [`FrameBuffer`] in arbitrary chunk sizes.
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - A fatal error leaves the buffer untouched
//! - Every message that comes out validates and re-encodes to a frame that
//!   decodes back to the same message
//! - Chunking does not change what is decoded

#![no_main]

use arbitrary::Arbitrary;
use bingo_proto::{Message, frame, frame::FrameBuffer};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    data: Vec<u8>,
    chunks: Vec<u8>,
}

/// Drain `buffer`, stopping at the first fatal error.
fn drain(buffer: &mut FrameBuffer, out: &mut Vec<Message>) -> bool {
    loop {
        let before = buffer.pending();
        match buffer.next_message() {
            Ok(Some(message)) => {
                assert!(message.validate().is_ok());
                out.push(message);
            },
            Ok(None) => return true,
            Err(e) if e.is_fatal() => {
                assert_eq!(buffer.pending(), before, "fatal error consumed bytes");
                return false;
            },
            Err(_) => {},
        }
    }
}

fuzz_target!(|input: Input| {
    let mut whole = FrameBuffer::new();
    whole.extend(&input.data);
    let mut expected = Vec::new();
    let whole_ok = drain(&mut whole, &mut expected);

    let mut chunked = FrameBuffer::new();
    let mut decoded = Vec::new();
    let mut chunked_ok = true;
    let mut rest = input.data.as_slice();
    let mut sizes = input.chunks.iter().cycle();
    while !rest.is_empty() && chunked_ok {
        let size = sizes.next().map_or(rest.len(), |&s| usize::from(s).max(1)).min(rest.len());
        let (chunk, tail) = rest.split_at(size);
        chunked.extend(chunk);
        rest = tail;
        chunked_ok = drain(&mut chunked, &mut decoded);
    }

    assert_eq!(whole_ok, chunked_ok);
    assert_eq!(expected, decoded);

    for message in expected {
        let mut bytes = Vec::new();
        if frame::encode(&message, &mut bytes).is_ok() {
            let Ok(Some((again, used))) = frame::decode(&bytes) else {
                panic!("re-encoded frame failed to decode");
            };
            assert_eq!(used, bytes.len());
            assert_eq!(again, message);
        }
    }
});
