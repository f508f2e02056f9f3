//! Property-based tests for the line codec.
//!
//! The decoder must reproduce every encoded frame exactly, regardless of
//! how the byte stream is sliced by the transport.

use proptest::prelude::*;
use wirechat_proto::{ControlFrame, DecodedLine, StreamDecoder, encode_chat};

/// Drain every complete line out of the decoder, panicking on codec errors.
fn drain(decoder: &mut StreamDecoder) -> Vec<DecodedLine> {
    let mut lines = Vec::new();
    while let Some(result) = decoder.next_line() {
        lines.push(result.unwrap());
    }
    lines
}

/// Decode a full byte stream fed in slices of `step` bytes.
fn decode_in_steps(stream: &[u8], step: usize) -> Vec<DecodedLine> {
    let mut decoder = StreamDecoder::new();
    let mut lines = Vec::new();
    for piece in stream.chunks(step.max(1)) {
        decoder.feed(piece);
        lines.extend(drain(&mut decoder));
    }
    lines
}

/// Sender names as they appear in practice: non-empty, no newline, no
/// leading brace (a name is typed at a prompt, not pasted JSON).
fn sender_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,15}"
}

/// Chat text without embedded newlines (line-based input enforces this).
fn chat_text_strategy() -> impl Strategy<Value = String> {
    "[^\n]{0,120}"
}

fn control_frame_strategy() -> impl Strategy<Value = ControlFrame> {
    prop_oneof![
        (any::<String>(), any::<u64>())
            .prop_map(|(name, size)| ControlFrame::FileStart { name, size }),
        proptest::collection::vec(any::<u8>(), 0..256)
            .prop_map(|data| ControlFrame::chunk(&data)),
        Just(ControlFrame::FileEnd),
    ]
}

proptest! {
    #[test]
    fn chat_round_trip(sender in sender_strategy(), text in chat_text_strategy()) {
        let mut decoder = StreamDecoder::new();
        decoder.feed(&encode_chat(&sender, &text));

        let lines = drain(&mut decoder);
        prop_assert_eq!(lines, vec![DecodedLine::Chat(format!("{sender}: {text}"))]);
    }

    #[test]
    fn control_round_trip(frame in control_frame_strategy()) {
        let mut decoder = StreamDecoder::new();
        decoder.feed(&frame.encode().unwrap());

        let lines = drain(&mut decoder);
        prop_assert_eq!(lines, vec![DecodedLine::Control(frame)]);
    }

    #[test]
    fn file_start_fields_survive(name in any::<String>(), size in any::<u64>()) {
        let frame = ControlFrame::FileStart { name: name.clone(), size };
        let mut decoder = StreamDecoder::new();
        decoder.feed(&frame.encode().unwrap());

        match drain(&mut decoder).as_slice() {
            [DecodedLine::Control(ControlFrame::FileStart { name: n, size: s })] => {
                prop_assert_eq!(n, &name);
                prop_assert_eq!(*s, size);
            }
            other => prop_assert!(false, "expected one FileStart, got {other:?}"),
        }
    }

    /// Control-frame streams decode identically no matter where the
    /// transport splits them: byte-at-a-time equals all-at-once.
    #[test]
    fn control_stream_boundary_independence(
        frames in proptest::collection::vec(control_frame_strategy(), 1..8),
        step in 1usize..16,
    ) {
        let mut stream = Vec::new();
        for frame in &frames {
            stream.extend_from_slice(&frame.encode().unwrap());
        }

        let expected: Vec<DecodedLine> =
            frames.iter().cloned().map(DecodedLine::Control).collect();

        prop_assert_eq!(&decode_in_steps(&stream, stream.len().max(1)), &expected);
        prop_assert_eq!(&decode_in_steps(&stream, step), &expected);
        prop_assert_eq!(&decode_in_steps(&stream, 1), &expected);
    }

    /// A single chat line appended after control frames is also immune to
    /// read-boundary placement.
    #[test]
    fn trailing_chat_boundary_independence(
        frames in proptest::collection::vec(control_frame_strategy(), 0..4),
        sender in sender_strategy(),
        text in chat_text_strategy(),
        step in 1usize..16,
    ) {
        let mut stream = Vec::new();
        for frame in &frames {
            stream.extend_from_slice(&frame.encode().unwrap());
        }
        stream.extend_from_slice(&encode_chat(&sender, &text));

        let mut expected: Vec<DecodedLine> =
            frames.iter().cloned().map(DecodedLine::Control).collect();
        expected.push(DecodedLine::Chat(format!("{sender}: {text}")));

        prop_assert_eq!(&decode_in_steps(&stream, stream.len()), &expected);
        prop_assert_eq!(&decode_in_steps(&stream, step), &expected);
    }

    /// Base64 payloads round-trip through a decoded frame byte-for-byte.
    #[test]
    fn chunk_payload_round_trip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let frame = ControlFrame::chunk(&data);
        let mut decoder = StreamDecoder::new();
        decoder.feed(&frame.encode().unwrap());

        match drain(&mut decoder).as_slice() {
            [DecodedLine::Control(ControlFrame::FileChunk { data: b64 })] => {
                prop_assert_eq!(ControlFrame::decode_chunk_payload(b64).unwrap(), data);
            }
            other => prop_assert!(false, "expected one FileChunk, got {other:?}"),
        }
    }
}

#[test]
fn malformed_json_is_chat_not_error() {
    let mut decoder = StreamDecoder::new();
    decoder.feed(b"{not valid json\n");

    assert_eq!(drain(&mut decoder), vec![DecodedLine::Chat("{not valid json".into())]);
}

#[test]
fn brace_wrapped_garbage_is_chat() {
    let mut decoder = StreamDecoder::new();
    decoder.feed(b"{this looks like json but is not}\n");

    assert_eq!(
        drain(&mut decoder),
        vec![DecodedLine::Chat("{this looks like json but is not}".into())]
    );
}
