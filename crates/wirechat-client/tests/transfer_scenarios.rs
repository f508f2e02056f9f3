//! End-to-end transfer scenarios: a sender's frame stream driven through a
//! receiving session must reproduce the original bytes exactly.

use std::path::Path;

use proptest::prelude::*;
use wirechat_client::{
    FileError, Session, SessionAction, SessionEvent, SessionState, Transfers, probe_file,
    spawn_file_reader,
};
use wirechat_proto::{ControlFrame, StreamDecoder};

/// Produce the full wire byte stream for sending `data` as `name` in
/// `chunk_size` pieces, using the outbound planner.
fn encode_transfer(name: &str, data: &[u8], chunk_size: usize) -> Vec<u8> {
    let mut transfers = Transfers::new();
    let mut stream = Vec::new();

    let start = transfers.begin_outbound(name, data.len() as u64).unwrap();
    stream.extend_from_slice(&start.encode().unwrap());

    for piece in data.chunks(chunk_size.max(1)) {
        let (frame, _) = transfers.outbound_chunk(piece).unwrap();
        stream.extend_from_slice(&frame.encode().unwrap());
    }

    let (end, _) = transfers.finish_outbound().unwrap();
    stream.extend_from_slice(&end.encode().unwrap());
    stream
}

/// Drive a receiving session over a wire stream fed in `step`-byte reads,
/// accepting the offer and choosing the default save path. Returns the
/// saved bytes.
fn receive_transfer(stream: &[u8], step: usize) -> Vec<u8> {
    let mut session = Session::new("receiver");
    session.handle(SessionEvent::Connected);
    assert_eq!(session.state(), SessionState::Connected);

    let mut decoder = StreamDecoder::new();
    let mut saved = None;

    for piece in stream.chunks(step.max(1)) {
        decoder.feed(piece);
        while let Some(line) = decoder.next_line() {
            let actions = session.handle(SessionEvent::LineReceived(line.unwrap()));
            for action in actions {
                match action {
                    SessionAction::AskAcceptFile { .. } => {
                        session.handle(SessionEvent::FileAcceptDecision(true));
                    },
                    SessionAction::AskSavePath { default, .. } => {
                        let follow_up = session.handle(SessionEvent::SavePathDecision(default));
                        for save in follow_up {
                            if let SessionAction::SaveFile { data, .. } = save {
                                assert!(saved.is_none(), "transfer saved twice");
                                saved = Some(data);
                            }
                        }
                    },
                    _ => {},
                }
            }
        }
    }

    saved.unwrap_or_else(|| panic!("transfer never completed"))
}

#[test]
fn twenty_kilobyte_file_splits_into_three_chunks() {
    let data = vec![0xA5u8; 20000];
    let mut transfers = Transfers::new();

    transfers.begin_outbound("report.pdf", data.len() as u64).unwrap();

    let mut chunk_sizes = Vec::new();
    for piece in data.chunks(8192) {
        let (frame, _) = transfers.outbound_chunk(piece).unwrap();
        let ControlFrame::FileChunk { data } = frame else {
            unreachable!("outbound_chunk builds FileChunk");
        };
        chunk_sizes.push(ControlFrame::decode_chunk_payload(&data).unwrap().len());
    }

    assert_eq!(chunk_sizes, vec![8192, 8192, 3616]);
    assert_eq!(transfers.finish_outbound().unwrap().0, ControlFrame::FileEnd);
}

#[test]
fn small_file_round_trips_through_a_session() {
    let data = b"hello over the wire".to_vec();
    let stream = encode_transfer("hello.txt", &data, 8);

    assert_eq!(receive_transfer(&stream, stream.len()), data);
}

#[test]
fn empty_file_round_trips() {
    let stream = encode_transfer("empty.bin", &[], 8192);
    assert_eq!(receive_transfer(&stream, stream.len()), Vec::<u8>::new());
}

#[tokio::test]
async fn file_reader_streams_full_chunks_then_drains() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blob.bin");
    let data: Vec<u8> = (0..20000u32).map(|i| i as u8).collect();
    tokio::fs::write(&path, &data).await.unwrap();

    let (name, size) = probe_file(&path).await.unwrap();
    assert_eq!(name, "blob.bin");
    assert_eq!(size, 20000);

    let (tx, mut rx) = tokio::sync::mpsc::channel(64);
    spawn_file_reader(path, 8192, tx);

    let mut received = Vec::new();
    let mut chunk_sizes = Vec::new();
    let mut drained = false;
    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::OutboundChunkRead(chunk) => {
                chunk_sizes.push(chunk.len());
                received.extend_from_slice(&chunk);
            },
            SessionEvent::OutboundFileDrained => drained = true,
            other => panic!("unexpected event from file reader: {other:?}"),
        }
    }

    assert!(drained);
    assert_eq!(chunk_sizes, vec![8192, 8192, 3616]);
    assert_eq!(received, data);
}

#[tokio::test]
async fn probing_a_missing_file_reports_not_found() {
    let err = probe_file(Path::new("/definitely/not/here.bin")).await.unwrap_err();
    assert!(matches!(err, FileError::NotFound { .. }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Chunked send then reassembly yields exactly the original bytes in
    /// order, for any payload, chunk size, and read-boundary placement.
    #[test]
    fn transfer_completeness(
        data in proptest::collection::vec(any::<u8>(), 0..4096),
        chunk_size in 1usize..4096,
        step in 1usize..1024,
    ) {
        let stream = encode_transfer("blob.bin", &data, chunk_size);

        prop_assert_eq!(&receive_transfer(&stream, stream.len()), &data);
        prop_assert_eq!(&receive_transfer(&stream, step), &data);
    }

    /// The planner emits ceil(N / C) chunk frames, all full-sized except
    /// the last.
    #[test]
    fn chunk_count_matches_ceiling_division(
        len in 1usize..40000,
        chunk_size in 1usize..9000,
    ) {
        let data = vec![0u8; len];
        let mut transfers = Transfers::new();
        transfers.begin_outbound("blob.bin", len as u64).unwrap();

        let mut count = 0usize;
        for piece in data.chunks(chunk_size) {
            transfers.outbound_chunk(piece).unwrap();
            count += 1;
        }

        prop_assert_eq!(count, len.div_ceil(chunk_size));
        prop_assert_eq!(transfers.outbound().unwrap().bytes_sent(), len as u64);
    }
}
