//! Unit tests for the worker stream codec.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use worker_bridge::worker::codec::{Frame, WorkerCodec};
use worker_bridge::AppError;

#[test]
fn decodes_batched_lines_one_per_call() {
    let mut codec = WorkerCodec::default();
    let mut buf = BytesMut::from("first\nsecond\n");

    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(Frame::Line("first".to_owned()))
    );
    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(Frame::Line("second".to_owned()))
    );
    assert_eq!(codec.decode(&mut buf).expect("decode"), None);
}

#[test]
fn partial_line_is_buffered_until_newline() {
    let mut codec = WorkerCodec::default();

    let mut buf = BytesMut::from("{\"action\":");
    assert_eq!(codec.decode(&mut buf).expect("decode"), None);

    buf.extend_from_slice(b"\"x\"}\n");
    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(Frame::Line("{\"action\":\"x\"}".to_owned()))
    );
}

/// A multi-byte character split across two reads is reassembled.
#[test]
fn utf8_sequence_split_across_reads() {
    let mut codec = WorkerCodec::default();
    let bytes = "héllo\n".as_bytes();

    let mut buf = BytesMut::from(&bytes[..2]);
    assert_eq!(codec.decode(&mut buf).expect("decode"), None);

    buf.extend_from_slice(&bytes[2..]);
    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(Frame::Line("héllo".to_owned()))
    );
}

#[test]
fn oversized_line_is_reported_and_stream_continues() {
    let mut codec = WorkerCodec::new(8);
    let mut buf = BytesMut::from("0123456789abcdef\nok\n");

    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(Frame::Oversized(16))
    );
    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(Frame::Line("ok".to_owned()))
    );
}

#[test]
fn unterminated_tail_over_limit_is_dropped() {
    let mut codec = WorkerCodec::new(4);
    let mut buf = BytesMut::from("abcdefgh");

    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(Frame::Oversized(8))
    );

    buf.extend_from_slice(b"\nnext\n");
    // The remainder of the dropped line, newline included, is discarded.
    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(Frame::Line("next".to_owned()))
    );
    assert_eq!(codec.decode(&mut buf).expect("decode"), None);
}

#[test]
fn remainder_of_dropped_line_is_never_emitted() {
    let mut codec = WorkerCodec::new(4);
    let mut buf = BytesMut::from("abcdefgh");

    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(Frame::Oversized(8))
    );

    // More of the same line without a newline stays discarded.
    buf.extend_from_slice(b"more");
    assert_eq!(codec.decode(&mut buf).expect("decode"), None);

    buf.extend_from_slice(b"ij\nok\n");
    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(Frame::Line("ok".to_owned()))
    );
    assert_eq!(codec.decode(&mut buf).expect("decode"), None);
}

#[test]
fn complete_lines_precede_oversized_marker() {
    let mut codec = WorkerCodec::new(4);
    let mut buf = BytesMut::from("ab\ncd\nefghijk");

    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(Frame::Line("ab".to_owned()))
    );
    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(Frame::Line("cd".to_owned()))
    );
    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(Frame::Oversized(7))
    );
    assert_eq!(codec.decode(&mut buf).expect("decode"), None);
}

#[test]
fn eof_drops_unterminated_tail() {
    let mut codec = WorkerCodec::default();
    let mut buf = BytesMut::from("done\nhalf");

    assert_eq!(
        codec.decode_eof(&mut buf).expect("decode"),
        Some(Frame::Line("done".to_owned()))
    );
    assert_eq!(codec.decode_eof(&mut buf).expect("decode"), None);
}

#[test]
fn encoder_appends_newline() {
    let mut codec = WorkerCodec::default();
    let mut dst = BytesMut::new();

    codec
        .encode("processTextInput:hi".to_owned(), &mut dst)
        .expect("encode");
    assert_eq!(&dst[..], b"processTextInput:hi\n");
}

#[test]
fn encoder_rejects_embedded_newline() {
    let mut codec = WorkerCodec::default();
    let mut dst = BytesMut::new();

    let result = codec.encode("a\nb".to_owned(), &mut dst);
    assert!(matches!(result, Err(AppError::Protocol(_))));
    assert!(dst.is_empty());
}
