// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde::Deserialize;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Sample {
    n: u32,
    s: String,
}

#[tokio::test]
async fn round_trips_a_message_through_an_in_memory_pipe() {
    let msg = Sample { n: 7, s: "hello".into() };
    let mut buf = Vec::new();
    write_message(&mut buf, &msg).await.unwrap();

    let mut cursor = std::io::Cursor::new(buf);
    let decoded: Sample = read_message(&mut cursor).await.unwrap().unwrap();
    assert_eq!(decoded, msg);
}

#[tokio::test]
async fn read_on_empty_stream_returns_none() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    let decoded: Option<Sample> = read_message(&mut cursor).await.unwrap();
    assert!(decoded.is_none());
}

#[test]
fn encode_rejects_oversized_payloads() {
    let huge = Sample { n: 0, s: "x".repeat((MAX_MESSAGE_BYTES + 1) as usize) };
    let err = encode(&huge).unwrap_err();
    assert!(matches!(err, ProtocolError::TooLarge(_)));
}

#[test]
fn encode_prefixes_exact_payload_length() {
    let msg = Sample { n: 1, s: "ab".into() };
    let framed = encode(&msg).unwrap();
    let len = u32::from_be_bytes(framed[..4].try_into().unwrap());
    assert_eq!(len as usize, framed.len() - 4);
}
