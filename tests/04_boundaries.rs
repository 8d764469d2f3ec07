//! Wire-level checks against a raw TCP peer.

mod support;

use std::time::Duration;

use chunkpipe::{ConnectionEndpoint, EndpointConfig, TransportError};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

/// An endpoint with the given packet size that has accepted a raw peer.
async fn accepted(size: u8) -> (ConnectionEndpoint, TcpStream) {
    let config = EndpointConfig::default()
        .with_packet_size(support::packet_size(size))
        .with_io_timeout(Duration::from_secs(5));
    let mut ep = ConnectionEndpoint::with_config(config);
    let port = ep.bind(0).await.unwrap().port();

    let (accepted, raw) = tokio::join!(ep.accept(), support::connect_raw(port));
    accepted.unwrap();
    (ep, raw)
}

async fn read_exact(raw: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0; n];
    raw.read_exact(&mut buf).await.unwrap();
    buf
}

#[tokio::test]
async fn empty_message_is_one_zero_packet() {
    let (mut ep, mut raw) = accepted(8).await;

    ep.send(b"").await.unwrap();
    ep.close().await.unwrap();

    let mut wire = Vec::new();
    raw.read_to_end(&mut wire).await.unwrap();
    assert_eq!(wire, vec![0; 8]);
}

#[tokio::test]
async fn full_stride_is_followed_by_empty_terminator() {
    let (mut ep, mut raw) = accepted(8).await;

    ep.send(b"1234567").await.unwrap();
    ep.close().await.unwrap();

    let mut wire = Vec::new();
    raw.read_to_end(&mut wire).await.unwrap();
    assert_eq!(wire.len(), 16);
    assert_eq!(&wire[..8], b"\x071234567");
    assert_eq!(&wire[8..], &[0; 8]);
}

#[tokio::test]
async fn packets_are_zero_padded() {
    let (mut ep, mut raw) = accepted(8).await;

    ep.send(b"hi").await.unwrap();
    assert_eq!(read_exact(&mut raw, 8).await, b"\x02hi\0\0\0\0\0");
}

#[tokio::test]
async fn trickled_packet_is_reassembled() {
    let (mut ep, mut raw) = accepted(6).await;

    let wire = b"\x05hello\x03abc\0\0";
    let trickle = tokio::spawn(async move {
        for byte in wire {
            raw.write_all(&[*byte]).await.unwrap();
            raw.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        raw
    });

    assert_eq!(&ep.recv().await.unwrap()[..], b"helloabc");
    drop(trickle.await.unwrap());
}

#[tokio::test]
async fn close_mid_packet_is_invalid_length() {
    let (mut ep, mut raw) = accepted(8).await;

    raw.write_all(b"\x07abc").await.unwrap();
    raw.shutdown().await.unwrap();

    let err = ep.recv().await.unwrap_err();
    assert!(matches!(
        err,
        TransportError::InvalidPacketLength {
            expected: 8,
            received: 4
        }
    ));
    assert!(!err.is_peer_closed());
}

#[tokio::test]
async fn oversized_length_byte_is_rejected() {
    let (mut ep, mut raw) = accepted(4).await;

    raw.write_all(&[9, 0, 0, 0]).await.unwrap();

    let err = ep.recv().await.unwrap_err();
    assert!(matches!(
        err,
        TransportError::InvalidPayloadLength { count: 9, max: 3 }
    ));
}

#[tokio::test]
async fn reply_from_raw_peer() {
    let (mut ep, mut raw) = accepted(4).await;

    ep.send(b"abcdef").await.unwrap();
    let wire = read_exact(&mut raw, 12).await;
    assert_eq!(wire, b"\x03abc\x03def\0\0\0\0");

    raw.write_all(&wire).await.unwrap();
    assert_eq!(&ep.recv().await.unwrap()[..], b"abcdef");
}

#[tokio::test]
async fn next_message_is_clean_after_bad_packet() {
    let (mut ep, mut raw) = accepted(4).await;

    raw.write_all(b"\x03old").await.unwrap();
    raw.write_all(&[9, 0, 0, 0]).await.unwrap();
    raw.write_all(b"\x02ok\0").await.unwrap();

    assert!(matches!(
        ep.recv().await,
        Err(TransportError::InvalidPayloadLength { count: 9, max: 3 })
    ));
    assert_eq!(&ep.recv().await.unwrap()[..], b"ok");
}
