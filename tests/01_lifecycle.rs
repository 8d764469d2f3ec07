mod support;

use std::time::Duration;

use chunkpipe::{
    AcceptPolicy, ConnectionEndpoint, EndpointConfig, EndpointState, TransportError,
};

#[tokio::test]
async fn send_and_recv_need_a_connection() {
    let mut ep = ConnectionEndpoint::default();
    assert!(matches!(ep.send(b"x").await, Err(TransportError::NotConnected)));
    assert!(matches!(ep.recv().await, Err(TransportError::NotConnected)));

    ep.bind(0).await.unwrap();
    assert!(matches!(ep.send(b"x").await, Err(TransportError::NotConnected)));
    assert!(matches!(ep.recv().await, Err(TransportError::NotConnected)));
    assert!(matches!(ep.split(), Err(TransportError::NotConnected)));
}

#[tokio::test]
async fn bind_twice_keeps_first_address() {
    let mut ep = ConnectionEndpoint::default();
    let first = ep.bind(0).await.unwrap();

    let err = ep.bind(0).await.unwrap_err();
    assert!(matches!(err, TransportError::AlreadyBound));
    assert!(err.is_lifecycle());
    assert_eq!(ep.local_addr(), Some(first));
}

#[tokio::test]
async fn establishment_needs_a_bound_socket() {
    let mut ep = ConnectionEndpoint::default();
    assert!(matches!(ep.accept().await, Err(TransportError::NotBound)));
    assert!(matches!(
        ep.connect("127.0.0.1", 1).await,
        Err(TransportError::NotBound)
    ));
    assert_eq!(ep.state(), EndpointState::Unbound);
}

#[tokio::test]
async fn establishment_refused_once_connected() {
    let (mut a, mut b) = support::connected_pair(EndpointConfig::default()).await;

    assert!(matches!(a.accept().await, Err(TransportError::AlreadyConnected)));
    assert!(matches!(
        b.connect("127.0.0.1", 1).await,
        Err(TransportError::AlreadyConnected)
    ));

    // still usable
    a.send(b"still here").await.unwrap();
    assert_eq!(&b.recv().await.unwrap()[..], b"still here");
}

#[tokio::test]
async fn connect_to_nobody_exhausts_candidates() {
    let port = support::reserve_port("127.0.0.1");

    let mut ep = ConnectionEndpoint::default();
    ep.bind(0).await.unwrap();

    let err = ep.connect("127.0.0.1", port).await.unwrap_err();
    assert!(matches!(
        err,
        TransportError::NoConnectableAddress { port: p, .. } if p == port
    ));

    // a failed connect leaves the endpoint bound and retryable
    assert_eq!(ep.state(), EndpointState::Bound);
}

#[tokio::test]
async fn unresolvable_host_fails_resolution() {
    let mut ep = ConnectionEndpoint::default();
    ep.bind(0).await.unwrap();

    let err = ep.connect("no such host.invalid", 80).await.unwrap_err();
    assert!(matches!(err, TransportError::ResolutionFailed { .. }));
}

#[tokio::test]
async fn accept_timeout_leaves_endpoint_listening() {
    let policy = AcceptPolicy::default().with_timeout(Duration::from_millis(50));
    let mut a = ConnectionEndpoint::with_config(EndpointConfig::default().with_accept(policy));
    let port = a.bind(0).await.unwrap().port();

    let err = a.accept().await.unwrap_err();
    assert!(matches!(err, TransportError::AcceptTimedOut(_)));
    assert_eq!(a.state(), EndpointState::Listening);

    // a peer can still arrive on the same listener
    let mut b = ConnectionEndpoint::default();
    b.bind(0).await.unwrap();
    let (accepted, connected) = tokio::join!(a.accept(), b.connect("127.0.0.1", port));
    accepted.unwrap();
    connected.unwrap();
    assert_eq!(a.state(), EndpointState::Connected);
}

#[tokio::test]
async fn dropped_accept_can_be_resumed() {
    let mut a = ConnectionEndpoint::default();
    let port = a.bind(0).await.unwrap().port();

    let waited = tokio::time::timeout(Duration::from_millis(30), a.accept()).await;
    assert!(waited.is_err());
    assert_eq!(a.state(), EndpointState::Listening);

    let peer = support::connect_raw(port).await;
    let addr = a.accept().await.unwrap();
    assert_eq!(addr, peer.local_addr().unwrap());
}

#[tokio::test]
async fn close_is_seen_as_peer_closed() {
    let (a, mut b) = support::connected_pair(EndpointConfig::default()).await;

    a.close().await.unwrap();
    let err = b.recv().await.unwrap_err();
    assert!(err.is_peer_closed());
}

#[tokio::test]
async fn addresses_reported_after_connect() {
    let (a, b) = support::connected_pair(EndpointConfig::default()).await;

    let a_local = a.local_addr().unwrap();
    assert_eq!(b.peer_addr().unwrap().port(), a_local.port());
    assert!(a.peer_addr().unwrap().ip().is_loopback());
}

#[tokio::test]
async fn listening_endpoint_cannot_connect() {
    let policy = AcceptPolicy::default().with_timeout(Duration::from_millis(20));
    let mut a = ConnectionEndpoint::with_config(EndpointConfig::default().with_accept(policy));
    let port = a.bind(0).await.unwrap().port();
    assert!(matches!(a.accept().await, Err(TransportError::AcceptTimedOut(_))));

    let mut b = ConnectionEndpoint::default();
    let b_port = b.bind(0).await.unwrap().port();

    let err = a.connect("127.0.0.1", b_port).await.unwrap_err();
    assert!(matches!(err, TransportError::AlreadyListening));
    assert_eq!(a.state(), EndpointState::Listening);

    // the listener still takes its single peer
    let (accepted, connected) = tokio::join!(a.accept(), b.connect("127.0.0.1", port));
    accepted.unwrap();
    connected.unwrap();
}

#[tokio::test]
async fn occupied_port_has_no_bindable_address() {
    let held = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = held.local_addr().unwrap().port();

    let mut ep = ConnectionEndpoint::default();
    let err = ep.bind(port).await.unwrap_err();

    assert!(matches!(err, TransportError::NoBindableAddress { port: p } if p == port));
    assert_eq!(ep.state(), EndpointState::Unbound);

    // nothing half-bound is left behind; a free port still works
    ep.bind(0).await.unwrap();
}
