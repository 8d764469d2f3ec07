use std::{net::TcpListener, process::Command, time::Duration};

use chunkpipe::{ConnectionEndpoint, EndpointConfig, PacketSize};
use rand::{Rng, RngCore};

// Every test binary compiles this module; not all of them use every helper.

#[allow(dead_code)]
pub fn packet_size(n: u8) -> PacketSize {
    PacketSize::new(n).expect("valid packet size")
}

/// Two endpoints connected over loopback: `(accepting, connecting)`.
#[allow(dead_code)]
pub async fn connected_pair(config: EndpointConfig) -> (ConnectionEndpoint, ConnectionEndpoint) {
    let mut a = ConnectionEndpoint::with_config(config.clone());
    let mut b = ConnectionEndpoint::with_config(config);

    let port = a.bind(0).await.expect("bind a").port();
    b.bind(0).await.expect("bind b");

    // accept is polled first, so it is listening before connect starts
    let (accepted, connected) = tokio::join!(a.accept(), b.connect("127.0.0.1", port));
    accepted.expect("accept");
    connected.expect("connect");

    (a, b)
}

/// A bound endpoint already listening is not observable from outside, so
/// raw peers connect with a short retry loop instead.
#[allow(dead_code)]
pub async fn connect_raw(port: u16) -> tokio::net::TcpStream {
    for _ in 0..50 {
        if let Ok(stream) = tokio::net::TcpStream::connect(("127.0.0.1", port)).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("nothing listening on 127.0.0.1:{port}");
}

#[allow(dead_code)]
pub fn random_message(max_len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let len = rng.random_range(0..=max_len);
    let mut message = vec![0u8; len];
    rng.fill_bytes(&mut message);
    message
}

#[allow(dead_code)]
pub fn reserve_port(host: &str) -> u16 {
    let addr = format!("{host}:0");
    let listener = TcpListener::bind(&addr).expect("bind ephemeral port");
    listener.local_addr().unwrap().port()
}

#[allow(dead_code)]
pub fn chunkpipe() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_chunkpipe"));
    cmd.env_remove("CHUNKPIPE_CONFIG_FILE")
        .env_remove("CHUNKPIPE_PACKET_SIZE");
    cmd
}

/// Open file descriptors of this process (Linux only).
#[allow(dead_code)]
pub fn open_fds() -> usize {
    std::fs::read_dir("/proc/self/fd")
        .expect("read /proc/self/fd")
        .count()
}
