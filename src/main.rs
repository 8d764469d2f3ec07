use std::{process::ExitCode, time::Duration};

use thiserror::Error;
use tokio::{signal, task::JoinError};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use chunkpipe::{
    Config, ConnectionEndpoint, EndpointConfig, Result, TransportError, config::Command,
};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "chunkpipe";

/// Bytes exchanged by the demo: 0, 1, ..., 47.
const DEMO_MESSAGE_LEN: u8 = 48;

const DEMO_CONNECT_ATTEMPTS: u32 = 50;
const DEMO_CONNECT_PAUSE: Duration = Duration::from_millis(20);

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("demo task failed: {0}")]
    Join(#[from] JoinError),

    #[error("demo reply has {got} bytes, expected {expected}")]
    ReplyLength { got: usize, expected: usize },

    #[error("demo reply mismatch at byte {index}: got {got}, expected {expected}")]
    Mismatch { index: usize, got: u8, expected: u8 },
}

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    setup().await;

    let config = Config::snapshot();

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("{} shutting down", APP_NAME);
            ExitCode::SUCCESS
        }

        res = run(config) => match res {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{} failed: {e}", APP_NAME);
                ExitCode::FAILURE
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

async fn setup() {
    // This has to be the first thing we do, because it initializes the config
    Config::init().await;

    init_tracing();
}

fn init_tracing() {
    let config = Config::snapshot();
    let filter = EnvFilter::try_new(config.log_level.as_str()).unwrap_or_default();
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run(config: Config) -> Result<(), AppError> {
    let endpoint = config.endpoint;

    match config.command {
        Command::Demo {
            listen_port,
            connect_port,
        } => demo(endpoint, listen_port, connect_port).await,

        Command::Listen { port } => Ok(echo(endpoint, port).await?),

        Command::Connect {
            port,
            host,
            remote_port,
            messages,
        } => Ok(send_all(endpoint, port, &host, remote_port, &messages).await?),
    }
}

// -----------------------------------------------------------------------------
// ----- Commands --------------------------------------------------------------

/// One listener and one connector in the same process. The listener sends
/// 0..48, the connector doubles every byte and sends it back.
async fn demo(
    config: EndpointConfig,
    listen_port: u16,
    connect_port: u16,
) -> Result<(), AppError> {
    let listener = tokio::spawn(demo_listener(config.clone(), listen_port));
    let connector = tokio::spawn(demo_connector(config, connect_port, listen_port));

    let (listened, connected) = tokio::join!(listener, connector);
    connected??;
    listened??;

    info!("demo exchange succeeded");
    Ok(())
}

async fn demo_listener(config: EndpointConfig, port: u16) -> Result<(), AppError> {
    let mut a = ConnectionEndpoint::with_config(config);
    a.bind(port).await?;
    a.accept().await?;

    let message: Vec<u8> = (0..DEMO_MESSAGE_LEN).collect();
    a.send(&message).await?;

    let reply = a.recv().await?;
    if reply.len() != message.len() {
        return Err(AppError::ReplyLength {
            got: reply.len(),
            expected: message.len(),
        });
    }
    for (index, (&sent, &got)) in message.iter().zip(reply.iter()).enumerate() {
        let expected = sent.wrapping_mul(2);
        if got != expected {
            return Err(AppError::Mismatch {
                index,
                got,
                expected,
            });
        }
    }

    info!(bytes = reply.len(), "listener got doubled reply");
    Ok(())
}

async fn demo_connector(config: EndpointConfig, port: u16, remote_port: u16) -> Result<()> {
    let mut b = ConnectionEndpoint::with_config(config);
    b.bind(port).await?;

    // the listener task may not be listening yet
    let mut attempts = 0;
    loop {
        attempts += 1;
        match b.connect("localhost", remote_port).await {
            Ok(_) => break,
            Err(e @ TransportError::NoConnectableAddress { .. })
                if attempts < DEMO_CONNECT_ATTEMPTS =>
            {
                warn!(attempts, error = %e, "listener not ready");
                tokio::time::sleep(DEMO_CONNECT_PAUSE).await;
            }
            Err(e) => return Err(e),
        }
    }

    let message = b.recv().await?;
    let doubled: Vec<u8> = message.iter().map(|b| b.wrapping_mul(2)).collect();
    b.send(&doubled).await?;

    info!(bytes = message.len(), "connector echoed doubled message");
    Ok(())
}

/// Accept one peer and echo every message back until it closes.
async fn echo(config: EndpointConfig, port: u16) -> Result<()> {
    let mut endpoint = ConnectionEndpoint::with_config(config);
    endpoint.bind(port).await?;

    let peer = endpoint.accept().await?;
    info!(%peer, "{} echoing", APP_NAME);

    loop {
        let message = match endpoint.recv().await {
            Ok(m) => m,
            Err(e) if e.is_peer_closed() => {
                info!(%peer, "peer closed");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        endpoint.send(&message).await?;
    }
}

/// Send each message and print the reply.
async fn send_all(
    config: EndpointConfig,
    port: u16,
    host: &str,
    remote_port: u16,
    messages: &[String],
) -> Result<()> {
    let mut endpoint = ConnectionEndpoint::with_config(config);
    endpoint.bind(port).await?;
    endpoint.connect(host, remote_port).await?;

    for message in messages {
        endpoint.send(message.as_bytes()).await?;
        let reply = endpoint.recv().await?;
        println!("{}", String::from_utf8_lossy(&reply));
    }

    endpoint.close().await
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
