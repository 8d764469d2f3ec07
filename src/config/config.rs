use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};

use super::{
    cli::{CliConfig, Command},
    endpoint::EndpointConfig,
    types::LogLevel,
};

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static ROOT_CONFIG: OnceLock<Arc<RwLock<Config>>> = OnceLock::new();

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub log_level: LogLevel,
    pub command: Command,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    /// Async because the config file is read with non-blocking IO.
    pub async fn init() {
        CliConfig::init();

        Self::load().await;
    }

    pub fn snapshot() -> Config {
        Self::handle().read().clone()
    }

    /// Merge CLI arguments over the file config. The CLI packet size wins.
    pub fn compose(cli: CliConfig, file: EndpointConfig) -> Config {
        let endpoint = match cli.packet_size {
            Some(size) => file.with_packet_size(size),
            None => file,
        };

        Config {
            endpoint,
            log_level: cli.log_level,
            command: cli.command,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Config: Private -------------------------------------------------------

impl Config {
    async fn load() {
        let cli = CliConfig::snapshot();

        let file = match &cli.config_file_location {
            Some(path) => EndpointConfig::from_file(path)
                .await
                .unwrap_or_else(|e| panic!("invalid config {}: {e}", path.display())),
            None => EndpointConfig::default(),
        };

        let next = Self::compose(cli, file);

        if let Some(handle) = ROOT_CONFIG.get() {
            *handle.write() = next;
        } else {
            let _ = ROOT_CONFIG.set(Arc::new(RwLock::new(next)));
        }
    }

    fn handle() -> Arc<RwLock<Config>> {
        ROOT_CONFIG
            .get()
            .expect("Config not initialized; call Config::init().await first")
            .clone()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
