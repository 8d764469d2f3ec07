use clap::{Parser, Subcommand};
use parking_lot::RwLock;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use super::types::LogLevel;
use crate::wire::PacketSize;

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static CLI_CONFIG: OnceLock<Arc<RwLock<CliConfig>>> = OnceLock::new();

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CliConfig {
    pub config_file_location: Option<PathBuf>,
    pub packet_size: Option<PacketSize>,
    pub log_level: LogLevel,
    pub command: Command,
}

impl CliConfig {
    pub fn init() {
        CLI_CONFIG.get_or_init(|| {
            let cfg = Self::from_args();
            cfg.validate();
            Arc::new(RwLock::new(cfg))
        });
    }

    pub fn snapshot() -> CliConfig {
        handle().read().clone()
    }
}

// -----------------------------------------------------------------------------
// ----- CliConfig: Private ----------------------------------------------------

impl CliConfig {
    fn from_args() -> Self {
        // --help and --version exit here too
        let args = Args::try_parse().unwrap_or_else(|e| e.exit());
        Self::from_parsed(args)
    }

    fn from_parsed(args: Args) -> Self {
        let packet_size = args.packet_size.map(|size| {
            PacketSize::new(size).unwrap_or_else(|e| panic!("Invalid CLI/ENV: {e}"))
        });

        Self {
            config_file_location: args.config_file,
            packet_size,
            log_level: args.log_level,
            command: args.command,
        }
    }

    fn validate(&self) {
        if let Some(path) = &self.config_file_location {
            must_exist_file(path, "--config / CHUNKPIPE_CONFIG_FILE");
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Command ---------------------------------------------------------------

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run a listener and a connector in one process and exchange one message.
    Demo {
        #[arg(long, default_value_t = 1234)]
        listen_port: u16,

        #[arg(long, default_value_t = 4321)]
        connect_port: u16,
    },

    /// Accept one peer and echo its messages until it hangs up.
    Listen {
        #[arg(long, short = 'p')]
        port: u16,
    },

    /// Connect to a listener, send each MESSAGE and print the replies.
    Connect {
        /// Local port to bind before connecting (0 lets the OS pick).
        #[arg(long, short = 'p', default_value_t = 0)]
        port: u16,

        #[arg(long = "host", short = 'H', default_value = "localhost")]
        host: String,

        #[arg(long)]
        remote_port: u16,

        messages: Vec<String>,
    },
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "chunkpipe", version, about = "Point-to-point packet transport")]
struct Args {
    // Optional TOML file with an [endpoint] table.
    #[arg(long = "config", env = "CHUNKPIPE_CONFIG_FILE", global = true)]
    config_file: Option<PathBuf>,

    // Overrides endpoint.packet_size from the config file.
    #[arg(
        long = "packet-size",
        env = "CHUNKPIPE_PACKET_SIZE",
        global = true,
        value_parser = clap::value_parser!(u8).range(1..)
    )]
    packet_size: Option<u8>,

    // Not required via CLI or ENV (defaults to info).
    #[arg(long = "log", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

// -----------------------------------------------------------------------------
// ----- Private Utils ---------------------------------------------------------

fn handle() -> Arc<RwLock<CliConfig>> {
    CLI_CONFIG
        .get()
        .expect("config not initialized; call Config::init().await first")
        .clone()
}

fn must_exist_file(path: &Path, hint: &str) {
    let md = fs::metadata(path).unwrap_or_else(|_| {
        panic!("required file missing: {} (from {hint})", path.display());
    });

    if !md.is_file() {
        panic!("path is not a file: {} (from {hint})", path.display());
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
