//! Configuration: per-endpoint settings (library) plus the process-wide
//! CLI/file snapshot used by the `chunkpipe` binary.

pub mod cli;
#[allow(clippy::module_inception)]
pub mod config;
pub mod endpoint;
pub mod types;

pub use cli::{CliConfig, Command};
pub use config::Config;
pub use endpoint::{AcceptPolicy, ConfigError, EndpointConfig};
pub use types::LogLevel;
