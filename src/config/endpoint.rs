use serde::{Deserialize, Deserializer};
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tokio::fs;

use crate::wire::PacketSize;

// -----------------------------------------------------------------------------
// ----- Defaults --------------------------------------------------------------

const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(1);

// -----------------------------------------------------------------------------
// ----- EndpointConfig --------------------------------------------------------

/// Per-endpoint knobs. Both ends of a connection must agree on
/// `packet_size`; everything else is local.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    pub packet_size: PacketSize,

    pub nodelay: bool,

    #[serde(deserialize_with = "de_opt_duration")]
    pub connect_timeout: Option<Duration>,

    /// Upper bound for writing or reading a single packet.
    #[serde(deserialize_with = "de_opt_duration")]
    pub io_timeout: Option<Duration>,

    pub accept: AcceptPolicy,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            packet_size: PacketSize::DEFAULT,
            nodelay: true,
            connect_timeout: None,
            io_timeout: None,
            accept: AcceptPolicy::default(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- EndpointConfig: Builder -----------------------------------------------

impl EndpointConfig {
    pub fn with_packet_size(mut self, packet_size: PacketSize) -> Self {
        self.packet_size = packet_size;
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    pub fn with_accept(mut self, accept: AcceptPolicy) -> Self {
        self.accept = accept;
        self
    }
}

// -----------------------------------------------------------------------------
// ----- EndpointConfig: Loading -----------------------------------------------

impl EndpointConfig {
    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).await.map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&raw)
    }

    /// Parse the `[endpoint]` table of a TOML document. A missing table
    /// yields the defaults.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let doc: ConfigFile = toml::from_str(raw).map_err(|e| ConfigError::Toml { source: e })?;
        doc.endpoint.validate()?;
        Ok(doc.endpoint)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.accept.validate()
    }
}

// -----------------------------------------------------------------------------
// ----- AcceptPolicy ----------------------------------------------------------

/// How `accept()` waits for its single peer.
///
/// Transient accept errors are retried with exponential backoff between
/// `initial_backoff` and `max_backoff`. `max_retries = None` retries until a
/// peer arrives; anything else that fails is surfaced immediately.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcceptPolicy {
    pub max_retries: Option<u32>,

    #[serde(deserialize_with = "de_duration")]
    pub initial_backoff: Duration,

    #[serde(deserialize_with = "de_duration")]
    pub max_backoff: Duration,

    #[serde(deserialize_with = "de_opt_duration")]
    pub timeout: Option<Duration>,
}

impl Default for AcceptPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            timeout: None,
        }
    }
}

impl AcceptPolicy {
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_backoff > self.max_backoff {
            return Err(ConfigError::InvalidField(
                "accept.initial_backoff must not exceed accept.max_backoff".into(),
            ));
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("toml parse error: {source}")]
    Toml {
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid field: {0}")]
    InvalidField(String),
}

// -----------------------------------------------------------------------------
// ----- Internal: On-disk format ----------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    endpoint: EndpointConfig,
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

/// Either a humantime string ("250ms", "2s") or integer milliseconds.
struct HumanDuration(Duration);

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        use serde::de::{Error, Unexpected, Visitor};

        struct DurationVisitor;

        impl Visitor<'_> for DurationVisitor {
            type Value = HumanDuration;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a duration such as \"250ms\" or integer milliseconds")
            }

            fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
                humantime::parse_duration(v)
                    .map(HumanDuration)
                    .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
            }

            fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(HumanDuration(Duration::from_millis(v)))
            }

            fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
                if v < 0 {
                    return Err(E::invalid_value(Unexpected::Signed(v), &self));
                }
                Ok(HumanDuration(Duration::from_millis(v as u64)))
            }
        }

        d.deserialize_any(DurationVisitor)
    }
}

fn de_duration<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    HumanDuration::deserialize(d).map(|h| h.0)
}

fn de_opt_duration<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
    Option::<HumanDuration>::deserialize(d).map(|h| h.map(|h| h.0))
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
