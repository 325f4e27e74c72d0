//! Server configuration.
//!
//! [`ServerConfig::default()`] gives a relay on the well-known port 9999
//! speaking JSON envelopes over TCP. [`ServerConfig::from_env()`] layers
//! `CHATRELAY_*` environment variables over those defaults with `figment`.

use std::path::PathBuf;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};

/// The port chat clients expect by default.
pub const DEFAULT_PORT: u16 = 9999;

/// Which stream the relay accepts clients on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Newline-delimited records over plain TCP.
    #[default]
    Tcp,
    /// One text frame per record over WebSocket.
    #[serde(alias = "ws")]
    WebSocket,
}

/// How clients encode the envelopes they send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WireFormat {
    /// One JSON envelope per record.
    #[default]
    #[serde(rename = "json")]
    Json,
    /// The record is the message body.
    #[serde(rename = "text", alias = "plain")]
    PlainText,
}

/// Tunables as they appear in the environment, deserialized by figment.
///
/// | Variable | Key | Meaning |
/// |---|---|---|
/// | `CHATRELAY_BIND` | `bind` | full bind address, e.g. `127.0.0.1:7000` |
/// | `CHATRELAY_PORT` | `port` | port on `0.0.0.0`, used when `bind` is unset |
/// | `CHATRELAY_SHUTDOWN_SECS` | `shutdown_secs` | shutdown countdown |
/// | `CHATRELAY_IDLE_TIMEOUT_SECS` | `idle_timeout_secs` | idle timeout, `0` disables |
/// | `CHATRELAY_ACCEPT_RETRY_MS` | `accept_retry_ms` | pause after a failed accept |
/// | `CHATRELAY_TRANSPORT` | `transport` | `tcp` or `websocket` |
/// | `CHATRELAY_WIRE` | `wire` | `json` or `text` |
/// | `CHATRELAY_CHAT_LOG` | `chat_log` | chat log path |
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub bind: Option<String>,
    pub port: u16,
    pub shutdown_secs: u64,
    pub idle_timeout_secs: u64,
    pub accept_retry_ms: u64,
    pub transport: TransportKind,
    pub wire: WireFormat,
    pub chat_log: Option<PathBuf>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            bind: None,
            port: DEFAULT_PORT,
            shutdown_secs: 30,
            idle_timeout_secs: 0,
            accept_retry_ms: 100,
            transport: TransportKind::default(),
            wire: WireFormat::default(),
            chat_log: None,
        }
    }
}

/// Build a figment that layers: defaults → `CHATRELAY_*` env vars.
pub fn load_config() -> Figment {
    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Env::prefixed("CHATRELAY_"))
}

/// Configuration for a relay server (runtime view).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_addr: String,

    /// How long `ServerHandle::shutdown` counts down before closing.
    pub shutdown_countdown: Duration,

    /// Close sessions that send nothing for this long. `None` never does.
    pub idle_timeout: Option<Duration>,

    /// Pause after a failed accept before trying again.
    pub accept_retry_delay: Duration,

    /// Listener type the binary starts.
    pub transport: TransportKind,

    /// Envelope encoding the binary expects from clients.
    pub wire: WireFormat,

    /// Append-only chat log file, if any.
    pub chat_log: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_file(&FileConfig::default())
    }
}

impl ServerConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        let bind_addr = fc
            .bind
            .clone()
            .unwrap_or_else(|| format!("0.0.0.0:{}", fc.port));
        Self {
            bind_addr,
            shutdown_countdown: Duration::from_secs(fc.shutdown_secs),
            idle_timeout: (fc.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(fc.idle_timeout_secs)),
            accept_retry_delay: Duration::from_millis(fc.accept_retry_ms),
            transport: fc.transport,
            wire: fc.wire,
            chat_log: fc.chat_log.clone(),
        }
    }

    /// Extracts a config from any figment, e.g. [`load_config()`] with a
    /// TOML file merged on top.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let fc: FileConfig = figment
            .extract()
            .map_err(|e| ConfigError::Invalid(Box::new(e)))?;
        Ok(Self::from_file(&fc))
    }

    /// Defaults overridden by `CHATRELAY_*` environment variables. See
    /// [`FileConfig`] for the variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_figment(&load_config())
    }
}

/// A configuration value that could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The message names the offending key and where it came from.
    #[error("invalid configuration: {0}")]
    Invalid(Box<figment::Error>),
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn test_default_listens_on_well_known_port() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:9999");
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.shutdown_countdown, Duration::from_secs(30));
        assert_eq!(config.accept_retry_delay, Duration::from_millis(100));
        assert_eq!(config.transport, TransportKind::Tcp);
        assert_eq!(config.wire, WireFormat::Json);
    }

    #[test]
    fn test_from_env_unset_is_default() {
        Jail::expect_with(|_jail| {
            let config = ServerConfig::from_env().map_err(|e| e.to_string())?;
            assert_eq!(config.bind_addr, ServerConfig::default().bind_addr);
            assert!(config.chat_log.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_from_env_port_only() {
        Jail::expect_with(|jail| {
            jail.set_env("CHATRELAY_PORT", "7000");
            let config = ServerConfig::from_env().map_err(|e| e.to_string())?;
            assert_eq!(config.bind_addr, "0.0.0.0:7000");
            Ok(())
        });
    }

    #[test]
    fn test_from_env_bind_wins_over_port() {
        Jail::expect_with(|jail| {
            jail.set_env("CHATRELAY_BIND", "127.0.0.1:1234");
            jail.set_env("CHATRELAY_PORT", "7000");
            let config = ServerConfig::from_env().map_err(|e| e.to_string())?;
            assert_eq!(config.bind_addr, "127.0.0.1:1234");
            Ok(())
        });
    }

    #[test]
    fn test_from_env_all_fields() {
        Jail::expect_with(|jail| {
            jail.set_env("CHATRELAY_SHUTDOWN_SECS", "5");
            jail.set_env("CHATRELAY_IDLE_TIMEOUT_SECS", "300");
            jail.set_env("CHATRELAY_ACCEPT_RETRY_MS", "250");
            jail.set_env("CHATRELAY_TRANSPORT", "websocket");
            jail.set_env("CHATRELAY_WIRE", "text");
            jail.set_env("CHATRELAY_CHAT_LOG", "ChatLog.txt");
            let config = ServerConfig::from_env().map_err(|e| e.to_string())?;
            assert_eq!(config.shutdown_countdown, Duration::from_secs(5));
            assert_eq!(config.idle_timeout, Some(Duration::from_secs(300)));
            assert_eq!(config.accept_retry_delay, Duration::from_millis(250));
            assert_eq!(config.transport, TransportKind::WebSocket);
            assert_eq!(config.wire, WireFormat::PlainText);
            assert_eq!(config.chat_log, Some(PathBuf::from("ChatLog.txt")));
            Ok(())
        });
    }

    #[test]
    fn test_from_env_short_aliases() {
        Jail::expect_with(|jail| {
            jail.set_env("CHATRELAY_TRANSPORT", "ws");
            jail.set_env("CHATRELAY_WIRE", "plain");
            let config = ServerConfig::from_env().map_err(|e| e.to_string())?;
            assert_eq!(config.transport, TransportKind::WebSocket);
            assert_eq!(config.wire, WireFormat::PlainText);
            Ok(())
        });
    }

    #[test]
    fn test_from_env_zero_idle_timeout_disables() {
        Jail::expect_with(|jail| {
            jail.set_env("CHATRELAY_IDLE_TIMEOUT_SECS", "0");
            let config = ServerConfig::from_env().map_err(|e| e.to_string())?;
            assert_eq!(config.idle_timeout, None);
            Ok(())
        });
    }

    #[test]
    fn test_from_env_bad_value_names_key() {
        Jail::expect_with(|jail| {
            jail.set_env("CHATRELAY_PORT", "ninety");
            let err = ServerConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("port"), "{err}");
            Ok(())
        });

        Jail::expect_with(|jail| {
            jail.set_env("CHATRELAY_TRANSPORT", "carrier-pigeon");
            let err = ServerConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("carrier-pigeon"), "{err}");
            Ok(())
        });
    }

    #[test]
    fn test_from_figment_layers_over_defaults() {
        let figment = load_config().merge(("port", 4242)).merge(("wire", "text"));
        let config = ServerConfig::from_figment(&figment).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:4242");
        assert_eq!(config.wire, WireFormat::PlainText);
        assert_eq!(config.transport, TransportKind::Tcp);
    }
}
