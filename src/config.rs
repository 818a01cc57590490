//! Configuration management for the ledger node

use log::info;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::time::Duration;

use crate::blockchain::{KeyPair, MiningCancel, MiningControl};

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "LEDGER_CONFIG";

/// Config file read when no override is given
pub const DEFAULT_CONFIG_PATH: &str = "ledger.toml";

/// Highest difficulty a 64-character hex hash can satisfy
pub const MAX_DIFFICULTY: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chain: ChainConfig,
    pub server: ServerConfig,
    pub node: NodeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Leading zero hex characters required in a mined block's hash
    pub difficulty: usize,

    /// Amount credited to the miner of each block
    pub mining_reward: Decimal,

    /// Give up mining after this many nonces
    pub max_mining_iterations: Option<u64>,

    /// Give up mining after this many milliseconds
    pub mining_timeout_ms: Option<u64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: 2,
            mining_reward: Decimal::from(100),
            max_mining_iterations: None,
            mining_timeout_ms: None,
        }
    }
}

impl ChainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty == 0 || self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "chain.difficulty must be between 1 and {}, got {}",
                MAX_DIFFICULTY, self.difficulty
            )));
        }

        if self.mining_reward < Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "chain.mining_reward must not be negative, got {}",
                self.mining_reward
            )));
        }

        if self.max_mining_iterations == Some(0) {
            return Err(ConfigError::Invalid(
                "chain.max_mining_iterations must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Mining bounds derived from this config, tied to `cancel`
    pub fn mining_control(&self, cancel: MiningCancel) -> MiningControl {
        MiningControl {
            max_attempts: self.max_mining_iterations,
            timeout: self.mining_timeout_ms.map(Duration::from_millis),
            cancel,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Identity of the node itself
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Hex encoded private key that signs blocks mined by the node.
    /// A fresh key is generated on every start when unset.
    pub signing_key: Option<String>,
}

impl NodeConfig {
    /// Decodes the configured block signing key, if any
    pub fn signing_key(&self) -> Result<Option<KeyPair>, ConfigError> {
        self.signing_key
            .as_deref()
            .map(|private_key| {
                KeyPair::from_private_key_hex(private_key)
                    .map_err(|e| ConfigError::Invalid(format!("node.signing_key: {}", e)))
            })
            .transpose()
    }
}

impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConfig")
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Config {
    /// Parses and validates a TOML document
    pub fn from_toml_str(config_str: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chain.validate()?;

        if self.server.host.is_empty() {
            return Err(ConfigError::Invalid("server.host must be set".to_string()));
        }

        self.node.signing_key()?;

        Ok(())
    }
}

/// Loads the configuration from `$LEDGER_CONFIG` or `ledger.toml`
///
/// A missing file yields the defaults.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(&path)
}

pub fn load_config_from(path: &str) -> Result<Config, ConfigError> {
    match fs::read_to_string(path) {
        Ok(config_str) => Config::from_toml_str(&config_str),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!("No config file at {}, using defaults", path);
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chain.difficulty, 2);
        assert_eq!(config.chain.mining_reward, Decimal::from(100));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [chain]
            difficulty = 3
            mining_reward = "12.5"
            "#,
        )
        .unwrap();

        assert_eq!(config.chain.difficulty, 3);
        assert_eq!(config.chain.mining_reward, "12.5".parse::<Decimal>().unwrap());
        assert_eq!(config.chain.max_mining_iterations, None);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_mining_limits() {
        let config = Config::from_toml_str(
            r#"
            [chain]
            max_mining_iterations = 1000
            mining_timeout_ms = 250
            "#,
        )
        .unwrap();

        let control = config.chain.mining_control(MiningCancel::new());
        assert_eq!(control.max_attempts, Some(1000));
        assert_eq!(control.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_toml_str("[chain]\ndifficulty = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(Config::from_toml_str("[chain]\ndifficulty = 65").is_err());
        assert!(Config::from_toml_str("[chain]\nmining_reward = \"-1\"").is_err());
        assert!(Config::from_toml_str("[chain]\nmax_mining_iterations = 0").is_err());
        assert!(matches!(
            Config::from_toml_str("[chain]\ndifficulty = \"high\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_node_signing_key() {
        let keypair = KeyPair::generate().unwrap();
        let config = Config::from_toml_str(&format!(
            "[node]\nsigning_key = \"{}\"",
            keypair.export_private_key_hex()
        ))
        .unwrap();

        let signing_key = config.node.signing_key().unwrap().unwrap();
        assert_eq!(signing_key.address(), keypair.address());
        assert!(!format!("{:?}", config).contains(&keypair.export_private_key_hex()));

        assert!(Config::default().node.signing_key().unwrap().is_none());
        assert!(matches!(
            Config::from_toml_str("[node]\nsigning_key = \"not-a-key\""),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config_from("/nonexistent/ledger.toml").unwrap();
        assert_eq!(config.chain.difficulty, ChainConfig::default().difficulty);
    }
}
