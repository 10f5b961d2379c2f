use clap::Parser;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::directory::AccountPolicy;

#[derive(Parser, Debug)]
#[command(name = "bankdb", about = "Menu-driven bank account ledger over SQLite")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "bankdb.toml")]
    pub config: String,

    /// Database path (overrides config file)
    #[arg(short, long)]
    pub db: Option<String>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_policy")]
    pub policy: PolicyConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PolicyConfig {
    /// Minimum opening deposit, as a decimal string (e.g. "500.00").
    #[serde(default = "default_minimum_initial_deposit")]
    pub minimum_initial_deposit: Decimal,

    #[serde(default = "default_credential_min_length")]
    pub credential_min_length: usize,

    #[serde(default = "default_phone_length")]
    pub phone_length: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        path: default_db_path(),
    }
}

fn default_policy() -> PolicyConfig {
    PolicyConfig {
        minimum_initial_deposit: default_minimum_initial_deposit(),
        credential_min_length: default_credential_min_length(),
        phone_length: default_phone_length(),
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_db_path() -> String {
    "bankdb.db".to_string()
}

fn default_minimum_initial_deposit() -> Decimal {
    Decimal::from(500)
}

fn default_credential_min_length() -> usize {
    4
}

fn default_phone_length() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: default_storage(),
            policy: default_policy(),
            logging: default_logging(),
        }
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Self {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Config::default()
            }),
            Err(_) => Config::default(),
        };

        // CLI overrides
        if let Some(ref db) = cli.db {
            config.storage.path = db.clone();
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }

        config
    }

    pub fn account_policy(&self) -> AccountPolicy {
        AccountPolicy {
            minimum_initial_deposit: self.policy.minimum_initial_deposit,
            credential_min_length: self.policy.credential_min_length,
            phone_length: self.policy.phone_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_defaults_match_policy() {
        let config = Config::default();
        let policy = config.account_policy();
        assert_eq!(policy.minimum_initial_deposit, dec!(500));
        assert_eq!(policy.credential_min_length, 4);
        assert_eq!(policy.phone_length, 10);
        assert_eq!(config.storage.path, "bankdb.db");
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            path = "/tmp/test.db"

            [policy]
            minimum_initial_deposit = "250.00"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.path, "/tmp/test.db");
        assert_eq!(config.policy.minimum_initial_deposit, dec!(250.00));
        assert_eq!(config.policy.credential_min_length, 4);
        assert_eq!(config.logging.level, "info");
    }
}
