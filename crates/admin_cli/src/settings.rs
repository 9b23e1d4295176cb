//! Settings for the admin tool: an optional `ledger.toml` overridden by
//! `LEDGER__*` environment variables (`LEDGER__ENGINE__MAX_RETRIES=5`).

use config::{Config, ConfigError, Environment, File};
use ledger::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: "sqlite:./ledger.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Log {
    pub level: String,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: Database,
    pub log: Log,
    pub engine: EngineConfig,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("LEDGER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = Settings::new("does-not-exist/ledger").unwrap();
        assert_eq!(settings.database.url, "sqlite:./ledger.db?mode=rwc");
        assert_eq!(settings.log.level, "info");
        assert_eq!(settings.engine, EngineConfig::default());
    }
}
